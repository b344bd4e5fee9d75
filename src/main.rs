use eframe::egui;

use h2_flow_viz::VisualizerConfig;

mod app;

use app::FlowApp;

fn main() {
    env_logger::init();

    let mut config = match std::env::var("H2FLOW_CONFIG") {
        Ok(path) => VisualizerConfig::load(&path).unwrap_or_else(|e| {
            log::warn!("{}; using defaults", e);
            VisualizerConfig::default()
        }),
        Err(_) => VisualizerConfig::default(),
    };
    if let Some(source) = std::env::args().nth(1) {
        config = config.with_feed_source(source);
    }
    log::info!("feed source: {}", config.feed.source);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "H\u{2082} Credit Flow",
        options,
        Box::new(|cc| Ok(Box::new(FlowApp::new(cc, config)))),
    )
    .expect("Failed to start h2-flow-viz");
}
