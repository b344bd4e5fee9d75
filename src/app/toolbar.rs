//! Toolbar rendering for `FlowApp`.
//!
//! Draws the playback toggle, reset-view, refresh and snapshot buttons,
//! plus the batch statistics.

use eframe::egui;

use h2_flow_viz::render::flow_graph::FlowStats;
use h2_flow_viz::render::PlaybackState;

use super::FlowApp;

impl FlowApp {
    /// Render the top toolbar strip.
    pub fn draw_toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.add_space(4.0);
            ui.heading("H\u{2082} Credit Flow");
            ui.separator();

            let live = self.viz.is_some();
            let playing = self
                .viz
                .as_ref()
                .is_some_and(|v| v.playback() == PlaybackState::Playing);
            let label = if playing { "\u{23F8} Pause" } else { "\u{25B6} Play" };
            if ui.add_enabled(live, egui::Button::new(label)).clicked() {
                if let Some(viz) = self.viz.as_mut() {
                    viz.toggle_playback();
                }
            }
            if ui.add_enabled(live, egui::Button::new("Reset view")).clicked() {
                if let Some(viz) = self.viz.as_mut() {
                    viz.reset_view();
                }
            }
            if ui
                .add_enabled(!self.loading, egui::Button::new("Refresh"))
                .clicked()
            {
                self.refresh(ctx);
            }
            if ui.add_enabled(live, egui::Button::new("Snapshot")).clicked() {
                self.snapshot();
            }

            if self.loading {
                ui.spinner();
            }

            ui.separator();
            let stats = FlowStats::from_batches(&self.batches);
            ui.label(format!(
                "Batches: {}   Transferred: {}   Retired: {}",
                stats.total_batches, stats.transferred, stats.retired
            ));

            if let Some(err) = &self.feed_error {
                ui.colored_label(egui::Color32::from_rgb(0xef, 0x44, 0x44), err);
            } else if let Some(status) = &self.status {
                ui.weak(status);
            }
        });
    }

    fn snapshot(&mut self) {
        let Some(viz) = self.viz.as_ref() else {
            return;
        };
        let path = format!(
            "h2-flow-{}.png",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        );
        match viz.snapshot(&path) {
            Ok(()) => {
                log::info!("snapshot written to {}", path);
                self.status = Some(format!("Saved {}", path));
            }
            Err(e) => {
                log::warn!("{}", e);
                self.status = Some(e.to_string());
            }
        }
    }
}
