//! `FlowApp`: the top-level egui application state.
//!
//! This module declares the `FlowApp` struct and its `eframe::App` impl.
//! Methods are split across the sibling sub-modules:
//!
//! - `feed`    : background batch fetches
//! - `toolbar` : playback and view controls, stats
//! - `canvas`  : the 3D flow view (mount, input, texture upload)
//! - `details` : selected-node panel, legend, static fallback

pub mod canvas;
pub mod details;
pub mod feed;
pub mod toolbar;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc;

use eframe::egui;

use h2_flow_viz::ledger::Batch;
use h2_flow_viz::render::animator::FrameRequester;
use h2_flow_viz::render::events::SurfaceEvents;
use h2_flow_viz::render::view::FlowVisualizer;
use h2_flow_viz::{Result, VisualizerConfig};

/// Frame requests mapped onto egui repaints.
///
/// egui cannot cancel a repaint, so a revoked request only clears the flag
/// the app checks before ticking.
pub struct EguiFrames {
    ctx: egui::Context,
    pending: Rc<Cell<bool>>,
}

impl FrameRequester for EguiFrames {
    fn request_frame(&mut self) {
        self.pending.set(true);
        self.ctx.request_repaint();
    }

    fn revoke_frame(&mut self) {
        self.pending.set(false);
    }
}

// ─── Application state ───────────────────────────────────────────────────────

pub struct FlowApp {
    pub config: VisualizerConfig,
    pub events: SurfaceEvents,
    pub viz: Option<FlowVisualizer>,
    /// Set when the render context could not be created.
    pub fallback: Option<String>,
    pub frame_pending: Rc<Cell<bool>>,
    pub texture: Option<egui::TextureHandle>,
    pub uploaded_frames: u64,
    // Feed
    pub batches: Vec<Batch>,
    pub loading: bool,
    pub fetch_rx: Option<mpsc::Receiver<Result<Vec<Batch>>>>,
    pub feed_error: Option<String>,
    pub status: Option<String>,
}

impl FlowApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: VisualizerConfig) -> Self {
        let mut app = Self {
            config,
            events: SurfaceEvents::new(),
            viz: None,
            fallback: None,
            frame_pending: Rc::new(Cell::new(false)),
            texture: None,
            uploaded_frames: 0,
            batches: Vec::new(),
            loading: false,
            fetch_rx: None,
            feed_error: None,
            status: None,
        };
        app.refresh(&cc.egui_ctx);
        app
    }

    fn requester(&self, ctx: &egui::Context) -> Box<dyn FrameRequester> {
        Box::new(EguiFrames {
            ctx: ctx.clone(),
            pending: Rc::clone(&self.frame_pending),
        })
    }
}

impl eframe::App for FlowApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_fetch();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui, ctx);
        });

        egui::SidePanel::right("details")
            .default_width(280.0)
            .show(ctx, |ui| {
                self.draw_details(ui);
                ui.separator();
                self.draw_legend(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(reason) = self.fallback.clone() {
                self.draw_fallback(ui, &reason);
            } else {
                self.draw_canvas(ui, ctx);
            }
        });
    }
}

impl Drop for FlowApp {
    fn drop(&mut self) {
        if let Some(mut viz) = self.viz.take() {
            viz.dispose();
        }
    }
}
