//! 3D flow canvas for `FlowApp`.
//!
//! Mounts the visualizer on first layout, forwards resize and click events
//! through the surface hub, maps drag/scroll onto the camera, and uploads
//! each new frame as an egui texture.

use glam::Vec2;

use h2_flow_viz::render::events::SurfaceEvent;
use h2_flow_viz::render::view::FlowVisualizer;
use h2_flow_viz::render::SurfaceSize;
use h2_flow_viz::VizError;

use super::FlowApp;

impl FlowApp {
    pub fn draw_canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let (rect, response) = ui.allocate_exact_size(
            ui.available_size(),
            egui::Sense::click_and_drag().union(egui::Sense::hover()),
        );
        let size = SurfaceSize::new(rect.width() as u32, rect.height() as u32);

        if self.viz.is_none() {
            self.mount(ctx, size);
        }
        let Some(viz) = self.viz.as_mut() else {
            return;
        };

        self.events.emit(SurfaceEvent::Resized(size));
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = pos - rect.min;
                self.events.emit(SurfaceEvent::PointerDown {
                    x: local.x,
                    y: local.y,
                });
            }
        }
        for selection in viz.pump_events() {
            log::info!(
                "selected {} ({} of batch {})",
                selection.node_id,
                selection.kind.label(),
                selection.batch.id
            );
        }

        // Drag to orbit the camera around the graph
        if response.dragged() {
            let delta = response.drag_delta();
            viz.orbit(Vec2::new(delta.x, delta.y));
        }

        // Scroll to dolly in/out (zoom)
        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.1 {
                viz.zoom(scroll);
            }
        }

        if self.frame_pending.replace(false) {
            let dt = ctx.input(|i| i.stable_dt);
            if let Err(e) = viz.on_frame(dt) {
                log::warn!("frame failed: {}", e);
            }
        }

        if let Some(frame) = viz.frame() {
            let rendered = viz.scene().frames_rendered();
            if rendered != self.uploaded_frames || self.texture.is_none() {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [frame.size.width as usize, frame.size.height as usize],
                    &frame.pixels,
                );
                match self.texture.as_mut() {
                    Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("flow_canvas", image, egui::TextureOptions::LINEAR));
                    }
                }
                self.uploaded_frames = rendered;
            }
        }

        if let Some(tex) = &self.texture {
            ui.painter().image(
                tex.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
    }

    fn mount(&mut self, ctx: &egui::Context, size: SurfaceSize) {
        if size.is_degenerate() {
            return;
        }
        match FlowVisualizer::mount(&self.config, size, &self.events, self.requester(ctx)) {
            Ok(mut viz) => {
                if !self.batches.is_empty() {
                    viz.load(self.batches.clone());
                }
                self.viz = Some(viz);
            }
            Err(VizError::ContextUnavailable(reason)) => {
                log::warn!("3D view unavailable: {}", reason);
                self.fallback = Some(reason);
            }
            Err(e) => {
                log::warn!("3D view failed to mount: {}", e);
                self.fallback = Some(e.to_string());
            }
        }
    }
}
