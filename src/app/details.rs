//! Side panel for `FlowApp`: selected node details, legend, and the static
//! fallback shown when no render context is available.

use egui::{Color32, Grid, RichText, ScrollArea, Ui};

use h2_flow_viz::ledger::Batch;
use h2_flow_viz::render::flow_graph::NodeKind;

use super::FlowApp;

fn kind_color(kind: NodeKind) -> Color32 {
    let [r, g, b, _] = kind.color();
    Color32::from_rgb((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

fn shape_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Issue => "sphere",
        NodeKind::Transfer => "cone",
        NodeKind::Retire => "octahedron",
    }
}

fn batch_grid(ui: &mut Ui, batch: &Batch) {
    Grid::new("batch_details")
        .num_columns(2)
        .spacing([8.0, 4.0])
        .show(ui, |ui| {
            ui.label("Batch");
            ui.monospace(&batch.id);
            ui.end_row();
            ui.label("Hash");
            ui.monospace(&batch.hash);
            ui.end_row();
            ui.label("Quantity");
            ui.label(batch.quantity_label());
            ui.end_row();
            ui.label("Producer");
            ui.monospace(batch.producer_short());
            ui.end_row();
            ui.label("Status");
            ui.label(batch.status.label());
            ui.end_row();
            ui.label("Created");
            ui.label(batch.created_at.format("%Y-%m-%d %H:%M").to_string());
            ui.end_row();
            if let Some(at) = batch.retired_at {
                ui.label("Retired");
                ui.label(at.format("%Y-%m-%d %H:%M").to_string());
                ui.end_row();
            }
            if let Some(by) = &batch.retired_by_ref {
                ui.label("Retired by");
                ui.monospace(by);
                ui.end_row();
            }
        });
    if let Some(note) = &batch.retirement_note {
        ui.add_space(4.0);
        ui.label(RichText::new(note).italics());
    }
}

impl FlowApp {
    pub fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Node details");
        let selection = self.viz.as_ref().and_then(|v| v.selection());
        match selection {
            Some(sel) => {
                ui.horizontal(|ui| {
                    ui.colored_label(kind_color(sel.kind), "\u{25CF}");
                    ui.strong(sel.kind.label());
                    ui.weak(&sel.node_id);
                });
                batch_grid(ui, &sel.batch);
            }
            None => {
                ui.weak("Click a node to inspect its batch.");
            }
        }
    }

    pub fn draw_legend(&mut self, ui: &mut Ui) {
        ui.heading("Legend");
        for kind in NodeKind::ALL {
            ui.horizontal(|ui| {
                ui.colored_label(kind_color(kind), "\u{25CF}");
                ui.label(format!("{} ({})", kind.label(), shape_name(kind)));
            });
        }
        ui.weak("Drag to orbit, scroll to zoom.");
    }

    /// Table view used in place of the canvas when 3D is unavailable.
    pub fn draw_fallback(&mut self, ui: &mut Ui, reason: &str) {
        ui.vertical_centered(|ui| {
            ui.add_space(16.0);
            ui.heading("3D view unavailable");
            ui.weak(reason);
        });
        ui.separator();

        ScrollArea::vertical().show(ui, |ui| {
            Grid::new("fallback_batches")
                .striped(true)
                .num_columns(4)
                .show(ui, |ui| {
                    ui.strong("Batch");
                    ui.strong("Status");
                    ui.strong("Quantity");
                    ui.strong("Producer");
                    ui.end_row();
                    for batch in &self.batches {
                        ui.monospace(&batch.id);
                        ui.label(batch.status.label());
                        ui.label(batch.quantity_label());
                        ui.monospace(batch.producer_short());
                        ui.end_row();
                    }
                });
        });
    }
}
