use eframe::egui;

use super::panels;
use super::plot;
use super::state::AppState;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FretViewerApp {
    pub state: AppState,
}

impl FretViewerApp {
    /// Start from a prepared state, e.g. with a table already loaded.
    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for FretViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: selections ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: occupancy ----
        egui::TopBottomPanel::bottom("occupancy_panel")
            .resizable(true)
            .default_height(140.0)
            .show(ctx, |ui| {
                panels::occupancy_table(ui, &self.state);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::density_plot(ui, &self.state);
        });
    }
}
