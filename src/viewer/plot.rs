use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints, VLine};

use super::state::AppState;
use crate::color::Rgb;

pub(crate) fn color32(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.0, rgb.1, rgb.2)
}

// ---------------------------------------------------------------------------
// FRET density plot (central panel)
// ---------------------------------------------------------------------------

/// Render one density line per visible group plus the threshold marker.
pub fn density_plot(ui: &mut Ui, state: &AppState) {
    if state.table.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a compiled FRET table  (File → Open…)");
        });
        return;
    }

    Plot::new("fret_density_plot")
        .legend(Legend::default())
        .x_axis_label("FRET")
        .y_axis_label("Density")
        .include_x(0.0)
        .include_x(1.0)
        .include_y(0.0)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for curve in &state.curves {
                let points: PlotPoints = curve.points.iter().copied().collect();
                plot_ui.line(
                    Line::new(points)
                        .name(&curve.label)
                        .color(color32(curve.color))
                        .width(1.5),
                );
            }
            plot_ui.vline(
                VLine::new(state.threshold)
                    .name("threshold")
                    .color(Color32::DARK_GRAY)
                    .width(1.0),
            );
        });
}
