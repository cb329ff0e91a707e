use std::path::Path;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use super::plot::color32;
use super::state::AppState;
use crate::data::loader::load_compiled_trajectories;
use crate::data::model::{FretSource, TRAJECTORY_KEY_COLUMNS};

// ---------------------------------------------------------------------------
// Left side panel – selection widgets
// ---------------------------------------------------------------------------

/// Render the left selection panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Selections");
    ui.separator();

    if state.table.is_none() {
        ui.label("No table loaded.");
        return;
    }

    // Clone what we need so we can mutate state inside the loop.
    let unique = state.unique_values.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Colour-by selector ----
            ui.strong("Color by");
            let current = state.color_column.clone();
            egui::ComboBox::from_id_salt("color_by")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in TRAJECTORY_KEY_COLUMNS {
                        if ui.selectable_label(current == col, col).clicked() {
                            state.set_color_column(col);
                        }
                    }
                });

            // ---- FRET column and threshold ----
            ui.horizontal(|ui: &mut Ui| {
                for source in [FretSource::Raw, FretSource::Idealized] {
                    if ui
                        .selectable_label(state.fret_source == source, source.to_string())
                        .clicked()
                    {
                        state.set_fret_source(source);
                    }
                }
            });
            let mut threshold = state.threshold;
            if ui
                .add(egui::Slider::new(&mut threshold, 0.0..=1.0).text("threshold"))
                .changed()
            {
                state.set_threshold(threshold);
            }
            ui.separator();

            // ---- Per-column selections (collapsible) ----
            for col in TRAJECTORY_KEY_COLUMNS {
                let Some(all_values) = unique.get(col) else {
                    continue;
                };
                let n_selected = state.filters.get(col).map_or(0, |s| s.len());
                let header_text = format!("{col}  ({n_selected}/{})", all_values.len());

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(col)
                    .default_open(col == "treatment")
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(col);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(col);
                            }
                        });

                        for val in all_values {
                            let label = val.to_string();
                            let mut text = RichText::new(&label);
                            if state.color_column == col {
                                if let Some(cm) = &state.color_map {
                                    text = text.color(color32(cm.color_for(&label)));
                                }
                            }

                            let mut checked =
                                state.filters.get(col).is_some_and(|s| s.contains(val));
                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(col, val);
                            }
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(table) = &state.table {
            ui.label(format!(
                "{} frames loaded, {} visible",
                table.len(),
                state.visible_indices.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Occupancy table (bottom panel)
// ---------------------------------------------------------------------------

/// Fraction of visible frames below and above the threshold, per treatment.
pub fn occupancy_table(ui: &mut Ui, state: &AppState) {
    if state.occupancy.is_empty() {
        ui.label("No occupancy to show.");
        return;
    }

    let threshold = state.threshold;
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(120.0))
        .columns(Column::remainder(), 2)
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Treatment");
            });
            header.col(|ui| {
                ui.strong(format!("< {threshold:.2}"));
            });
            header.col(|ui| {
                ui.strong(format!("> {threshold:.2}"));
            });
        })
        .body(|mut body| {
            for row in &state.occupancy {
                body.row(18.0, |mut table_row| {
                    table_row.col(|ui| {
                        ui.label(&row.treatment);
                    });
                    table_row.col(|ui| {
                        ui.label(format!("{:.1} %", row.time_below * 100.0));
                    });
                    table_row.col(|ui| {
                        ui.label(format!("{:.1} %", row.time_above * 100.0));
                    });
                });
            }
        });
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open compiled FRET data")
        .add_filter("Supported files", &["csv", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        load_file(state, &path);
    }
}

/// Load `path` into the state, reporting failures in the status line.
pub fn load_file(state: &mut AppState, path: &Path) {
    match load_compiled_trajectories(path) {
        Ok(table) => {
            log::info!(
                "Loaded {} frames of {} treatments from {}",
                table.len(),
                table.treatments().len(),
                path.display()
            );
            state.set_table(table);
        }
        Err(e) => {
            log::error!("Failed to load file: {e}");
            state.status_message = Some(format!("Error: {e}"));
        }
    }
}
