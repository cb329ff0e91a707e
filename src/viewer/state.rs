use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{heatmap_prep, Occupancy};
use crate::color::{ColorMap, Rgb};
use crate::data::filter::{filtered_indices, init_filter_state, FilterState};
use crate::data::model::{CellValue, FretSource, TrajectoryTable};
use crate::render::kde::{gaussian_kde, linspace};

/// Points per density curve.
const CURVE_POINTS: usize = 201;

// ---------------------------------------------------------------------------
// Derived plot data
// ---------------------------------------------------------------------------

/// One density line of the central plot.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurve {
    pub label: String,
    pub color: Rgb,
    pub points: Vec<[f64; 2]>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full viewer state, independent of rendering.
pub struct AppState {
    /// Loaded trajectories (None until a file is opened).
    pub table: Option<TrajectoryTable>,

    /// Unique values of every key column of `table`.
    pub unique_values: BTreeMap<String, BTreeSet<CellValue>>,

    /// Per-column selections.
    pub filters: FilterState,

    /// Indices of frames passing the current selections (cached).
    pub visible_indices: Vec<usize>,

    /// Key column used for grouping and colouring the curves.
    pub color_column: String,

    pub color_map: Option<ColorMap>,

    pub fret_source: FretSource,

    /// Low/high FRET threshold for the occupancy table.
    pub threshold: f64,

    /// Density curves of the visible frames (cached).
    pub curves: Vec<DensityCurve>,

    /// Occupancy of the visible frames per treatment (cached).
    pub occupancy: Vec<Occupancy>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            table: None,
            unique_values: BTreeMap::new(),
            filters: FilterState::default(),
            visible_indices: Vec::new(),
            color_column: "treatment".to_string(),
            color_map: None,
            fret_source: FretSource::Raw,
            threshold: 0.5,
            curves: Vec::new(),
            occupancy: Vec::new(),
            status_message: None,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded table, select everything and colour by treatment.
    pub fn set_table(&mut self, table: TrajectoryTable) {
        self.unique_values = table.unique_values();
        self.filters = init_filter_state(&self.unique_values);
        self.table = Some(table);
        self.color_column = "treatment".to_string();
        self.rebuild_color_map();
        self.refilter();
        self.status_message = None;
    }

    /// Rebuild the colour map from the current `color_column`.
    pub fn rebuild_color_map(&mut self) {
        self.color_map = self.unique_values.get(&self.color_column).map(|values| {
            let labels: Vec<String> = values.iter().map(ToString::to_string).collect();
            ColorMap::new(labels.iter().map(String::as_str), &BTreeMap::new())
        });
    }

    /// Recompute visible indices and everything derived from them.
    pub fn refilter(&mut self) {
        let Some(table) = &self.table else {
            return;
        };
        self.visible_indices = filtered_indices(table, &self.unique_values, &self.filters);
        self.recompute();
    }

    /// Recompute the curves and the occupancy table for the visible frames.
    fn recompute(&mut self) {
        let Some(table) = &self.table else {
            return;
        };
        let visible = TrajectoryTable::new(
            self.visible_indices
                .iter()
                .map(|&i| table.frames[i].clone())
                .collect(),
        );

        self.occupancy = visible
            .treatments()
            .iter()
            .filter_map(|t| heatmap_prep(&visible, t, self.threshold, self.fret_source).ok())
            .collect();

        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for frame in &visible.frames {
            let label = frame
                .key(&self.color_column)
                .map(|v| v.to_string())
                .unwrap_or_default();
            groups.entry(label).or_default().push(frame.value(self.fret_source));
        }

        let grid = linspace(0.0, 1.0, CURVE_POINTS);
        self.curves = groups
            .into_iter()
            .map(|(label, values)| {
                let density = gaussian_kde(&values, &grid);
                let color = self
                    .color_map
                    .as_ref()
                    .map_or(Rgb::GRAY, |cm| cm.color_for(&label));
                DensityCurve {
                    label,
                    color,
                    points: grid.iter().zip(density).map(|(&x, y)| [x, y]).collect(),
                }
            })
            .collect();
    }

    pub fn set_color_column(&mut self, column: &str) {
        self.color_column = column.to_string();
        self.rebuild_color_map();
        self.recompute();
    }

    pub fn set_fret_source(&mut self, source: FretSource) {
        self.fret_source = source;
        self.recompute();
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.recompute();
    }

    /// Toggle a single key value in a column's selection.
    pub fn toggle_filter_value(&mut self, column: &str, value: &CellValue) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        if let Some(all_values) = self.unique_values.get(column) {
            self.filters.insert(column.to_string(), all_values.clone());
            self.refilter();
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::TrajectoryFrame;

    fn table() -> TrajectoryTable {
        let frame = |fret: f64, treatment: &str, molecule: &str| TrajectoryFrame {
            frame: 0,
            donor: 1.0,
            acceptor: 1.0,
            fret,
            idealized_fret: 0.8,
            treatment: treatment.to_string(),
            molecule: molecule.to_string(),
        };
        TrajectoryTable::new(vec![
            frame(0.2, "Native", "m1"),
            frame(0.6, "Native", "m1"),
            frame(0.9, "Native", "m2"),
            frame(0.3, "ATP", "m3"),
        ])
    }

    #[test]
    fn test_set_table_selects_everything() {
        let mut state = AppState::default();
        state.set_table(table());
        assert_eq!(state.visible_indices, vec![0, 1, 2, 3]);
        assert_eq!(state.curves.len(), 2);
        assert_eq!(state.occupancy.len(), 2);
        assert!(state.color_map.is_some());
    }

    #[test]
    fn test_toggle_and_select() {
        let mut state = AppState::default();
        state.set_table(table());

        state.toggle_filter_value("treatment", &CellValue::String("ATP".into()));
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
        assert_eq!(state.occupancy.len(), 1);
        let native = &state.occupancy[0];
        assert!((native.time_below - 1.0 / 3.0).abs() < 1e-12);

        state.select_none("molecule");
        assert!(state.visible_indices.is_empty());
        assert!(state.curves.is_empty());

        state.select_all("molecule");
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_color_column_and_source() {
        let mut state = AppState::default();
        state.set_table(table());

        state.set_color_column("molecule");
        let labels: Vec<&str> = state.curves.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["m1", "m2", "m3"]);

        state.set_fret_source(FretSource::Idealized);
        state.set_threshold(0.5);
        assert!(state.occupancy.iter().all(|o| o.time_above == 1.0));
    }
}
