use std::collections::{BTreeMap, BTreeSet};

use super::model::{CellValue, TrajectoryTable};

// ---------------------------------------------------------------------------
// Selection predicate: which key values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map places no constraint.
pub type FilterState = BTreeMap<String, BTreeSet<CellValue>>;

/// Initialise a [`FilterState`] with every value selected.
pub fn init_filter_state(unique_values: &BTreeMap<String, BTreeSet<CellValue>>) -> FilterState {
    unique_values.clone()
}

/// Indices of frames that pass all active selections.
///
/// A frame passes a column selection when:
/// * every unique value of the column is selected → no constraint
/// * the selection for that column is empty → fails
/// * the frame's value for that column is in the selected set → passes
pub fn filtered_indices(
    table: &TrajectoryTable,
    unique_values: &BTreeMap<String, BTreeSet<CellValue>>,
    filters: &FilterState,
) -> Vec<usize> {
    // Only columns with a partial selection need a per-frame check.
    let active: Vec<(&String, &BTreeSet<CellValue>)> = filters
        .iter()
        .filter(|(col, selected)| {
            unique_values
                .get(*col)
                .map_or(true, |all| selected.len() != all.len())
        })
        .collect();

    if active.iter().any(|(_, selected)| selected.is_empty()) {
        return Vec::new();
    }

    table
        .frames
        .iter()
        .enumerate()
        .filter(|(_, frame)| {
            active.iter().all(|(col, selected)| {
                let value = frame.key(col).unwrap_or(CellValue::Null);
                selected.contains(&value)
            })
        })
        .map(|(i, _)| i)
        .collect()
}
