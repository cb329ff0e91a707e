/// Transform/aggregate layer. Every function takes tables by reference and
/// returns a fresh table or summary.
///
/// ```text
///   TrajectoryTable ──► outliers ──► occupancy (heatmap_prep)
///
///   TransitionTable ──► outliers ──► dwell::cleanup_dwell ──► dwell::classify_dwells
///                          │                                        │
///                          ▼                                        ▼
///                      molecules                        stats (frequency, mean)
/// ```
pub mod dwell;
pub mod error;
pub mod molecules;
pub mod occupancy;
pub mod outliers;
pub mod stats;

pub use dwell::{classify_dwells, cleanup_dwell, fret_before_transition, ClassifiedDwells, FirstDwell};
pub use error::AnalysisError;
pub use molecules::{
    check_molecule_coverage, count_filtered_molecules, filter_molecules_below, MoleculeFraction,
};
pub use occupancy::{arrow_weights, heatmap_prep, mean_dwell_list, Occupancy, HEATMAP_ORDER};
pub use outliers::{remove_trajectory_outliers, remove_transition_outliers};
pub use stats::{calculate_mean, transition_frequency, MeanDwell, TransitionFrequency};
