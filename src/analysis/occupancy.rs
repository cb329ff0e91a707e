use super::error::AnalysisError;
use super::stats::{MeanDwell, TransitionFrequency};
use crate::data::model::{FretSource, TrajectoryTable, TransitionClass};

/// Fraction of a treatment's frames spent below and above a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupancy {
    pub treatment: String,
    pub threshold: f64,
    pub time_below: f64,
    pub time_above: f64,
}

/// Occupancy of the two sides of `threshold` for one treatment.
///
/// Frames exactly at the threshold are excluded, so the two fractions sum
/// to one. Fails when no frame of the treatment differs from the threshold.
pub fn heatmap_prep(
    table: &TrajectoryTable,
    treatment: &str,
    threshold: f64,
    source: FretSource,
) -> Result<Occupancy, AnalysisError> {
    let (below, above) = table
        .for_treatment(treatment)
        .map(|f| f.value(source))
        .fold((0usize, 0usize), |(below, above), v| {
            if v < threshold {
                (below + 1, above)
            } else if v > threshold {
                (below, above + 1)
            } else {
                (below, above)
            }
        });

    let total = below + above;
    if total == 0 {
        return Err(AnalysisError::EmptyDenominator {
            what: "occupancy",
            treatment: treatment.to_string(),
        });
    }

    Ok(Occupancy {
        treatment: treatment.to_string(),
        threshold,
        time_below: below as f64 / total as f64,
        time_above: above as f64 / total as f64,
    })
}

/// Class order of the summary heatmap arrows.
pub const HEATMAP_ORDER: [TransitionClass; 4] = [
    TransitionClass::LowToHigh,
    TransitionClass::HighToLow,
    TransitionClass::HighToHigh,
    TransitionClass::LowToLow,
];

/// Arrow widths for the summary heatmap: frequency (percent) / 1000.
pub fn arrow_weights(freq: &TransitionFrequency) -> [f64; 4] {
    HEATMAP_ORDER.map(|class| freq.get(class) / 1000.0)
}

/// Mean dwell times in heatmap arrow order.
pub fn mean_dwell_list(mean: &MeanDwell) -> [Option<f64>; 4] {
    HEATMAP_ORDER.map(|class| mean.get(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::outliers::remove_trajectory_outliers;
    use crate::data::model::TrajectoryFrame;

    fn table(values: &[(f64, &str)]) -> TrajectoryTable {
        TrajectoryTable::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &(v, t))| TrajectoryFrame {
                    frame: i as u64,
                    donor: 1.0,
                    acceptor: 1.0,
                    fret: v,
                    idealized_fret: v,
                    treatment: t.to_string(),
                    molecule: format!("m{}", i % 4),
                })
                .collect(),
        )
    }

    #[test]
    fn occupancy_excludes_threshold_frames() {
        let raw = table(&[
            (0.2, "a"),
            (0.6, "a"),
            (0.5, "a"),
            (0.9, "a"),
            (-0.9, "a"),
            (1.6, "a"),
        ]);
        let cleaned = remove_trajectory_outliers(&raw, FretSource::Raw);
        assert_eq!(cleaned.len(), 4);

        let occ = heatmap_prep(&cleaned, "a", 0.5, FretSource::Raw).unwrap();
        assert!((occ.time_below - 1.0 / 3.0).abs() < 1e-12);
        assert!((occ.time_above - 2.0 / 3.0).abs() < 1e-12);
        assert!((occ.time_below + occ.time_above - 1.0).abs() < 1e-12);
    }

    #[test]
    fn occupancy_only_counts_requested_treatment() {
        let t = table(&[(0.1, "a"), (0.9, "b"), (0.8, "b")]);
        let occ = heatmap_prep(&t, "b", 0.5, FretSource::Raw).unwrap();
        assert_eq!(occ.time_above, 1.0);
        assert_eq!(occ.time_below, 0.0);
    }

    #[test]
    fn all_frames_on_threshold_is_an_error() {
        let t = table(&[(0.5, "a"), (0.5, "a")]);
        let err = heatmap_prep(&t, "a", 0.5, FretSource::Raw).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::EmptyDenominator {
                what: "occupancy",
                treatment: "a".to_string()
            }
        );
        assert!(heatmap_prep(&t, "missing", 0.5, FretSource::Raw).is_err());
    }

    #[test]
    fn arrow_weights_follow_heatmap_order() {
        let freq = TransitionFrequency {
            treatment: "a".to_string(),
            threshold: 0.5,
            // ll, lh, hh, hl
            percent: [10.0, 20.0, 30.0, 40.0],
        };
        assert_eq!(arrow_weights(&freq), [0.02, 0.04, 0.03, 0.01]);

        let mean = MeanDwell {
            treatment: "a".to_string(),
            threshold: 0.5,
            mean_s: [Some(1.0), None, Some(3.0), Some(4.0)],
        };
        assert_eq!(mean_dwell_list(&mean), [None, Some(4.0), Some(3.0), Some(1.0)]);
    }
}
