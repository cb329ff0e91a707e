use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::error::AnalysisError;
use crate::data::model::{Dwell, TransitionClass, TransitionTable};

// ---------------------------------------------------------------------------
// Dwell cleanup
// ---------------------------------------------------------------------------

/// What to do with the first dwell of each molecule. The first dwell is
/// left-censored: the trace starts partway through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstDwell {
    #[default]
    Delete,
    Keep,
}

impl FromStr for FirstDwell {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(FirstDwell::Delete),
            "keep" => Ok(FirstDwell::Keep),
            other => Err(AnalysisError::InvalidFirstDwell(other.to_string())),
        }
    }
}

impl fmt::Display for FirstDwell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirstDwell::Delete => write!(f, "delete"),
            FirstDwell::Keep => write!(f, "keep"),
        }
    }
}

/// Convert dwell times to seconds and drop the unusable ones.
///
/// With [`FirstDwell::Delete`] the first record of every molecule (in input
/// order) is removed before the `min_dwell_s` cut is applied. Molecules are
/// grouped by id across the whole table, so callers pass one treatment at a
/// time. Output keeps the input order.
pub fn cleanup_dwell(
    table: &TransitionTable,
    fps: f64,
    min_dwell_s: f64,
    first_dwell: FirstDwell,
) -> Result<Vec<Dwell>, AnalysisError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(AnalysisError::InvalidParameter {
            name: "frames per second",
            value: fps,
        });
    }

    let mut seen = HashSet::new();
    let dwells: Vec<Dwell> = table
        .records
        .iter()
        .filter(|r| match first_dwell {
            FirstDwell::Delete => !seen.insert(r.molecule),
            FirstDwell::Keep => true,
        })
        .map(|r| Dwell {
            molecule: r.molecule,
            fret_before: r.fret_before,
            fret_after: r.fret_after,
            dwell_frames: r.dwell_frames,
            treatment: r.treatment.clone(),
            dwell_s: r.dwell_frames / fps,
        })
        .filter(|d| d.dwell_s >= min_dwell_s)
        .collect();

    log::debug!(
        "cleanup_dwell kept {} of {} transitions (fps {fps}, min {min_dwell_s} s, first dwell {first_dwell})",
        dwells.len(),
        table.len()
    );
    Ok(dwells)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Dwell times in seconds split by transition class.
///
/// Columns are indexed by [`TransitionClass::index`] and may have different
/// lengths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedDwells {
    pub threshold: f64,
    pub columns: [Vec<f64>; 4],
}

impl ClassifiedDwells {
    pub fn column(&self, class: TransitionClass) -> &[f64] {
        &self.columns[class.index()]
    }

    /// Number of dwells per class.
    pub fn counts(&self) -> [usize; 4] {
        [
            self.columns[0].len(),
            self.columns[1].len(),
            self.columns[2].len(),
            self.columns[3].len(),
        ]
    }

    /// Total classified transitions.
    pub fn total(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Rectangular rows; cells past the end of a column are `None`.
    pub fn rows(&self) -> impl Iterator<Item = [Option<f64>; 4]> + '_ {
        let height = self.columns.iter().map(Vec::len).max().unwrap_or(0);
        (0..height).map(move |i| {
            [
                self.columns[0].get(i).copied(),
                self.columns[1].get(i).copied(),
                self.columns[2].get(i).copied(),
                self.columns[3].get(i).copied(),
            ]
        })
    }
}

/// Partition dwells into the four transition classes around `threshold`.
/// Dwells with a FRET value exactly at the threshold are not classified.
pub fn classify_dwells(dwells: &[Dwell], threshold: f64) -> ClassifiedDwells {
    let mut classified = ClassifiedDwells {
        threshold,
        ..Default::default()
    };
    let mut unclassified = 0usize;

    for d in dwells {
        match TransitionClass::classify(d.fret_before, d.fret_after, threshold) {
            Some(class) => classified.columns[class.index()].push(d.dwell_s),
            None => unclassified += 1,
        }
    }

    if unclassified > 0 {
        log::debug!("{unclassified} dwells sit exactly on threshold {threshold} and were not classified");
    }
    classified
}

// ---------------------------------------------------------------------------
// FRET state before a transition
// ---------------------------------------------------------------------------

/// Dwells that end in a state at or below `threshold`.
///
/// Each treatment is cleaned separately (first dwell deleted, `min_dwell_s`
/// applied) before the filter, so molecule ids never mix across treatments.
pub fn fret_before_transition(
    table: &TransitionTable,
    threshold: f64,
    fps: f64,
    min_dwell_s: f64,
) -> Result<Vec<Dwell>, AnalysisError> {
    let mut selected = Vec::new();
    for treatment in table.treatments() {
        let cleaned = cleanup_dwell(
            &table.for_treatment(&treatment),
            fps,
            min_dwell_s,
            FirstDwell::Delete,
        )?;
        selected.extend(cleaned.into_iter().filter(|d| d.fret_after <= threshold));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::TransitionRecord;
    use proptest::prelude::*;

    fn record(molecule: u64, before: f64, after: f64, frames: f64, treatment: &str) -> TransitionRecord {
        TransitionRecord {
            molecule,
            fret_before: before,
            fret_after: after,
            dwell_frames: frames,
            treatment: treatment.to_string(),
        }
    }

    fn table() -> TransitionTable {
        TransitionTable::new(vec![
            record(1, 0.2, 0.6, 10.0, "a"),
            record(2, 0.6, 0.2, 20.0, "a"),
            record(1, 0.6, 0.2, 4.0, "a"),
            record(1, 0.2, 0.7, 30.0, "a"),
            record(2, 0.2, 0.8, 50.0, "a"),
            record(3, 0.8, 0.1, 1.0, "a"),
        ])
    }

    #[test]
    fn converts_frames_to_seconds() {
        let dwells = cleanup_dwell(&table(), 10.0, 0.0, FirstDwell::Keep).unwrap();
        assert_eq!(dwells.len(), 6);
        assert_eq!(dwells[0].dwell_s, 1.0);
        assert_eq!(dwells[4].dwell_s, 5.0);
    }

    #[test]
    fn delete_removes_one_record_per_molecule() {
        let keep = cleanup_dwell(&table(), 10.0, 0.0, FirstDwell::Keep).unwrap();
        let delete = cleanup_dwell(&table(), 10.0, 0.0, FirstDwell::Delete).unwrap();
        assert_eq!(keep.len() - delete.len(), 3);
        // first records of molecules 1, 2 and 3 are gone, order is preserved
        let frames: Vec<f64> = delete.iter().map(|d| d.dwell_frames).collect();
        assert_eq!(frames, vec![4.0, 30.0, 50.0]);
    }

    proptest! {
        #[test]
        fn delete_drops_exactly_the_first_record_of_each_molecule(
            molecules in prop::collection::vec(0u64..8, 0..80)
        ) {
            let table = TransitionTable::new(
                molecules
                    .iter()
                    .enumerate()
                    .map(|(i, &m)| record(m, 0.2, 0.8, 1.0 + i as f64, "a"))
                    .collect(),
            );
            let keep = cleanup_dwell(&table, 10.0, 0.0, FirstDwell::Keep).unwrap();
            let delete = cleanup_dwell(&table, 10.0, 0.0, FirstDwell::Delete).unwrap();
            prop_assert_eq!(keep.len(), molecules.len());

            let distinct: HashSet<u64> = molecules.iter().copied().collect();
            for m in &distinct {
                let kept = keep.iter().filter(|d| d.molecule == *m).count();
                let deleted = delete.iter().filter(|d| d.molecule == *m).count();
                prop_assert_eq!(kept - deleted, 1);
            }

            // surviving rows are Keep minus each molecule's first row, in order
            let mut seen = HashSet::new();
            let expected: Vec<f64> = keep
                .iter()
                .filter(|d| !seen.insert(d.molecule))
                .map(|d| d.dwell_frames)
                .collect();
            let frames: Vec<f64> = delete.iter().map(|d| d.dwell_frames).collect();
            prop_assert_eq!(frames, expected);
        }
    }

    #[test]
    fn min_dwell_applies_after_first_dwell_deletion() {
        let dwells = cleanup_dwell(&table(), 10.0, 0.5, FirstDwell::Delete).unwrap();
        let frames: Vec<f64> = dwells.iter().map(|d| d.dwell_frames).collect();
        assert_eq!(frames, vec![30.0, 50.0]);
    }

    #[test]
    fn rejects_non_positive_fps() {
        let err = cleanup_dwell(&table(), 0.0, 0.0, FirstDwell::Keep).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
    }

    #[test]
    fn first_dwell_parses() {
        assert_eq!("keep".parse::<FirstDwell>().unwrap(), FirstDwell::Keep);
        assert!(matches!(
            "drop".parse::<FirstDwell>(),
            Err(AnalysisError::InvalidFirstDwell(_))
        ));
    }

    #[test]
    fn classifies_one_of_each() {
        let table = TransitionTable::new(vec![
            record(1, 0.2, 0.6, 1.0, "a"),
            record(1, 0.6, 0.2, 2.0, "a"),
            record(1, 0.7, 0.8, 3.0, "a"),
            record(1, 0.1, 0.2, 4.0, "a"),
        ]);
        let dwells = cleanup_dwell(&table, 1.0, 0.0, FirstDwell::Keep).unwrap();
        let classified = classify_dwells(&dwells, 0.5);
        assert_eq!(classified.column(TransitionClass::LowToHigh), &[1.0]);
        assert_eq!(classified.column(TransitionClass::HighToLow), &[2.0]);
        assert_eq!(classified.column(TransitionClass::HighToHigh), &[3.0]);
        assert_eq!(classified.column(TransitionClass::LowToLow), &[4.0]);
        assert_eq!(classified.total(), 4);
    }

    #[test]
    fn rows_are_padded() {
        let classified = ClassifiedDwells {
            threshold: 0.5,
            columns: [vec![1.0, 2.0, 3.0], vec![], vec![4.0], vec![]],
        };
        let rows: Vec<_> = classified.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], [Some(1.0), None, Some(4.0), None]);
        assert_eq!(rows[2], [Some(3.0), None, None, None]);
    }

    #[test]
    fn fret_before_transition_is_per_treatment() {
        let table = TransitionTable::new(vec![
            record(1, 0.8, 0.2, 10.0, "a"),
            record(1, 0.8, 0.25, 10.0, "a"),
            record(1, 0.8, 0.6, 10.0, "a"),
            // same molecule id in another treatment has its own first dwell
            record(1, 0.9, 0.1, 10.0, "b"),
            record(1, 0.9, 0.3, 10.0, "b"),
        ]);
        let selected = fret_before_transition(&table, 0.3, 10.0, 0.0).unwrap();
        let afters: Vec<(String, f64)> = selected
            .iter()
            .map(|d| (d.treatment.clone(), d.fret_after))
            .collect();
        assert_eq!(afters, vec![("a".to_string(), 0.25), ("b".to_string(), 0.3)]);
    }
}
