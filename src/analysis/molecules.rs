use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use super::error::AnalysisError;
use crate::data::model::{TrajectoryTable, TransitionTable};

/// Keep every record of molecules that reach `threshold` or below at least
/// once (before or after some transition). Molecules are keyed per treatment.
pub fn filter_molecules_below(table: &TransitionTable, threshold: f64) -> TransitionTable {
    let visiting: HashSet<(&str, u64)> = table
        .records
        .iter()
        .filter(|r| r.fret_before <= threshold || r.fret_after <= threshold)
        .map(|r| (r.treatment.as_str(), r.molecule))
        .collect();

    TransitionTable::new(
        table
            .records
            .iter()
            .filter(|r| visiting.contains(&(r.treatment.as_str(), r.molecule)))
            .cloned()
            .collect(),
    )
}

/// Share of a treatment's molecules that visit the low-FRET state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoleculeFraction {
    pub treatment: String,
    pub percent_mol: f64,
    /// `percent_mol` minus the reference treatment's `percent_mol`.
    pub norm_percent_mol: f64,
}

fn distinct_molecules(table: &TransitionTable, treatment: &str) -> usize {
    table
        .records
        .iter()
        .filter(|r| r.treatment == treatment)
        .map(|r| r.molecule)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Percentage of molecules per treatment that reach `threshold` or below,
/// plus the same value relative to the `reference` treatment.
/// Rows follow the order of `treatments`.
pub fn count_filtered_molecules(
    table: &TransitionTable,
    threshold: f64,
    treatments: &[String],
    reference: &str,
) -> Result<Vec<MoleculeFraction>, AnalysisError> {
    if !treatments.iter().any(|t| t == reference) {
        return Err(AnalysisError::UnknownTreatment(reference.to_string()));
    }

    let filtered = filter_molecules_below(table, threshold);
    let mut percents = Vec::with_capacity(treatments.len());
    for treatment in treatments {
        let total = distinct_molecules(table, treatment);
        if total == 0 {
            return Err(AnalysisError::EmptyDenominator {
                what: "molecule fraction",
                treatment: treatment.clone(),
            });
        }
        let kept = distinct_molecules(&filtered, treatment);
        percents.push(kept as f64 / total as f64 * 100.0);
    }

    let reference_percent = treatments
        .iter()
        .zip(&percents)
        .find(|(t, _)| *t == reference)
        .map(|(_, p)| *p)
        .ok_or_else(|| AnalysisError::UnknownTreatment(reference.to_string()))?;

    Ok(treatments
        .iter()
        .zip(percents)
        .map(|(treatment, percent_mol)| MoleculeFraction {
            treatment: treatment.clone(),
            percent_mol,
            norm_percent_mol: percent_mol - reference_percent,
        })
        .collect())
}

/// Transition molecules with no trajectory in the same treatment, as
/// `(treatment, molecule)` pairs. Trajectories are matched by the number at
/// the end of their molecule id (`molecule_12` → 12).
pub fn check_molecule_coverage(
    trajectories: &TrajectoryTable,
    transitions: &TransitionTable,
) -> Vec<(String, u64)> {
    let known: HashSet<(&str, u64)> = trajectories
        .frames
        .iter()
        .filter_map(|f| trailing_number(&f.molecule).map(|n| (f.treatment.as_str(), n)))
        .collect();

    let missing: BTreeSet<(String, u64)> = transitions
        .records
        .iter()
        .filter(|r| !known.contains(&(r.treatment.as_str(), r.molecule)))
        .map(|r| (r.treatment.clone(), r.molecule))
        .collect();

    if !missing.is_empty() {
        log::debug!("transition molecules without a trajectory: {missing:?}");
    }
    missing.into_iter().collect()
}

fn trailing_number(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    id[digits_start..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{TrajectoryFrame, TransitionRecord};

    fn record(treatment: &str, molecule: u64, before: f64, after: f64) -> TransitionRecord {
        TransitionRecord {
            molecule,
            fret_before: before,
            fret_after: after,
            dwell_frames: 5.0,
            treatment: treatment.to_string(),
        }
    }

    fn table() -> TransitionTable {
        TransitionTable::new(vec![
            // Native: 1 of 4 molecules goes to 0.3 or below
            record("Native", 1, 0.8, 0.3),
            record("Native", 1, 0.3, 0.8),
            record("Native", 2, 0.8, 0.6),
            record("Native", 3, 0.7, 0.9),
            record("Native", 4, 0.9, 0.5),
            // ATP: 3 of 4
            record("ATP", 1, 0.8, 0.1),
            record("ATP", 2, 0.2, 0.8),
            record("ATP", 3, 0.8, 0.25),
            record("ATP", 3, 0.25, 0.9),
            record("ATP", 4, 0.9, 0.7),
        ])
    }

    #[test]
    fn filter_keeps_all_records_of_visiting_molecules() {
        let filtered = filter_molecules_below(&table(), 0.3);
        assert_eq!(filtered.len(), 6);
        assert!(filtered
            .records
            .iter()
            .all(|r| !(r.treatment == "Native" && r.molecule != 1)));
    }

    #[test]
    fn percentages_relative_to_reference() {
        let treatments = vec!["Native".to_string(), "ATP".to_string()];
        let rows = count_filtered_molecules(&table(), 0.3, &treatments, "Native").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].treatment, "Native");
        assert_eq!(rows[0].percent_mol, 25.0);
        assert_eq!(rows[0].norm_percent_mol, 0.0);
        assert_eq!(rows[1].percent_mol, 75.0);
        assert_eq!(rows[1].norm_percent_mol, 50.0);
    }

    #[test]
    fn unknown_reference() {
        let treatments = vec!["Native".to_string()];
        let err = count_filtered_molecules(&table(), 0.3, &treatments, "ADP").unwrap_err();
        assert_eq!(err, AnalysisError::UnknownTreatment("ADP".to_string()));
    }

    #[test]
    fn treatment_without_molecules() {
        let treatments = vec!["Native".to_string(), "Empty".to_string()];
        let err = count_filtered_molecules(&table(), 0.3, &treatments, "Native").unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDenominator { .. }));
    }

    #[test]
    fn coverage_matches_trailing_numbers() {
        let frame = |molecule: &str| TrajectoryFrame {
            frame: 0,
            donor: 1.0,
            acceptor: 1.0,
            fret: 0.5,
            idealized_fret: 0.5,
            treatment: "Native".to_string(),
            molecule: molecule.to_string(),
        };
        let trajectories = TrajectoryTable::new(vec![
            frame("molecule_1"),
            frame("trace2"),
            frame("3"),
        ]);
        let missing = check_molecule_coverage(&trajectories, &table().for_treatment("Native"));
        assert_eq!(missing, vec![("Native".to_string(), 4)]);
    }

    #[test]
    fn trailing_number_parsing() {
        assert_eq!(trailing_number("molecule_12"), Some(12));
        assert_eq!(trailing_number("7"), Some(7));
        assert_eq!(trailing_number("trace"), None);
    }
}
