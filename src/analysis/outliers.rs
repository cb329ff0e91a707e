use crate::data::model::{
    FretSource, TrajectoryTable, TransitionTable, FRET_LOWER_BOUND, FRET_UPPER_BOUND,
};

/// Keep frames whose selected FRET value lies strictly inside the bounds.
pub fn remove_trajectory_outliers(table: &TrajectoryTable, source: FretSource) -> TrajectoryTable {
    let frames: Vec<_> = table
        .frames
        .iter()
        .filter(|f| {
            let v = f.value(source);
            v > FRET_LOWER_BOUND && v < FRET_UPPER_BOUND
        })
        .cloned()
        .collect();

    log::debug!(
        "removed {} of {} frames outside ({FRET_LOWER_BOUND}, {FRET_UPPER_BOUND}) using {source} FRET",
        table.len() - frames.len(),
        table.len()
    );
    TrajectoryTable::new(frames)
}

/// Drop transitions whose before or after FRET leaves the bounds.
/// Values exactly on a bound are kept.
pub fn remove_transition_outliers(table: &TransitionTable) -> TransitionTable {
    let in_range = |v: f64| (FRET_LOWER_BOUND..=FRET_UPPER_BOUND).contains(&v);
    let records: Vec<_> = table
        .records
        .iter()
        .filter(|r| in_range(r.fret_before) && in_range(r.fret_after))
        .cloned()
        .collect();

    log::debug!(
        "removed {} of {} transitions outside [{FRET_LOWER_BOUND}, {FRET_UPPER_BOUND}]",
        table.len() - records.len(),
        table.len()
    );
    TransitionTable::new(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{TrajectoryFrame, TransitionRecord};
    use proptest::prelude::*;

    fn trajectory(values: &[f64]) -> TrajectoryTable {
        TrajectoryTable::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| TrajectoryFrame {
                    frame: i as u64,
                    donor: 1.0,
                    acceptor: 1.0,
                    fret: v,
                    idealized_fret: 1.0 - v,
                    treatment: "t".to_string(),
                    molecule: format!("m{}", i % 4),
                })
                .collect(),
        )
    }

    #[test]
    fn drops_raw_outliers() {
        let table = trajectory(&[0.2, 0.6, 0.5, 0.9, -0.9, 1.6]);
        let cleaned = remove_trajectory_outliers(&table, FretSource::Raw);
        let kept: Vec<f64> = cleaned.frames.iter().map(|f| f.fret).collect();
        assert_eq!(kept, vec![0.2, 0.6, 0.5, 0.9]);
    }

    #[test]
    fn trajectory_bounds_are_exclusive() {
        let table = trajectory(&[-0.5, 1.5, 0.0]);
        let cleaned = remove_trajectory_outliers(&table, FretSource::Raw);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn idealized_source_reads_idealized_column() {
        // idealized = 1 - raw, so raw 2.0 gives idealized -1.0
        let table = trajectory(&[0.3, 2.0]);
        let cleaned = remove_trajectory_outliers(&table, FretSource::Idealized);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.frames[0].fret, 0.3);
    }

    #[test]
    fn transition_bounds_are_inclusive() {
        let record = |before: f64, after: f64| TransitionRecord {
            molecule: 1,
            fret_before: before,
            fret_after: after,
            dwell_frames: 10.0,
            treatment: "t".to_string(),
        };
        let table = TransitionTable::new(vec![
            record(-0.5, 1.5),
            record(0.2, 1.6),
            record(-0.6, 0.3),
            record(0.4, f64::NAN),
            record(0.3, 0.7),
        ]);
        let cleaned = remove_transition_outliers(&table);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.records[0].fret_before, -0.5);
        assert_eq!(cleaned.records[1].fret_after, 0.7);
        // input untouched
        assert_eq!(table.len(), 5);
    }

    proptest! {
        #[test]
        fn output_within_bounds_and_idempotent(values in prop::collection::vec(-3.0f64..3.0, 0..200)) {
            let table = trajectory(&values);
            let once = remove_trajectory_outliers(&table, FretSource::Raw);
            for frame in &once.frames {
                prop_assert!(frame.fret > FRET_LOWER_BOUND && frame.fret < FRET_UPPER_BOUND);
            }
            let twice = remove_trajectory_outliers(&once, FretSource::Raw);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn transitions_within_inclusive_bounds_and_idempotent(
            pairs in prop::collection::vec(
                (
                    prop_oneof![-3.0f64..3.0, Just(-0.5), Just(1.5), Just(f64::NAN)],
                    prop_oneof![-3.0f64..3.0, Just(-0.5), Just(1.5), Just(f64::NAN)],
                ),
                0..200,
            )
        ) {
            let table = TransitionTable::new(
                pairs
                    .iter()
                    .enumerate()
                    .map(|(i, &(before, after))| TransitionRecord {
                        molecule: i as u64 % 5,
                        fret_before: before,
                        fret_after: after,
                        dwell_frames: 1.0 + i as f64,
                        treatment: "t".to_string(),
                    })
                    .collect(),
            );
            let once = remove_transition_outliers(&table);

            let expected = pairs
                .iter()
                .filter(|&&(b, a)| {
                    (-0.5..=1.5).contains(&b) && (-0.5..=1.5).contains(&a)
                })
                .count();
            prop_assert_eq!(once.len(), expected);
            for r in &once.records {
                prop_assert!(r.fret_before >= FRET_LOWER_BOUND && r.fret_before <= FRET_UPPER_BOUND);
                prop_assert!(r.fret_after >= FRET_LOWER_BOUND && r.fret_after <= FRET_UPPER_BOUND);
            }

            let twice = remove_transition_outliers(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
