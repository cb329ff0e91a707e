use super::dwell::ClassifiedDwells;
use super::error::AnalysisError;
use crate::data::model::TransitionClass;

/// Share of each transition class among all classified transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionFrequency {
    pub treatment: String,
    pub threshold: f64,
    /// Percent per class, indexed by [`TransitionClass::index`].
    pub percent: [f64; 4],
}

impl TransitionFrequency {
    pub fn get(&self, class: TransitionClass) -> f64 {
        self.percent[class.index()]
    }
}

/// Percentage of transitions falling in each class (count / total × 100).
pub fn transition_frequency(
    classified: &ClassifiedDwells,
    treatment: &str,
) -> Result<TransitionFrequency, AnalysisError> {
    let total = classified.total();
    if total == 0 {
        return Err(AnalysisError::EmptyDenominator {
            what: "transition frequency",
            treatment: treatment.to_string(),
        });
    }

    let counts = classified.counts();
    let percent = counts.map(|c| c as f64 / total as f64 * 100.0);
    log::info!(
        "{treatment}: transition frequency {:?} over {total} transitions",
        percent
    );

    Ok(TransitionFrequency {
        treatment: treatment.to_string(),
        threshold: classified.threshold,
        percent,
    })
}

/// Mean dwell time per class, tagged with its treatment.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanDwell {
    pub treatment: String,
    pub threshold: f64,
    /// Mean in seconds per class; `None` when the class has no dwells.
    pub mean_s: [Option<f64>; 4],
}

impl MeanDwell {
    pub fn get(&self, class: TransitionClass) -> Option<f64> {
        self.mean_s[class.index()]
    }
}

pub fn calculate_mean(classified: &ClassifiedDwells, treatment: &str) -> MeanDwell {
    let mean = |values: &Vec<f64>| {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };
    MeanDwell {
        treatment: treatment.to_string(),
        threshold: classified.threshold,
        mean_s: [
            mean(&classified.columns[0]),
            mean(&classified.columns[1]),
            mean(&classified.columns[2]),
            mean(&classified.columns[3]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equal_classes_give_quarters() {
        let classified = ClassifiedDwells {
            threshold: 0.5,
            columns: [vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
        };
        let freq = transition_frequency(&classified, "Native").unwrap();
        assert_eq!(freq.percent, [25.0; 4]);
        assert_eq!(freq.treatment, "Native");
    }

    #[test]
    fn empty_table_is_an_error() {
        let classified = ClassifiedDwells {
            threshold: 0.5,
            ..Default::default()
        };
        let err = transition_frequency(&classified, "x").unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDenominator { .. }));
    }

    #[test]
    fn mean_per_class() {
        let classified = ClassifiedDwells {
            threshold: 0.3,
            columns: [vec![1.0, 3.0], vec![], vec![5.0], vec![2.0, 2.0, 8.0]],
        };
        let mean = calculate_mean(&classified, "ATP");
        assert_eq!(mean.get(TransitionClass::LowToLow), Some(2.0));
        assert_eq!(mean.get(TransitionClass::LowToHigh), None);
        assert_eq!(mean.get(TransitionClass::HighToHigh), Some(5.0));
        assert_eq!(mean.get(TransitionClass::HighToLow), Some(4.0));
        assert_eq!(mean.treatment, "ATP");
    }

    proptest! {
        #[test]
        fn percentages_sum_to_hundred(
            a in 0usize..50, b in 0usize..50, c in 0usize..50, d in 0usize..50
        ) {
            prop_assume!(a + b + c + d > 0);
            let classified = ClassifiedDwells {
                threshold: 0.5,
                columns: [vec![1.0; a], vec![1.0; b], vec![1.0; c], vec![1.0; d]],
            };
            let freq = transition_frequency(&classified, "t").unwrap();
            let sum: f64 = freq.percent.iter().sum();
            prop_assert!((sum - 100.0).abs() < 1e-9);
        }
    }
}
