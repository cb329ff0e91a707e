/// Errors raised by the transforms in [`crate::analysis`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// A ratio was requested over an empty group.
    #[error("cannot compute {what} for '{treatment}': no observations in the denominator")]
    EmptyDenominator {
        what: &'static str,
        treatment: String,
    },

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("unknown treatment '{0}'")]
    UnknownTreatment(String),

    #[error("invalid first_dwell option '{0}', expected \"delete\" or \"keep\"")]
    InvalidFirstDwell(String),
}
