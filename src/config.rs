//! TOML experiment description.
//!
//! One file declares every treatment of an experiment and the analysis
//! parameters shared between them:
//!
//! ```toml
//! output_folder = "Experiment_X/results"
//!
//! [analysis]
//! fps = 5.0
//! fret_threshold = 0.5
//! min_dwell_s = 0.0
//! first_dwell = "delete"
//! fret_source = "raw"
//! molecule_threshold = 0.3
//! reference = "Native"
//!
//! [plot]
//! order = ["Native", "Spontaneous"]
//!
//! [[treatments]]
//! name = "Native"
//! label = "Native"
//! histogram_dir = "data/native"
//! transitions = "data/native/transitions.dat"
//! color = "black"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analysis::FirstDwell;
use crate::data::model::FretSource;

/// Errors raised while reading or validating an experiment file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root of an experiment file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    /// Where CSV tables and figures are written.
    pub output_folder: PathBuf,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub plot: PlotConfig,

    #[serde(default)]
    pub treatments: Vec<TreatmentConfig>,
}

/// Parameters shared by every treatment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Camera frame rate used to convert dwell frames to seconds.
    pub fps: f64,
    /// Threshold defining the low and high FRET states.
    pub fret_threshold: f64,
    /// Shortest dwell (seconds) kept by the cleanup.
    pub min_dwell_s: f64,
    pub first_dwell: FirstDwell,
    pub fret_source: FretSource,
    /// Threshold for counting molecules that visit the low state.
    pub molecule_threshold: f64,
    /// Treatment subtracted in the normalised molecule fraction.
    /// Defaults to the first treatment.
    pub reference: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fps: 5.0,
            fret_threshold: 0.5,
            min_dwell_s: 0.0,
            first_dwell: FirstDwell::Delete,
            fret_source: FretSource::Raw,
            molecule_threshold: 0.3,
            reference: None,
        }
    }
}

/// Presentation settings for the figures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Treatment drawing order; unlisted treatments follow in file order.
    pub order: Vec<String>,
    /// Also export the compiled trajectories as Parquet.
    pub parquet: bool,
}

/// One experimental condition.
#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentConfig {
    pub name: String,
    /// Legend label; defaults to `name`.
    pub label: Option<String>,
    /// Directory of per-molecule `.dat` trajectories.
    pub histogram_dir: PathBuf,
    /// Transition table for this treatment, if dwell analysis is wanted.
    pub transitions: Option<PathBuf>,
    /// CSS colour name or hex code.
    pub color: Option<String>,
}

impl ExperimentConfig {
    /// Load configuration from a TOML file. Relative data paths are resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ExperimentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let analysis = &self.analysis;
        if !analysis.fps.is_finite() || analysis.fps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fps must be positive, got {}",
                analysis.fps
            )));
        }
        for (name, value) in [
            ("fret_threshold", analysis.fret_threshold),
            ("min_dwell_s", analysis.min_dwell_s),
            ("molecule_threshold", analysis.molecule_threshold),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a finite number, got {value}"
                )));
            }
        }
        if self.treatments.is_empty() {
            return Err(ConfigError::Invalid("no [[treatments]] declared".into()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for t in &self.treatments {
            if !seen.insert(t.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "treatment '{}' declared twice",
                    t.name
                )));
            }
        }
        if let Some(reference) = &analysis.reference {
            if !seen.contains(reference.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "reference treatment '{reference}' is not declared"
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output_folder);
        for t in &mut self.treatments {
            resolve(&mut t.histogram_dir);
            if let Some(transitions) = t.transitions.as_mut() {
                resolve(transitions);
            }
        }
    }

    /// Treatment names in drawing order.
    pub fn ordered_treatments(&self) -> Vec<String> {
        let mut ordered: Vec<String> = self
            .plot
            .order
            .iter()
            .filter(|name| self.treatments.iter().any(|t| &t.name == *name))
            .cloned()
            .collect();
        for t in &self.treatments {
            if !ordered.contains(&t.name) {
                ordered.push(t.name.clone());
            }
        }
        ordered
    }

    /// The reference treatment: explicit, or the first declared.
    pub fn reference(&self) -> &str {
        self.analysis
            .reference
            .as_deref()
            .or_else(|| self.treatments.first().map(|t| t.name.as_str()))
            .unwrap_or_default()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.treatments
            .iter()
            .map(|t| (t.name.clone(), t.label.clone().unwrap_or_else(|| t.name.clone())))
            .collect()
    }

    pub fn colors(&self) -> BTreeMap<String, String> {
        self.treatments
            .iter()
            .filter_map(|t| t.color.clone().map(|c| (t.name.clone(), c)))
            .collect()
    }
}
