//! Batch driver: runs every stage for each treatment of an experiment file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::analysis::{
    calculate_mean, check_molecule_coverage, classify_dwells, cleanup_dwell,
    count_filtered_molecules, heatmap_prep, remove_trajectory_outliers,
    remove_transition_outliers, transition_frequency, AnalysisError, MeanDwell, MoleculeFraction,
    Occupancy, TransitionFrequency,
};
use crate::config::{ExperimentConfig, TreatmentConfig};
use crate::data::export;
use crate::data::loader::{load_histogram_dir, load_transitions};
use crate::data::model::{TrajectoryTable, TransitionTable};
use crate::render::{self, PlotStyle};

pub const COMPILED_CSV: &str = "Raw_FRET_histogram_data.csv";
pub const COMPILED_PARQUET: &str = "Raw_FRET_histogram_data.parquet";

/// Everything computed by [`run_experiment`].
#[derive(Debug, Default)]
pub struct ExperimentSummary {
    /// Outlier-free trajectories of all treatments.
    pub trajectories: TrajectoryTable,
    /// Outlier-free transitions of all treatments that declare a file.
    pub transitions: TransitionTable,
    pub frequencies: Vec<TransitionFrequency>,
    pub means: Vec<MeanDwell>,
    pub occupancy: Vec<Occupancy>,
    pub molecule_fractions: Vec<MoleculeFraction>,
    /// Files written to the output folder.
    pub written: Vec<PathBuf>,
}

/// Run loading, filtering, aggregation, export and rendering for every
/// treatment. Treatments whose statistics have an empty denominator are
/// reported and skipped; any other failure aborts the run.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentSummary> {
    let out = &config.output_folder;
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output folder {}", out.display()))?;
    let analysis = &config.analysis;
    let style = PlotStyle::from_config(config);
    let mut summary = ExperimentSummary::default();

    let mut compiled = Vec::with_capacity(config.treatments.len());
    let mut transitions = Vec::new();
    for treatment in &config.treatments {
        let table = load_histogram_dir(&treatment.histogram_dir, &treatment.name)
            .with_context(|| format!("Loading trajectories for '{}'", treatment.name))?;
        let cleaned = remove_trajectory_outliers(&table, analysis.fret_source);
        info!(
            "{}: {} of {} frames kept after outlier removal",
            treatment.name,
            cleaned.len(),
            table.len()
        );

        if let Some(table) = analyse_transitions(config, treatment, &cleaned, &style, &mut summary)? {
            transitions.push(table);
        }
        compiled.push(cleaned);
    }
    summary.trajectories = TrajectoryTable::concat(compiled);
    summary.transitions = TransitionTable::concat(transitions);

    let compiled_csv = out.join(COMPILED_CSV);
    export::write_trajectories_csv(&compiled_csv, &summary.trajectories)?;
    summary.written.push(compiled_csv);
    if config.plot.parquet {
        let compiled_parquet = out.join(COMPILED_PARQUET);
        export::write_trajectories_parquet(&compiled_parquet, &summary.trajectories)?;
        summary.written.push(compiled_parquet);
    }

    for treatment in config.ordered_treatments() {
        match heatmap_prep(
            &summary.trajectories,
            &treatment,
            analysis.fret_threshold,
            analysis.fret_source,
        ) {
            Ok(occ) => summary.occupancy.push(occ),
            Err(e @ AnalysisError::EmptyDenominator { .. }) => warn!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }

    summary.molecule_fractions = molecule_fractions(config, &summary.transitions)?;

    write_summaries(out, &mut summary)?;
    render_figures(config, &style, &mut summary)?;

    info!("wrote {} files to {}", summary.written.len(), out.display());
    Ok(summary)
}

/// Load, clean and aggregate one treatment's transitions. Returns the
/// outlier-free table, or `None` when the treatment has no transition file.
fn analyse_transitions(
    config: &ExperimentConfig,
    treatment: &TreatmentConfig,
    trajectories: &TrajectoryTable,
    style: &PlotStyle,
    summary: &mut ExperimentSummary,
) -> Result<Option<TransitionTable>> {
    let Some(path) = &treatment.transitions else {
        return Ok(None);
    };
    let analysis = &config.analysis;
    let out = &config.output_folder;
    let name = &treatment.name;

    let raw = load_transitions(path, name)
        .with_context(|| format!("Loading transitions for '{name}'"))?;
    let table = remove_transition_outliers(&raw);

    let missing = check_molecule_coverage(trajectories, &table);
    if !missing.is_empty() {
        warn!(
            "{name}: {} transition molecules have no trajectory file",
            missing.len()
        );
    }

    let dwells = cleanup_dwell(&table, analysis.fps, analysis.min_dwell_s, analysis.first_dwell)?;
    let classified = classify_dwells(&dwells, analysis.fret_threshold);

    let dwell_csv = out.join(format!("{name}_cleaned_dwell.csv"));
    export::write_dwells_csv(&dwell_csv, &dwells)?;
    let classified_csv = out.join(format!("{name}_classified_dwell.csv"));
    export::write_classified_csv(&classified_csv, &classified)?;
    summary.written.extend([dwell_csv, classified_csv]);

    match transition_frequency(&classified, name) {
        Ok(freq) => summary.frequencies.push(freq),
        Err(e @ AnalysisError::EmptyDenominator { .. }) => warn!("{e}"),
        Err(e) => return Err(e.into()),
    }
    summary.means.push(calculate_mean(&classified, name));

    let tdp = out.join(format!("{name}_TDP.svg"));
    render::render_tdp(&tdp, &table, style.label(name))?;
    summary.written.push(tdp);

    Ok(Some(table))
}

fn molecule_fractions(
    config: &ExperimentConfig,
    transitions: &TransitionTable,
) -> Result<Vec<MoleculeFraction>> {
    let with_transitions: Vec<String> = config
        .ordered_treatments()
        .into_iter()
        .filter(|name| {
            config
                .treatments
                .iter()
                .any(|t| &t.name == name && t.transitions.is_some())
        })
        .collect();
    if with_transitions.is_empty() {
        return Ok(Vec::new());
    }

    let reference = config.reference();
    if !with_transitions.iter().any(|t| t == reference) {
        warn!("reference treatment '{reference}' has no transitions, skipping molecule fractions");
        return Ok(Vec::new());
    }

    match count_filtered_molecules(
        transitions,
        config.analysis.molecule_threshold,
        &with_transitions,
        reference,
    ) {
        Ok(rows) => Ok(rows),
        Err(e @ AnalysisError::EmptyDenominator { .. }) => {
            warn!("{e}");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_summaries(out: &Path, summary: &mut ExperimentSummary) -> Result<()> {
    if !summary.frequencies.is_empty() {
        let path = out.join("transition_frequency.csv");
        export::write_frequencies_csv(&path, &summary.frequencies)?;
        summary.written.push(path);
    }
    if !summary.means.is_empty() {
        let path = out.join("mean_dwell.csv");
        export::write_means_csv(&path, &summary.means)?;
        summary.written.push(path);
    }
    if !summary.occupancy.is_empty() {
        let path = out.join("occupancy.csv");
        export::write_occupancy_csv(&path, &summary.occupancy)?;
        summary.written.push(path);
    }
    if !summary.molecule_fractions.is_empty() {
        let path = out.join("molecule_fraction.csv");
        export::write_molecule_fractions_csv(&path, &summary.molecule_fractions)?;
        summary.written.push(path);
    }
    Ok(())
}

fn render_figures(
    config: &ExperimentConfig,
    style: &PlotStyle,
    summary: &mut ExperimentSummary,
) -> Result<()> {
    let out = &config.output_folder;
    let source = config.analysis.fret_source;

    let histogram = out.join("Histogram.svg");
    render::render_histogram(&histogram, &summary.trajectories, source, style)?;
    let ridgeline = out.join("Histogram-ridgeline.svg");
    render::render_ridgeline(&ridgeline, &summary.trajectories, source, style)?;
    let heatmap = out.join("Heatmap.svg");
    render::render_occupancy_heatmap(
        &heatmap,
        &summary.occupancy,
        &summary.frequencies,
        &summary.means,
        style,
    )?;

    summary.written.extend([histogram, ridgeline, heatmap]);
    Ok(())
}
