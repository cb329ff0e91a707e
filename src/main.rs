//! # fret-panda
//!
//! Command-line front end for the smFRET analysis stages.
//!
//! ```bash
//! # Whole experiment from a TOML description
//! fret-panda run experiment.toml
//!
//! # Individual stages
//! fret-panda compile -t Native=data/native -t Spont=data/spont -o compiled.csv
//! fret-panda dwell data/native/transitions.dat --treatment Native -o results/
//! fret-panda occupancy compiled.csv --threshold 0.5
//! fret-panda molecules -t Native=a.dat -t Spont=b.dat --reference Native
//! fret-panda plot compiled.csv -o figures/
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use fret_panda::analysis::{
    calculate_mean, classify_dwells, cleanup_dwell, count_filtered_molecules,
    fret_before_transition, heatmap_prep, remove_trajectory_outliers,
    remove_transition_outliers, transition_frequency, FirstDwell,
};
use fret_panda::config::ExperimentConfig;
use fret_panda::data::export;
use fret_panda::data::loader::{load, load_compiled_trajectories, DataKind, LoadedTable};
use fret_panda::data::model::{FretSource, TrajectoryTable, TransitionTable};
use fret_panda::pipeline::run_experiment;
use fret_panda::render::{self, PlotStyle};

/// fret-panda - single-molecule FRET histogram and dwell-time analysis
#[derive(Parser)]
#[command(name = "fret-panda")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile per-molecule trajectory directories into one table
    Compile {
        /// Treatment and its directory of .dat files, as NAME=DIR (repeatable)
        #[arg(short, long = "treatment", value_name = "NAME=DIR", value_parser = parse_pair, required = true)]
        treatments: Vec<(String, PathBuf)>,

        /// Output CSV path
        #[arg(short, long, default_value = "Raw_FRET_histogram_data.csv")]
        output: PathBuf,

        /// FRET column used by the outlier filter (raw or idealized)
        #[arg(long, default_value = "raw")]
        source: FretSource,

        /// Also write a Parquet copy next to the CSV
        #[arg(long)]
        parquet: bool,
    },

    /// Clean, classify and summarise the dwell times of one transition file
    Dwell {
        /// Transition file (molecule, FRET before, FRET after, frames)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Treatment label attached to every record
        #[arg(long, default_value = "sample")]
        treatment: String,

        /// Camera frame rate
        #[arg(long, default_value = "5.0")]
        fps: f64,

        /// Shortest dwell kept, in seconds
        #[arg(long, default_value = "0.0")]
        min_dwell: f64,

        /// Drop or keep the first dwell of each molecule (delete or keep)
        #[arg(long, default_value = "delete")]
        first_dwell: FirstDwell,

        /// Threshold separating low and high FRET
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Fraction of frames below and above a threshold, per treatment
    Occupancy {
        /// Compiled trajectory table (CSV or Parquet)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long, default_value = "0.5")]
        threshold: f64,

        #[arg(long, default_value = "raw")]
        source: FretSource,

        /// Output CSV path
        #[arg(short, long, default_value = "occupancy.csv")]
        output: PathBuf,
    },

    /// Share of molecules per treatment that visit the low-FRET state
    Molecules {
        /// Treatment and its transition file, as NAME=FILE (repeatable)
        #[arg(short, long = "treatment", value_name = "NAME=FILE", value_parser = parse_pair, required = true)]
        treatments: Vec<(String, PathBuf)>,

        #[arg(long, default_value = "0.3")]
        threshold: f64,

        /// Treatment subtracted in the normalised fraction (defaults to the first)
        #[arg(long)]
        reference: Option<String>,

        #[arg(short, long, default_value = "molecule_fraction.csv")]
        output: PathBuf,
    },

    /// Run every stage for an experiment description
    Run {
        /// TOML experiment file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Render FRET histograms from a compiled trajectory table
    Plot {
        /// Compiled trajectory table (CSV or Parquet)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long, default_value = "raw")]
        source: FretSource,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Load any supported input and print a short preview
    Inspect {
        /// Input kind: hist, TDP, transition_frequency or other
        #[arg(short, long, default_value = "other")]
        kind: DataKind,

        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Treatment label for hist and TDP inputs
        #[arg(long, default_value = "sample")]
        treatment: String,

        /// Column names for transition_frequency inputs
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Compile {
            treatments,
            output,
            source,
            parquet,
        } => run_compile(&treatments, &output, source, parquet),
        Commands::Dwell {
            input,
            treatment,
            fps,
            min_dwell,
            first_dwell,
            threshold,
            output,
        } => run_dwell(&input, &treatment, fps, min_dwell, first_dwell, threshold, &output),
        Commands::Occupancy {
            input,
            threshold,
            source,
            output,
        } => run_occupancy(&input, threshold, source, &output),
        Commands::Molecules {
            treatments,
            threshold,
            reference,
            output,
        } => run_molecules(&treatments, threshold, reference, &output),
        Commands::Run { config } => run_config(&config),
        Commands::Plot {
            input,
            source,
            output,
        } => run_plot(&input, source, &output),
        Commands::Inspect {
            kind,
            input,
            treatment,
            columns,
            rows,
        } => run_inspect(kind, &input, &treatment, &columns, rows),
    }
}

/// Parse `NAME=PATH`.
fn parse_pair(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{s}'")),
    }
}

fn run_compile(
    treatments: &[(String, PathBuf)],
    output: &Path,
    source: FretSource,
    parquet: bool,
) -> Result<()> {
    let mut tables = Vec::with_capacity(treatments.len());
    for (name, dir) in treatments {
        let LoadedTable::Trajectories(table) = load(dir, DataKind::Histogram, name, None)
            .with_context(|| format!("Failed to load trajectories for '{name}'"))?
        else {
            bail!("{} did not load as trajectories", dir.display());
        };
        let cleaned = remove_trajectory_outliers(&table, source);
        info!("{name}: {} molecules, {} frames", cleaned.molecules().len(), cleaned.len());
        tables.push(cleaned);
    }
    let compiled = TrajectoryTable::concat(tables);

    export::write_trajectories_csv(output, &compiled)?;
    info!("Wrote {}", output.display());
    if parquet {
        let path = output.with_extension("parquet");
        export::write_trajectories_parquet(&path, &compiled)?;
        info!("Wrote {}", path.display());
    }
    println!("Compiled {} frames from {} treatments", compiled.len(), treatments.len());
    Ok(())
}

fn load_transition_file(path: &Path, treatment: &str) -> Result<TransitionTable> {
    match load(path, DataKind::Transitions, treatment, None)
        .with_context(|| format!("Failed to load transitions from {}", path.display()))?
    {
        LoadedTable::Transitions(table) => Ok(remove_transition_outliers(&table)),
        _ => bail!("{} did not load as transitions", path.display()),
    }
}

fn run_dwell(
    input: &Path,
    treatment: &str,
    fps: f64,
    min_dwell: f64,
    first_dwell: FirstDwell,
    threshold: f64,
    output: &Path,
) -> Result<()> {
    let table = load_transition_file(input, treatment)?;
    let dwells = cleanup_dwell(&table, fps, min_dwell, first_dwell)?;
    let classified = classify_dwells(&dwells, threshold);
    let frequency = transition_frequency(&classified, treatment)?;
    let mean = calculate_mean(&classified, treatment);
    let before = fret_before_transition(&table, threshold, fps, min_dwell)?;

    export::write_dwells_csv(&output.join(format!("{treatment}_cleaned_dwell.csv")), &dwells)?;
    export::write_classified_csv(
        &output.join(format!("{treatment}_classified_dwell.csv")),
        &classified,
    )?;
    export::write_dwells_csv(&output.join(format!("{treatment}_FRET_before_low.csv")), &before)?;
    export::write_frequencies_csv(
        &output.join(format!("{treatment}_transition_frequency.csv")),
        std::slice::from_ref(&frequency),
    )?;
    export::write_means_csv(
        &output.join(format!("{treatment}_mean_dwell.csv")),
        std::slice::from_ref(&mean),
    )?;
    render::render_tdp(&output.join(format!("{treatment}_TDP.svg")), &table, treatment)?;

    println!(
        "{treatment}: {} dwells kept of {} transitions, {} classified",
        dwells.len(),
        table.len(),
        classified.total()
    );
    Ok(())
}

fn run_occupancy(input: &Path, threshold: f64, source: FretSource, output: &Path) -> Result<()> {
    let table = load_compiled_trajectories(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    let mut rows = Vec::new();
    for treatment in table.treatments() {
        match heatmap_prep(&table, &treatment, threshold, source) {
            Ok(occupancy) => {
                println!(
                    "{treatment}: {:.3} below, {:.3} above {threshold}",
                    occupancy.time_below, occupancy.time_above
                );
                rows.push(occupancy);
            }
            Err(e) => warn!("{e}"),
        }
    }
    if rows.is_empty() {
        bail!("No treatment in {} has frames off the threshold", input.display());
    }
    export::write_occupancy_csv(output, &rows)?;
    Ok(())
}

fn run_molecules(
    treatments: &[(String, PathBuf)],
    threshold: f64,
    reference: Option<String>,
    output: &Path,
) -> Result<()> {
    let mut tables = Vec::with_capacity(treatments.len());
    for (name, path) in treatments {
        tables.push(load_transition_file(path, name)?);
    }
    let names: Vec<String> = treatments.iter().map(|(name, _)| name.clone()).collect();
    let reference = match reference {
        Some(reference) => reference,
        None => names.first().cloned().unwrap_or_default(),
    };

    let rows = count_filtered_molecules(
        &TransitionTable::concat(tables),
        threshold,
        &names,
        &reference,
    )?;
    for row in &rows {
        println!(
            "{}: {:.1}% of molecules ({:+.1} vs {reference})",
            row.treatment, row.percent_mol, row.norm_percent_mol
        );
    }
    export::write_molecule_fractions_csv(output, &rows)?;
    Ok(())
}

fn run_config(path: &Path) -> Result<()> {
    let config = ExperimentConfig::from_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    info!("Experiment: {} treatments", config.treatments.len());

    let summary = run_experiment(&config)?;
    println!(
        "Wrote {} files to {}",
        summary.written.len(),
        config.output_folder.display()
    );
    Ok(())
}

fn run_plot(input: &Path, source: FretSource, output: &Path) -> Result<()> {
    let table = load_compiled_trajectories(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let style = PlotStyle::for_treatments(&table.treatments());

    render::render_histogram(&output.join("Histogram.svg"), &table, source, &style)?;
    render::render_ridgeline(&output.join("Histogram-ridgeline.svg"), &table, source, &style)?;
    println!("Rendered {} treatments to {}", style.order.len(), output.display());
    Ok(())
}

fn run_inspect(
    kind: DataKind,
    input: &Path,
    treatment: &str,
    columns: &[String],
    rows: usize,
) -> Result<()> {
    let column_names = (!columns.is_empty()).then_some(columns);
    let loaded = load(input, kind, treatment, column_names)
        .with_context(|| format!("Failed to load {} as {kind}", input.display()))?;

    match loaded {
        LoadedTable::Trajectories(table) => {
            println!("{} frames, {} molecules", table.len(), table.molecules().len());
            for f in table.frames.iter().take(rows) {
                println!(
                    "{:>6} {:>10.2} {:>10.2} {:>7.3} {:>7.3} {}",
                    f.frame, f.donor, f.acceptor, f.fret, f.idealized_fret, f.molecule
                );
            }
        }
        LoadedTable::Transitions(table) => {
            println!("{} transitions", table.len());
            for r in table.records.iter().take(rows) {
                println!(
                    "{:>6} {:>7.3} {:>7.3} {:>8}",
                    r.molecule, r.fret_before, r.fret_after, r.dwell_frames
                );
            }
        }
        LoadedTable::Table(table) => {
            println!("{} rows", table.len());
            println!("{}", table.columns.join("\t"));
            for row in table.rows.iter().take(rows) {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("{}", cells.join("\t"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair_splits_on_first_equals() {
        assert_eq!(
            parse_pair("Native=data/a=b").unwrap(),
            ("Native".to_string(), PathBuf::from("data/a=b"))
        );
        assert!(parse_pair("Native").is_err());
        assert!(parse_pair("=dir").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from([
            "fret-panda", "-vv", "dwell", "t.dat", "--first-dwell", "keep", "--fps", "10",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Dwell { first_dwell, fps, .. } => {
                assert_eq!(first_dwell, FirstDwell::Keep);
                assert_eq!(fps, 10.0);
            }
            _ => panic!("expected dwell"),
        }

        assert!(Cli::try_parse_from(["fret-panda", "inspect", "-k", "bogus", "x"]).is_err());
    }

    #[test]
    fn dwell_outputs_are_prefixed_by_treatment() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("transitions.dat");
        std::fs::write(&input, "1 0.2 0.8 10\n1 0.8 0.2 20\n1 0.2 0.9 5\n2 0.7 0.1 15\n2 0.1 0.6 5\n")
            .unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        for treatment in ["Native", "ATP"] {
            run_dwell(&input, treatment, 5.0, 0.0, FirstDwell::Delete, 0.5, &out).unwrap();
        }
        for treatment in ["Native", "ATP"] {
            for suffix in ["transition_frequency.csv", "mean_dwell.csv", "cleaned_dwell.csv", "TDP.svg"] {
                let path = out.join(format!("{treatment}_{suffix}"));
                assert!(path.exists(), "missing {}", path.display());
            }
            let frequency =
                std::fs::read_to_string(out.join(format!("{treatment}_transition_frequency.csv")))
                    .unwrap();
            assert!(frequency.contains(treatment));
        }
        assert!(!out.join("transition_frequency.csv").exists());
        assert!(!out.join("mean_dwell.csv").exists());
    }
}
