//! End-to-end runs of the experiment pipeline on small hand-written inputs.

use std::fs;
use std::path::Path;

use fret_panda::config::ExperimentConfig;
use fret_panda::data::loader::load_compiled_trajectories;
use fret_panda::data::model::TransitionClass;
use fret_panda::pipeline::{run_experiment, COMPILED_CSV, COMPILED_PARQUET};
use tempfile::tempdir;

/// Write a `.dat` trajectory with the given raw FRET values.
fn write_trace(dir: &Path, name: &str, fret: &[f64]) {
    fs::create_dir_all(dir).unwrap();
    let body: String = fret
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{i} 100.0 50.0 {v} 0.3\n"))
        .collect();
    fs::write(dir.join(format!("{name}.dat")), body).unwrap();
}

/// Two treatments: A with the occupancy and frequency scenarios, B with two
/// molecules of which one visits the low state.
fn write_experiment(root: &Path, extra: &str) -> ExperimentConfig {
    write_trace(&root.join("A"), "molecule_1", &[0.2, 0.6, 0.5, 0.9, -0.9, 1.6]);
    write_trace(&root.join("B"), "molecule_1", &[0.8, 0.9]);
    write_trace(&root.join("B"), "molecule_2", &[0.1, 0.7]);

    fs::create_dir_all(root.join("transitions")).unwrap();
    fs::write(
        root.join("transitions/A.dat"),
        "1\t0.2\t0.6\t10\n1\t0.2\t0.6\t5\n1\t0.6\t0.2\t5\n1\t0.7\t0.8\t5\n1\t0.1\t0.2\t5\n",
    )
    .unwrap();
    fs::write(
        root.join("transitions/B.dat"),
        "1 0.8 0.9 5\n1 0.9 0.8 5\n2 0.1 0.7 5\n2 0.7 0.8 5\n",
    )
    .unwrap();

    let toml = format!(
        r#"
        output_folder = "results"

        [analysis]
        fps = 5.0
        fret_threshold = 0.5
        molecule_threshold = 0.3
        {extra}

        [plot]
        parquet = true

        [[treatments]]
        name = "A"
        histogram_dir = "A"
        transitions = "transitions/A.dat"
        color = "black"

        [[treatments]]
        name = "B"
        label = "Treatment B"
        histogram_dir = "B"
        transitions = "transitions/B.dat"
        "#
    );
    let path = root.join("experiment.toml");
    fs::write(&path, toml).unwrap();
    ExperimentConfig::from_file(&path).unwrap()
}

#[test]
fn test_full_experiment() {
    let dir = tempdir().unwrap();
    let config = write_experiment(dir.path(), "");
    let summary = run_experiment(&config).unwrap();
    let out = dir.path().join("results");

    // Outliers -0.9 and 1.6 are gone; 0.5 stays in the table.
    assert_eq!(summary.trajectories.len(), 4 + 2 + 2);
    let reloaded = load_compiled_trajectories(&out.join(COMPILED_CSV)).unwrap();
    assert_eq!(reloaded, summary.trajectories);
    let reloaded = load_compiled_trajectories(&out.join(COMPILED_PARQUET)).unwrap();
    assert_eq!(reloaded, summary.trajectories);

    // Occupancy excludes the frame at the threshold.
    let a = &summary.occupancy[0];
    assert_eq!(a.treatment, "A");
    assert!((a.time_below - 1.0 / 3.0).abs() < 1e-12);
    assert!((a.time_above - 2.0 / 3.0).abs() < 1e-12);

    // First dwell deleted: one transition of each class remains for A.
    let freq_a = &summary.frequencies[0];
    for class in TransitionClass::ALL {
        assert!((freq_a.get(class) - 25.0).abs() < 1e-9);
    }
    assert_eq!(summary.means[0].get(TransitionClass::LowToHigh), Some(1.0));

    let freq_b = &summary.frequencies[1];
    assert_eq!(freq_b.get(TransitionClass::HighToHigh), 100.0);

    // Reference defaults to the first treatment.
    let fractions = &summary.molecule_fractions;
    assert_eq!(fractions.len(), 2);
    assert_eq!(fractions[0].percent_mol, 100.0);
    assert_eq!(fractions[0].norm_percent_mol, 0.0);
    assert_eq!(fractions[1].percent_mol, 50.0);
    assert_eq!(fractions[1].norm_percent_mol, -50.0);

    for name in [
        "A_cleaned_dwell.csv",
        "A_classified_dwell.csv",
        "B_TDP.svg",
        "transition_frequency.csv",
        "mean_dwell.csv",
        "occupancy.csv",
        "molecule_fraction.csv",
        "Histogram.svg",
        "Histogram-ridgeline.svg",
        "Heatmap.svg",
    ] {
        let path = out.join(name);
        assert!(path.exists(), "missing {name}");
        assert!(summary.written.contains(&path), "{name} not reported");
    }

    let histogram = fs::read_to_string(out.join("Histogram.svg")).unwrap();
    assert!(histogram.contains("Treatment B"));

    // Transition arrows are labelled with the mean dwell of their class.
    let heatmap = fs::read_to_string(out.join("Heatmap.svg")).unwrap();
    assert!(heatmap.contains("1.0 s"));

    let frequency_csv = fs::read_to_string(out.join("transition_frequency.csv")).unwrap();
    assert!(frequency_csv.starts_with("< 0.5 to < 0.5,< 0.5 to > 0.5,> 0.5 to > 0.5,> 0.5 to < 0.5,sample"));
}

#[test]
fn test_explicit_reference_and_keep_first_dwell() {
    let dir = tempdir().unwrap();
    let config = write_experiment(dir.path(), "reference = \"B\"\nfirst_dwell = \"keep\"");
    let summary = run_experiment(&config).unwrap();

    let fractions = &summary.molecule_fractions;
    assert_eq!(fractions[0].norm_percent_mol, 50.0);
    assert_eq!(fractions[1].norm_percent_mol, 0.0);

    // Keeping the first dwell adds the extra LowToHigh record of A.
    let freq_a = &summary.frequencies[0];
    assert!((freq_a.get(TransitionClass::LowToHigh) - 40.0).abs() < 1e-9);
    let total: f64 = TransitionClass::ALL.iter().map(|&c| freq_a.get(c)).sum();
    assert!((total - 100.0).abs() < 1e-9);
}

#[test]
fn test_treatment_without_transitions() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_trace(&root.join("A"), "molecule_1", &[0.2, 0.8]);
    let path = root.join("experiment.toml");
    fs::write(
        &path,
        r#"
        output_folder = "out"
        [[treatments]]
        name = "A"
        histogram_dir = "A"
        "#,
    )
    .unwrap();
    let config = ExperimentConfig::from_file(&path).unwrap();
    let summary = run_experiment(&config).unwrap();

    assert!(summary.frequencies.is_empty());
    assert!(summary.molecule_fractions.is_empty());
    assert_eq!(summary.occupancy.len(), 1);
    assert!(!root.join("out/molecule_fraction.csv").exists());
    assert!(!root.join("out").join(COMPILED_PARQUET).exists());
    assert!(root.join("out/Heatmap.svg").exists());
}

#[test]
fn test_missing_histogram_dir_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("experiment.toml");
    fs::write(
        &path,
        r#"
        output_folder = "out"
        [[treatments]]
        name = "A"
        histogram_dir = "does-not-exist"
        "#,
    )
    .unwrap();
    let config = ExperimentConfig::from_file(&path).unwrap();
    let err = run_experiment(&config).unwrap_err();
    assert!(format!("{err:#}").contains("Loading trajectories for 'A'"));
}
