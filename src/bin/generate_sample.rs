//! Write a synthetic two-state smFRET experiment:
//!
//! ```text
//! <out>/
//!   experiment.toml
//!   <treatment>/molecule_<n>.dat   frame donor acceptor FRET idealized
//!   transitions/<treatment>.dat    molecule before after frames
//!   sample_data.parquet            compiled table for fret-viewer
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fret_panda::data::export::write_trajectories_parquet;
use fret_panda::data::loader::load_histogram_dir;
use fret_panda::data::model::TrajectoryTable;

const MOLECULES: usize = 25;
const FRAMES: usize = 400;
const TOTAL_INTENSITY: f64 = 1000.0;

/// Two-state kinetics of one treatment.
struct Treatment {
    name: &'static str,
    color: &'static str,
    low: f64,
    high: f64,
    /// Per-frame switching probabilities low→high and high→low.
    k_up: f64,
    k_down: f64,
}

const TREATMENTS: [Treatment; 3] = [
    Treatment { name: "Native", color: "black", low: 0.25, high: 0.75, k_up: 0.02, k_down: 0.02 },
    Treatment { name: "Spontaneous", color: "royalblue", low: 0.25, high: 0.75, k_up: 0.01, k_down: 0.04 },
    Treatment { name: "ATP", color: "darkorange", low: 0.3, high: 0.8, k_up: 0.05, k_down: 0.01 },
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One molecule: the `.dat` body and its transitions as
/// `(before, after, frames spent in before)`.
fn simulate_molecule(t: &Treatment, rng: &mut SimpleRng) -> (String, Vec<(f64, f64, usize)>) {
    let mut high = rng.next_f64() < t.k_up / (t.k_up + t.k_down);
    let mut dwell = 0usize;
    let mut body = String::new();
    let mut transitions = Vec::new();

    for frame in 0..FRAMES {
        let ideal = if high { t.high } else { t.low };
        let fret = rng.gauss(ideal, 0.06);
        let acceptor = TOTAL_INTENSITY * fret + rng.gauss(0.0, 20.0);
        let donor = TOTAL_INTENSITY - acceptor + rng.gauss(0.0, 20.0);
        let _ = writeln!(body, "{frame}\t{donor:.2}\t{acceptor:.2}\t{fret:.4}\t{ideal:.4}");

        dwell += 1;
        let switch = if high { t.k_down } else { t.k_up };
        if rng.next_f64() < switch {
            let next = if high { t.low } else { t.high };
            transitions.push((ideal, next, dwell));
            high = !high;
            dwell = 0;
        }
    }
    (body, transitions)
}

fn write_treatment(root: &Path, t: &Treatment, rng: &mut SimpleRng) -> Result<usize> {
    let dir = root.join(t.name);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut table = String::new();
    let mut count = 0;
    for n in 1..=MOLECULES {
        let (body, transitions) = simulate_molecule(t, rng);
        let path = dir.join(format!("molecule_{n}.dat"));
        std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        for (before, after, frames) in transitions {
            let _ = writeln!(table, "{n}\t{before:.4}\t{after:.4}\t{frames}");
            count += 1;
        }
    }
    let path = root.join("transitions").join(format!("{}.dat", t.name));
    std::fs::create_dir_all(root.join("transitions"))
        .with_context(|| format!("Failed to create {}", root.display()))?;
    std::fs::write(&path, table).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(count)
}

fn experiment_toml() -> String {
    let mut toml = String::from(
        "output_folder = \"results\"\n\n\
         [analysis]\n\
         fps = 5.0\n\
         fret_threshold = 0.5\n\
         first_dwell = \"delete\"\n\
         reference = \"Native\"\n\n\
         [plot]\n\
         parquet = true\n",
    );
    for t in &TREATMENTS {
        let _ = write!(
            toml,
            "\n[[treatments]]\nname = \"{0}\"\nhistogram_dir = \"{0}\"\n\
             transitions = \"transitions/{0}.dat\"\ncolor = \"{1}\"\n",
            t.name, t.color
        );
    }
    toml
}

fn main() -> Result<()> {
    env_logger::init();
    let root = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_experiment"));
    let mut rng = SimpleRng::new(42);

    let mut tables = Vec::new();
    for t in &TREATMENTS {
        let transitions = write_treatment(&root, t, &mut rng)?;
        println!("{}: {MOLECULES} molecules, {transitions} transitions", t.name);
        tables.push(load_histogram_dir(&root.join(t.name), t.name)?);
    }

    let config = root.join("experiment.toml");
    std::fs::write(&config, experiment_toml())
        .with_context(|| format!("Failed to write {}", config.display()))?;

    let compiled = TrajectoryTable::concat(tables);
    let output_path = root.join("sample_data.parquet");
    write_trajectories_parquet(&output_path, &compiled)?;

    println!(
        "Wrote {} frames to {} and the experiment description to {}",
        compiled.len(),
        output_path.display(),
        config.display()
    );
    Ok(())
}
