//! Gaussian kernel density estimate for the FRET histograms.

use std::f64::consts::PI;

/// Samples are pre-binned onto this many points before smoothing.
const KDE_BINS: usize = 1024;

/// Bandwidth used when the samples have no spread.
const FALLBACK_BANDWIDTH: f64 = 0.02;

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Scott's rule: `σ · n^(-1/5)`.
pub fn scott_bandwidth(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return FALLBACK_BANDWIDTH;
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = var.sqrt();
    if sd <= f64::EPSILON || !sd.is_finite() {
        return FALLBACK_BANDWIDTH;
    }
    sd * (n as f64).powf(-0.2)
}

/// Density of `samples` evaluated on `grid`, integrating to one over the
/// real line. Non-finite samples are ignored.
pub fn gaussian_kde(samples: &[f64], grid: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return vec![0.0; grid.len()];
    }
    let h = scott_bandwidth(&finite);

    let (lo, hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let width = ((hi - lo) / KDE_BINS as f64).max(f64::EPSILON);
    let mut weights = vec![0usize; KDE_BINS];
    for v in &finite {
        let bin = (((v - lo) / width) as usize).min(KDE_BINS - 1);
        weights[bin] += 1;
    }
    let centers: Vec<(f64, f64)> = weights
        .iter()
        .enumerate()
        .filter(|(_, &w)| w > 0)
        .map(|(i, &w)| (lo + (i as f64 + 0.5) * width, w as f64))
        .collect();

    let norm = 1.0 / (finite.len() as f64 * h * (2.0 * PI).sqrt());
    grid.iter()
        .map(|&x| {
            centers
                .iter()
                .map(|&(c, w)| {
                    let z = (x - c) / h;
                    w * (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm
        })
        .collect()
}
