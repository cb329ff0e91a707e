use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

use super::kde::{gaussian_kde, linspace};
use super::PlotStyle;
use crate::analysis::{arrow_weights, mean_dwell_list, MeanDwell, Occupancy, TransitionFrequency};
use crate::color::Rgb;
use crate::data::model::{FretSource, TrajectoryTable, TransitionTable};

const CANVAS_SIZE: (u32, u32) = (800, 550);
const RIDGE_HEIGHT: u32 = 110;
const GRID_POINTS: usize = 200;
const TDP_BINS: usize = 50;
/// Stroke pixels per unit of arrow weight (a 100 % class gives 9 px).
const ARROW_SCALE: f64 = 80.0;

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn draw_placeholder(root: &DrawingArea<SVGBackend<'_>, Shift>, message: &str) -> Result<()> {
    let (w, h) = root.dim_in_pixel();
    root.draw(&Text::new(
        message.to_string(),
        (w as i32 / 2 - 60, h as i32 / 2),
        ("sans-serif", 20).into_font().color(&BLACK),
    ))?;
    root.present()?;
    Ok(())
}

/// Per-treatment density curves on the FRET grid, in drawing order.
fn densities(
    table: &TrajectoryTable,
    source: FretSource,
    style: &PlotStyle,
) -> (Vec<f64>, Vec<(String, Vec<f64>)>) {
    let grid = linspace(0.0, 1.0, GRID_POINTS);
    let curves = style
        .arrange(&table.treatments())
        .into_iter()
        .map(|treatment| {
            let values: Vec<f64> = table.for_treatment(&treatment).map(|f| f.value(source)).collect();
            let density = gaussian_kde(&values, &grid);
            (treatment, density)
        })
        .collect();
    (grid, curves)
}

fn max_density(curves: &[(String, Vec<f64>)]) -> f64 {
    curves
        .iter()
        .flat_map(|(_, d)| d.iter().copied())
        .fold(0.0f64, f64::max)
        .max(1e-6)
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Overlaid FRET density of every treatment, each normalised on its own.
pub fn render_histogram(
    path: &Path,
    table: &TrajectoryTable,
    source: FretSource,
    style: &PlotStyle,
) -> Result<()> {
    ensure_parent(path)?;
    let root = SVGBackend::new(path, CANVAS_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    if table.is_empty() {
        return draw_placeholder(&root, "No FRET data");
    }

    let (grid, curves) = densities(table, source, style);
    let y_max = max_density(&curves) * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("FRET")
        .y_desc("Density")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    for (treatment, density) in &curves {
        let color = rgb(style.color(treatment));
        chart
            .draw_series(
                AreaSeries::new(grid.iter().copied().zip(density.iter().copied()), 0.0, color.mix(0.25))
                    .border_style(color.stroke_width(2)),
            )?
            .label(style.label(treatment).to_string())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 15))
        .draw()?;

    root.present()?;
    log::info!("wrote histogram {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Ridgeline
// ---------------------------------------------------------------------------

/// One density ridge per treatment, stacked top to bottom in drawing order.
pub fn render_ridgeline(
    path: &Path,
    table: &TrajectoryTable,
    source: FretSource,
    style: &PlotStyle,
) -> Result<()> {
    ensure_parent(path)?;
    let (grid, curves) = densities(table, source, style);
    let rows = curves.len().max(1);
    let size = (CANVAS_SIZE.0, RIDGE_HEIGHT * rows as u32 + 50);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    if curves.is_empty() {
        return draw_placeholder(&root, "No FRET data");
    }

    let (ridges_area, axis_area) = root.split_vertically(RIDGE_HEIGHT * rows as u32);
    let y_max = max_density(&curves);

    for ((treatment, density), area) in curves.iter().zip(ridges_area.split_evenly((rows, 1))) {
        let color = rgb(style.color(treatment));
        let mut chart = ChartBuilder::on(&area)
            .margin_left(20)
            .margin_right(20)
            .build_cartesian_2d(0f64..1f64, 0f64..y_max)?;

        chart.draw_series(
            AreaSeries::new(grid.iter().copied().zip(density.iter().copied()), 0.0, color.mix(0.85))
                .border_style(WHITE.stroke_width(2)),
        )?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (1.0, 0.0)],
            color.stroke_width(2),
        )))?;

        area.draw(&Text::new(
            style.label(treatment).to_string(),
            (24, RIDGE_HEIGHT as i32 / 3),
            ("sans-serif", 18).into_font().color(&color),
        ))?;
    }

    let mut axis = ChartBuilder::on(&axis_area)
        .margin_left(20)
        .margin_right(20)
        .x_label_area_size(45)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)?;
    axis.configure_mesh()
        .disable_mesh()
        .disable_y_axis()
        .x_desc("FRET")
        .label_style(("sans-serif", 16))
        .draw()?;

    root.present()?;
    log::info!("wrote ridgeline {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Transition density plot
// ---------------------------------------------------------------------------

/// Counts of (before, after) pairs on a square grid over [0, 1]².
/// Pairs outside the unit square are not counted.
pub fn tdp_counts(transitions: &TransitionTable, bins: usize) -> Vec<Vec<usize>> {
    let mut counts = vec![vec![0usize; bins]; bins];
    let bin = |v: f64| -> Option<usize> {
        (0.0..=1.0)
            .contains(&v)
            .then(|| ((v * bins as f64) as usize).min(bins - 1))
    };
    for r in &transitions.records {
        if let (Some(x), Some(y)) = (bin(r.fret_before), bin(r.fret_after)) {
            counts[x][y] += 1;
        }
    }
    counts
}

/// FRET before versus FRET after, coloured by transition count.
pub fn render_tdp(path: &Path, transitions: &TransitionTable, title: &str) -> Result<()> {
    ensure_parent(path)?;
    let root = SVGBackend::new(path, (600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    if transitions.is_empty() {
        return draw_placeholder(&root, "No transitions");
    }

    let counts = tdp_counts(transitions, TDP_BINS);
    let peak = counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
    let step = 1.0 / TDP_BINS as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Initial FRET")
        .y_desc("Final FRET")
        .label_style(("sans-serif", 16))
        .draw()?;

    chart.draw_series(counts.iter().enumerate().flat_map(|(i, column)| {
        column.iter().enumerate().filter(|(_, &c)| c > 0).map(move |(j, &c)| {
            let t = c as f64 / peak;
            let (x0, y0) = (i as f64 * step, j as f64 * step);
            Rectangle::new(
                [(x0, y0), (x0 + step, y0 + step)],
                HSLColor(0.66 * (1.0 - t), 1.0, 0.5).filled(),
            )
        })
    }))?;

    root.present()?;
    log::info!("wrote TDP {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Occupancy heatmap
// ---------------------------------------------------------------------------

/// Start and end of each transition arrow within a heatmap row, in
/// [`HEATMAP_ORDER`](crate::analysis::HEATMAP_ORDER). Cells sit at x = 0
/// (below) and x = 1 (above); self transitions stay inside their cell.
fn arrow_span(row: f64) -> [((f64, f64), (f64, f64)); 4] {
    [
        ((0.2, row + 0.25), (0.8, row + 0.25)),
        ((0.8, row - 0.25), (0.2, row - 0.25)),
        ((1.1, row + 0.3), (1.4, row + 0.3)),
        ((-0.4, row + 0.3), (-0.1, row + 0.3)),
    ]
}

fn arrow_width(weight: f64) -> u32 {
    (1.0 + weight * ARROW_SCALE).round() as u32
}

/// Treatments × {below, above} grid of occupancy fractions, overlaid with
/// transition arrows scaled by frequency and labelled with the mean dwell.
pub fn render_occupancy_heatmap(
    path: &Path,
    rows: &[Occupancy],
    frequencies: &[TransitionFrequency],
    means: &[MeanDwell],
    style: &PlotStyle,
) -> Result<()> {
    ensure_parent(path)?;
    let root = SVGBackend::new(path, (520, 120 + 60 * rows.len().max(1) as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let Some(first) = rows.first() else {
        return draw_placeholder(&root, "No occupancy data");
    };

    let present: Vec<String> = rows.iter().map(|r| r.treatment.clone()).collect();
    let arranged = style.arrange(&present);
    let n = arranged.len();
    let threshold = first.threshold;

    let categories = [format!("< {threshold}"), format!("> {threshold}")];
    let x_label = |x: &f64| -> String {
        let i = x.round();
        if (x - i).abs() < 1e-6 && (0.0..2.0).contains(&i) {
            categories[i as usize].clone()
        } else {
            String::new()
        }
    };
    let y_label = |y: &f64| -> String {
        let i = y.round();
        if (y - i).abs() < 1e-6 && i >= 0.0 && (i as usize) < n {
            style.label(&arranged[i as usize]).to_string()
        } else {
            String::new()
        }
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Fraction of time", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(35)
        .y_label_area_size(120)
        .build_cartesian_2d(-0.5f64..1.5f64, -0.5f64..(n as f64 - 0.5))?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(2 * n + 1)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .label_style(("sans-serif", 15))
        .draw()?;

    for (row, treatment) in arranged.iter().enumerate() {
        let Some(occ) = rows.iter().find(|r| &r.treatment == treatment) else {
            continue;
        };
        for (col, value) in [occ.time_below, occ.time_above].into_iter().enumerate() {
            let (x, y) = (col as f64, row as f64);
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                HSLColor(0.6, 0.8, 0.95 - 0.6 * value).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{value:.2}"),
                (x - 0.1, y),
                ("sans-serif", 16).into_font().color(&BLACK),
            )))?;
        }

        let Some(freq) = frequencies.iter().find(|f| &f.treatment == treatment) else {
            continue;
        };
        let mean_s = means
            .iter()
            .find(|m| &m.treatment == treatment)
            .map_or([None; 4], mean_dwell_list);
        let spans = arrow_span(row as f64);
        for ((weight, mean), (from, to)) in arrow_weights(freq).into_iter().zip(mean_s).zip(spans) {
            if weight <= 0.0 {
                continue;
            }
            let stroke = BLACK.mix(0.7).stroke_width(arrow_width(weight));
            let dir = (to.0 - from.0).signum();
            let head = [(to.0 - 0.06 * dir, to.1 + 0.08), to, (to.0 - 0.06 * dir, to.1 - 0.08)];
            chart.draw_series([
                PathElement::new(vec![from, to], stroke),
                PathElement::new(head.to_vec(), stroke),
            ])?;
            if let Some(mean) = mean {
                chart.draw_series(std::iter::once(Text::new(
                    format!("{mean:.1} s"),
                    ((from.0 + to.0) / 2.0 - 0.05, to.1 + 0.12),
                    ("sans-serif", 12).into_font().color(&BLACK),
                )))?;
            }
        }
    }

    root.present()?;
    log::info!("wrote occupancy heatmap {}", path.display());
    Ok(())
}
