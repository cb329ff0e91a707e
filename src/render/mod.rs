//! SVG figures for compiled experiments.
//!
//! Colours, drawing order and legend labels are carried by [`PlotStyle`];
//! nothing here reads global state.

pub mod charts;
pub mod kde;

use std::collections::BTreeMap;

use crate::color::{ColorMap, Rgb};
use crate::config::ExperimentConfig;

pub use charts::{render_histogram, render_occupancy_heatmap, render_ridgeline, render_tdp};

/// Presentation settings handed to every chart.
#[derive(Debug, Clone, Default)]
pub struct PlotStyle {
    /// Treatments in drawing order.
    pub order: Vec<String>,
    /// Treatment → legend label.
    pub labels: BTreeMap<String, String>,
    pub colors: ColorMap,
}

impl PlotStyle {
    /// Palette colours and plain labels for `treatments`.
    pub fn for_treatments(treatments: &[String]) -> Self {
        Self {
            order: treatments.to_vec(),
            labels: BTreeMap::new(),
            colors: ColorMap::new(treatments.iter().map(String::as_str), &BTreeMap::new()),
        }
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        let order = config.ordered_treatments();
        let colors = ColorMap::new(order.iter().map(String::as_str), &config.colors());
        Self {
            order,
            labels: config.labels(),
            colors,
        }
    }

    pub fn label<'a>(&'a self, treatment: &'a str) -> &'a str {
        self.labels.get(treatment).map_or(treatment, String::as_str)
    }

    pub fn color(&self, treatment: &str) -> Rgb {
        self.colors.color_for(treatment)
    }

    /// `present` treatments sorted by `order`; unknown ones go last.
    pub fn arrange(&self, present: &[String]) -> Vec<String> {
        let mut arranged: Vec<String> = self
            .order
            .iter()
            .filter(|t| present.contains(t))
            .cloned()
            .collect();
        arranged.extend(present.iter().filter(|t| !self.order.contains(t)).cloned());
        arranged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrange_follows_order() {
        let style = PlotStyle {
            order: vec!["b".into(), "a".into()],
            ..Default::default()
        };
        let present = vec!["a".to_string(), "c".to_string(), "b".to_string()];
        assert_eq!(style.arrange(&present), vec!["b", "a", "c"]);
        assert_eq!(style.label("a"), "a");
    }
}
