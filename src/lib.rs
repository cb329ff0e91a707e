//! Single-molecule FRET analysis: compile per-molecule trajectories, clean
//! and classify dwell times, summarise state occupancy and render figures.

pub mod analysis;
pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod render;
pub mod viewer;
