//! Interactive egui viewer for compiled trajectory tables.
//!
//! ```text
//!   file ──► data::loader::load_compiled_trajectories ──► AppState
//!                                                            │
//!                     panels (selections, colour, threshold) ┤
//!                                                            ▼
//!                          plot (KDE lines) + occupancy table
//! ```

pub mod app;
pub mod panels;
pub mod plot;
pub mod state;

pub use app::FretViewerApp;
pub use state::AppState;
