//! Desktop viewer for compiled FRET tables.
//!
//! ```bash
//! fret-viewer [Raw_FRET_histogram_data.csv]
//! ```

use eframe::egui;
use fret_panda::viewer::{panels, AppState, FretViewerApp};

fn main() -> eframe::Result {
    env_logger::init();

    let mut state = AppState::default();
    if let Some(path) = std::env::args_os().nth(1) {
        panels::load_file(&mut state, std::path::Path::new(&path));
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "FRET Panda – smFRET Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(FretViewerApp::with_state(state)))),
    )
}
