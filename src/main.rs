//! # Voxel Terrain Demo
//!
//! Streams terrain around a moving trigger with headless collaborators and
//! logs what happens.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

use std::{path::PathBuf, process::ExitCode};

fn main() -> ExitCode {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    match voxel_terrain::run(config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("voxel-terrain: {}", error);
            ExitCode::FAILURE
        }
    }
}
