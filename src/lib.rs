#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Terrain
//!
//! An LOD-aware voxel terrain streaming engine. Given a set of moving trigger
//! points (cameras, players), it decides which blocks of the world must be
//! resident at which level of detail, generates and contours them on a worker
//! pool, stitches seams between neighbouring LODs, and hands the resulting
//! meshes to a renderer and (at the finest LOD) to a physics backend. Density
//! can be edited at runtime; edited blocks are regenerated without touching
//! the rest of the world.
//!
//! ## Key Modules
//!
//! * `config` - Terrain tunables, loadable from JSON
//! * `core` - Shared-state primitives used at the seams with other systems
//! * `engine_state` - Spatial index, voxel data, meshing, workers and the lifecycle manager
//! * `error` - The crate error type
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use cgmath::Point3;
//! use voxel_terrain::{
//!     BlockLifecycleManager, EditOperation, HeadlessPhysics, HeadlessRenderer, NodeHandle,
//!     PlaneDensity, TerrainConfig,
//! };
//!
//! let config = TerrainConfig {
//!     lod_radii: vec![32.0, 64.0],
//!     world_min: [-128, -64, -128],
//!     world_max: [128, 64, 128],
//!     worker_count: 0,
//!     ..Default::default()
//! };
//! let mut terrain = BlockLifecycleManager::new(
//!     config,
//!     Arc::new(PlaneDensity::new(0.5, 1)),
//!     Box::new(HeadlessRenderer::new()),
//!     Box::new(HeadlessPhysics::new()),
//!     NodeHandle(0),
//! )
//! .unwrap();
//!
//! terrain.register_trigger(1, || Point3::new(0.0, 0.0, 0.0));
//! terrain.apply_edit(EditOperation::sphere(Point3::new(0.0, 0.0, 0.0), 6.0, 0)).unwrap();
//! for _ in 0..8 {
//!     terrain.update(web_time::Duration::from_millis(16));
//! }
//! assert_eq!(terrain.voxel_density(Point3::new(0, -2, 0)), Some(0));
//! ```

use std::{path::Path, sync::Arc};

use cgmath::Point3;
use log::info;

use crate::core::MtResource;

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

pub use config::TerrainConfig;
pub use engine_state::{
    rendering::{
        BodyHandle, HeadlessPhysics, HeadlessRenderer, Mesh, MeshExtractor, NodeHandle, Physics,
        Renderer,
    },
    spatial::{Aabb, Octree, Quadtree},
    terrain::{
        block_record::BlockState, raycast::RayHit, BlockLifecycleManager, UpdateReport,
    },
    voxels::{
        block_key::BlockKey,
        density_block::{DensityBlock, Sample, StoredBlock},
        density_source::{ConstantDensity, DensitySource, PerlinTerrain, PlaneDensity},
        edit_operation::EditOperation,
    },
};
pub use error::{Result, TerrainError};

/// Frames the demo simulates.
pub const DEMO_FRAMES: usize = 240;

/// Runs the headless demo: streams terrain around a trigger moving along +x,
/// carves a crater next to it and logs what the terrain did.
///
/// # Arguments
/// * `config_path` - Optional JSON file overriding the default configuration
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match config_path {
        Some(path) => TerrainConfig::from_file(path)?,
        None => TerrainConfig::default(),
    };

    let renderer = HeadlessRenderer::new();
    let scene = renderer.scene();
    let physics = HeadlessPhysics::new();
    let bodies = physics.world();

    let mut terrain = BlockLifecycleManager::new(
        config,
        Arc::new(PerlinTerrain::new(fastrand::u32(..))),
        Box::new(renderer),
        Box::new(physics),
        NodeHandle(0),
    )?;

    let camera = MtResource::new(Point3::new(0.0, 16.0, 0.0));
    terrain.register_trigger(0, camera.clone());

    let frame = web_time::Duration::from_millis(16);
    let mut totals = UpdateReport::default();
    for index in 0..DEMO_FRAMES {
        camera.get_mut().x = index as f64 * 2.0;

        if index == DEMO_FRAMES / 2 {
            let position = *camera.get();
            let crater = EditOperation::sphere(Point3::new(position.x + 24.0, 0.0, 0.0), 12.0, 0);
            let affected = terrain.apply_edit(crater)?;
            info!("Carved a crater reaching {} resident blocks", affected);
        }

        let report = terrain.update(frame);
        totals.submitted += report.submitted;
        totals.applied += report.applied;
        totals.stale_discarded += report.stale_discarded;
        totals.evicted += report.evicted;
        totals.failures += report.failures;
        for diagnostic in report.diagnostics {
            log::warn!("{}", diagnostic);
        }

        std::thread::sleep(frame);
    }

    info!(
        "Demo finished: {} jobs submitted, {} applied, {} stale, {} evicted, {} failed",
        totals.submitted, totals.applied, totals.stale_discarded, totals.evicted, totals.failures
    );
    info!(
        "{} resident blocks, {} visible nodes, {} collision bodies",
        terrain.resident_count(),
        scene.get().visible_nodes().count(),
        bodies.get().bodies.len()
    );
    Ok(())
}
