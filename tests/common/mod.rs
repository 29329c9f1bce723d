#![allow(dead_code)]

use std::sync::Arc;

use voxel_terrain::{
    BlockLifecycleManager, DensitySource, HeadlessPhysics, HeadlessRenderer, NodeHandle,
    TerrainConfig, UpdateReport,
};
use web_time::{Duration, Instant};

pub const FRAME: Duration = Duration::from_millis(16);

pub struct Harness {
    pub terrain: BlockLifecycleManager,
    pub renderer: HeadlessRenderer,
    pub physics: HeadlessPhysics,
}

pub fn config(lod_radii: Vec<f64>, world_min: [i32; 3], world_max: [i32; 3]) -> TerrainConfig {
    TerrainConfig {
        lod_radii,
        world_min,
        world_max,
        worker_count: 0,
        ..Default::default()
    }
}

pub fn harness(config: TerrainConfig, source: impl DensitySource + 'static) -> Harness {
    let renderer = HeadlessRenderer::new();
    let physics = HeadlessPhysics::new();
    let terrain = BlockLifecycleManager::new(
        config,
        Arc::new(source),
        Box::new(renderer.clone()),
        Box::new(physics.clone()),
        NodeHandle(0),
    )
    .unwrap();

    Harness {
        terrain,
        renderer,
        physics,
    }
}

/// Runs updates until the terrain has nothing left to do, folding every
/// report into one.
pub fn settle(terrain: &mut BlockLifecycleManager) -> UpdateReport {
    let mut total = UpdateReport::default();
    let deadline = Instant::now() + Duration::from_secs(30);

    loop {
        let report = terrain.update(FRAME);
        total.submitted += report.submitted;
        total.applied += report.applied;
        total.stale_discarded += report.stale_discarded;
        total.evicted += report.evicted;
        total.failures += report.failures;
        total.diagnostics.extend(report.diagnostics);

        if terrain.is_settled() {
            return total;
        }
        assert!(Instant::now() < deadline, "terrain did not settle");
        std::thread::sleep(Duration::from_millis(1));
    }
}
