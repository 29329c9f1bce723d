mod common;

use cgmath::{MetricSpace, Point3};
use common::{config, harness, settle};
use voxel_terrain::{
    core::MtResource, BlockKey, BlockState, ConstantDensity, DensityBlock, DensitySource,
    EditOperation, Sample, StoredBlock, TerrainError,
};

fn solid() -> ConstantDensity {
    ConstantDensity(Sample::new(255, 1))
}

#[test]
fn carving_a_sphere_leaves_a_void_at_the_block_center() {
    let mut h = harness(config(vec![32.0], [-64, -64, -64], [64, 64, 64]), solid());
    h.terrain.register_trigger(1, || Point3::new(8.0, 8.0, 8.0));

    let center = Point3::new(8.0, 8.0, 8.0);
    let affected = h
        .terrain
        .apply_edit(EditOperation::sphere(center, 4.0, 0))
        .unwrap();
    // nothing is resident yet; the edit is replayed during generation
    assert_eq!(affected, 0);
    settle(&mut h.terrain);

    let key = BlockKey::new(0, Point3::new(0, 0, 0));
    let record = h.terrain.block(&key).unwrap();
    assert_eq!(record.state, BlockState::Ready);
    let handle = record.mesh.as_ref().unwrap();
    assert!(handle.mesh.triangle_count() > 0);
    assert!(handle.visible);

    let center = center.cast::<f32>().unwrap();
    for vertex in &handle.mesh.vertices {
        let distance = vertex.position().distance(center);
        assert!(
            (3.0..=5.0).contains(&distance),
            "vertex at distance {} from the void center",
            distance
        );
    }

    // every other block is uniformly solid
    for record in h.terrain.blocks().filter(|record| record.key != key) {
        assert_eq!(record.triangle_count(), 0, "{}", record.key);
    }
    assert_eq!(h.renderer.scene().get().nodes.len(), 1);
    assert_eq!(h.physics.world().get().bodies.len(), 1);
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 8)), Some(0));
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 13)), Some(255));
}

#[test]
fn the_installed_mesh_follows_the_last_edit() {
    let mut h = harness(config(vec![32.0], [-64, -64, -64], [64, 64, 64]), solid());
    h.terrain.register_trigger(1, || Point3::new(8.0, 8.0, 8.0));
    settle(&mut h.terrain);

    let key = BlockKey::new(0, Point3::new(0, 0, 0));
    let carve = EditOperation::sphere(Point3::new(8.0, 8.0, 8.0), 5.0, 0);
    let fill = EditOperation::sphere(Point3::new(8.0, 8.0, 8.0), 5.0, 255);

    // edits land between submission and completion, so most results go stale
    let mut stale = 0;
    for edit in [carve, fill, carve, fill, carve] {
        h.terrain.apply_edit(edit).unwrap();
        stale += h.terrain.update(common::FRAME).stale_discarded;
    }
    stale += settle(&mut h.terrain).stale_discarded;
    assert!(stale > 0);

    let record = h.terrain.block(&key).unwrap();
    assert_eq!(record.state, BlockState::Ready);
    assert!(record.triangle_count() > 0);
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 8)), Some(0));

    h.terrain.apply_edit(fill).unwrap();
    settle(&mut h.terrain);
    assert_eq!(h.terrain.block(&key).unwrap().triangle_count(), 0);
    assert!(h.renderer.scene().get().nodes.is_empty());
}

#[test]
fn edits_survive_eviction_without_a_cache() {
    let mut config = config(vec![24.0], [-256, -64, -64], [256, 64, 64]);
    config.density_cache_capacity = 0;
    let mut h = harness(config, solid());
    let camera = MtResource::new(Point3::new(8.0, 8.0, 8.0));
    h.terrain.register_trigger(1, camera.clone());
    settle(&mut h.terrain);

    h.terrain
        .apply_edit(EditOperation::sphere(Point3::new(8.0, 8.0, 8.0), 4.0, 0))
        .unwrap();
    settle(&mut h.terrain);

    *camera.get_mut() = Point3::new(200.0, 8.0, 8.0);
    settle(&mut h.terrain);
    let key = BlockKey::new(0, Point3::new(0, 0, 0));
    assert!(h.terrain.block(&key).is_none());
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 8)), None);

    *camera.get_mut() = Point3::new(8.0, 8.0, 8.0);
    settle(&mut h.terrain);
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 8)), Some(0));
    assert!(h.terrain.block(&key).unwrap().triangle_count() > 0);
}

#[test]
fn edits_to_cached_blocks_are_replayed_in_order() {
    let mut h = harness(config(vec![24.0], [-256, -64, -64], [256, 64, 64]), solid());
    let camera = MtResource::new(Point3::new(8.0, 8.0, 8.0));
    h.terrain.register_trigger(1, camera.clone());
    h.terrain
        .apply_edit(EditOperation::sphere(Point3::new(8.0, 8.0, 8.0), 4.0, 0))
        .unwrap();
    settle(&mut h.terrain);

    *camera.get_mut() = Point3::new(200.0, 8.0, 8.0);
    settle(&mut h.terrain);

    // the block is cached now; this edit must not be lost when it returns
    let refill = EditOperation::cuboid(
        Point3::new(6.0, 6.0, 6.0),
        Point3::new(10.0, 10.0, 10.0),
        255,
    );
    assert_eq!(h.terrain.apply_edit(refill).unwrap(), 0);

    *camera.get_mut() = Point3::new(8.0, 8.0, 8.0);
    settle(&mut h.terrain);
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 8)), Some(255));
    assert_eq!(h.terrain.voxel_density(Point3::new(8, 8, 4)), Some(0));
    assert_eq!(h.terrain.edit_history().len(), 2);
}

#[test]
fn collaborator_refusals_are_reported_without_stopping_the_update() {
    let mut h = harness(config(vec![32.0], [-64, -64, -64], [64, 64, 64]), solid());
    h.renderer.fail_next(1);
    h.physics.fail_next(1);
    h.terrain.register_trigger(1, || Point3::new(8.0, 8.0, 8.0));
    h.terrain
        .apply_edit(EditOperation::sphere(Point3::new(8.0, 8.0, 8.0), 4.0, 0))
        .unwrap();

    let report = settle(&mut h.terrain);
    let refused: Vec<&'static str> = report
        .diagnostics
        .iter()
        .filter_map(|diagnostic| match diagnostic {
            TerrainError::MissingCollaborator { collaborator, .. } => Some(*collaborator),
            _ => None,
        })
        .collect();
    assert_eq!(refused.len(), 2);
    assert!(refused.contains(&"renderer") && refused.contains(&"physics"));

    let record = h.terrain.block(&BlockKey::new(0, Point3::new(0, 0, 0))).unwrap();
    assert_eq!(record.state, BlockState::Ready);
    let handle = record.mesh.as_ref().unwrap();
    assert!(handle.node.is_none() && handle.body.is_none());
    assert!(handle.mesh.triangle_count() > 0);
}

struct Unavailable;

impl DensitySource for Unavailable {
    fn sample(&self, _position: Point3<i32>) -> Sample {
        Sample::EMPTY
    }

    fn fill(&self, key: BlockKey, _block: &mut DensityBlock) -> voxel_terrain::Result<()> {
        Err(TerrainError::GenerationFailure {
            key,
            reason: "backing store offline".to_string(),
        })
    }
}

#[test]
fn failing_blocks_are_given_up_on_after_the_retry_cap() {
    let mut config = config(vec![20.0], [-64, -64, -64], [64, 64, 64]);
    config.retry_cap = 2;
    let mut h = harness(config, Unavailable);
    h.terrain.register_trigger(1, || Point3::new(0.0, 0.0, 0.0));

    let report = settle(&mut h.terrain);
    let resident = h.terrain.resident_count();
    assert!(resident > 0);
    assert_eq!(report.failures, resident * 3);
    assert_eq!(report.diagnostics.len(), resident);
    assert!(report
        .diagnostics
        .iter()
        .all(|diagnostic| matches!(diagnostic, TerrainError::GenerationFailure { .. })));

    for record in h.terrain.blocks() {
        assert_eq!(record.state, BlockState::Ready);
        assert!(record.density.is_none());
        assert_eq!(record.triangle_count(), 0);
    }
}

#[test]
fn exported_blocks_load_into_another_terrain() {
    let layout = || config(vec![24.0], [-64, -64, -64], [64, 64, 64]);
    let key = BlockKey::new(0, Point3::new(0, 0, 0));

    let mut source = harness(layout(), solid());
    source.terrain.register_trigger(1, || Point3::new(8.0, 8.0, 8.0));
    source
        .terrain
        .apply_edit(EditOperation::sphere(Point3::new(4.0, 4.0, 4.0), 3.0, 0).with_material(7))
        .unwrap();
    settle(&mut source.terrain);

    let stored = source.terrain.export_block(&key).unwrap();
    let json = serde_json::to_string(&stored).unwrap();
    let restored: StoredBlock = serde_json::from_str(&json).unwrap();

    let mut target = harness(layout(), solid());
    target.terrain.load_block(restored).unwrap();
    target.terrain.register_trigger(1, || Point3::new(8.0, 8.0, 8.0));
    settle(&mut target.terrain);

    assert!(target.terrain.edit_history().is_empty());
    assert_eq!(target.terrain.voxel_density(Point3::new(4, 4, 4)), Some(0));
    assert_eq!(
        target.terrain.export_block(&key).unwrap(),
        source.terrain.export_block(&key).unwrap()
    );
    assert_eq!(
        target.terrain.block(&key).unwrap().triangle_count(),
        source.terrain.block(&key).unwrap().triangle_count()
    );

    let outside = StoredBlock::new(
        BlockKey::new(0, Point3::new(40, 0, 0)),
        &DensityBlock::empty(),
    );
    assert!(matches!(
        target.terrain.load_block(outside),
        Err(TerrainError::OutOfBounds { .. })
    ));
}

#[test]
fn edits_reach_loaded_blocks_that_are_not_resident_yet() {
    let mut h = harness(
        config(vec![24.0], [-64, -64, -64], [64, 64, 64]),
        ConstantDensity(Sample::EMPTY),
    );
    let key = BlockKey::new(0, Point3::new(0, 0, 0));
    let stored = StoredBlock::new(key, &DensityBlock::filled(Sample::new(200, 3)));
    h.terrain.load_block(stored).unwrap();

    let affected = h
        .terrain
        .apply_edit(EditOperation::sphere(Point3::new(1.0, 1.0, 1.0), 1.0, 0))
        .unwrap();
    assert_eq!(affected, 0);

    h.terrain.register_trigger(1, || Point3::new(8.0, 8.0, 8.0));
    settle(&mut h.terrain);

    assert_eq!(h.terrain.voxel_density(Point3::new(12, 12, 12)), Some(200));
    assert_eq!(h.terrain.voxel_density(Point3::new(1, 1, 1)), Some(0));
    assert_eq!(h.terrain.voxel_density(Point3::new(1, 1, 3)), Some(200));
    assert!(h.terrain.block(&key).unwrap().triangle_count() > 0);
}
