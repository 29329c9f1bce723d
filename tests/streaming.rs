mod common;

use std::collections::BTreeSet;

use cgmath::Point3;
use common::{config, harness, settle, FRAME};
use voxel_terrain::{
    core::MtResource, engine_state::voxels::block_key::BlockFace, BlockKey, BlockState,
    PlaneDensity,
};

#[test]
fn moving_trigger_streams_blocks_in_and_out() {
    let mut h = harness(
        config(vec![32.0, 128.0], [-512, -64, -512], [512, 64, 512]),
        PlaneDensity::new(4.5, 1),
    );
    let camera = MtResource::new(Point3::new(0.0, 0.0, 0.0));
    h.terrain.register_trigger(1, camera.clone());
    settle(&mut h.terrain);

    let origin_block = BlockKey::containing(Point3::new(0, 0, 0), 1);
    assert!(h.terrain.block(&origin_block).is_some());

    let target = Point3::new(200, 0, 0);
    let target_leaf = BlockKey::containing(target, 0);
    let mut seen_target = false;
    let mut evicted = 0;

    for step in 1..=8 {
        *camera.get_mut() = Point3::new(step as f64 * 25.0, 0.0, 0.0);
        let report = h.terrain.update(FRAME);
        evicted += report.evicted;

        if let Some(record) = h.terrain.block(&target_leaf) {
            if !seen_target {
                assert!(
                    matches!(record.state, BlockState::Empty | BlockState::Generating),
                    "new block started in {:?}",
                    record.state
                );
                seen_target = true;
            }
        }
    }
    assert!(seen_target);
    evicted += settle(&mut h.terrain).evicted;
    assert!(evicted > 0);

    let trigger = Point3::new(200.0, 0.0, 0.0);
    let outer = h.terrain.layout().radius(h.terrain.layout().coarsest_lod());
    for record in h.terrain.blocks() {
        let distance = h.terrain.layout().distance_to_triggers(&record.key, &[trigger]);
        assert!(distance < outer, "{} is {} away", record.key, distance);
        assert_eq!(record.state, BlockState::Ready);
    }
    assert!(h.terrain.block(&origin_block).is_none());

    let leaf = h.terrain.block(&target_leaf).unwrap();
    assert!(leaf.leaf);
    assert!(leaf.triangle_count() > 0);
    let handle = leaf.mesh.as_ref().unwrap();
    assert!(handle.visible);
    assert!(handle.body.is_some());

    // the scene holds exactly the nodes owned by resident blocks
    let owned: BTreeSet<u64> = h
        .terrain
        .blocks()
        .filter_map(|record| record.mesh.as_ref()?.node)
        .map(|node| node.0)
        .collect();
    let scene = h.renderer.scene();
    let scene = scene.get();
    let live: BTreeSet<u64> = scene.nodes.keys().map(|node| node.0).collect();
    assert_eq!(owned, live);
    assert_eq!(scene.created - scene.destroyed, live.len());

    let bodies = h.physics.world().get().bodies.len();
    let owned_bodies = h
        .terrain
        .blocks()
        .filter(|record| record.mesh.as_ref().is_some_and(|m| m.body.is_some()))
        .count();
    assert_eq!(bodies, owned_bodies);
}

#[test]
fn neighbouring_leaves_differ_by_at_most_one_lod() {
    let mut h = harness(
        config(vec![16.0, 40.0, 96.0], [-256, -64, -256], [256, 64, 256]),
        PlaneDensity::new(2.5, 0),
    );
    h.terrain.register_trigger(1, || Point3::new(10.0, 3.0, -20.0));
    settle(&mut h.terrain);

    let leaves: Vec<BlockKey> = h
        .terrain
        .blocks()
        .filter(|record| record.leaf)
        .map(|record| record.key)
        .collect();
    assert!(leaves.iter().any(|key| key.lod == 0));
    assert!(leaves.iter().any(|key| key.lod == 2));

    for leaf in &leaves {
        let record = h.terrain.block(leaf).unwrap();
        for face in BlockFace::ALL {
            let neighbour = leaf.neighbor(face);
            let coarser = neighbour.ancestor_at(leaf.lod + 1);
            let borders_coarser = h.terrain.block(&coarser).is_some_and(|block| block.leaf);
            assert_eq!(
                record.neighbor_lod_mask & face.bit() != 0,
                borders_coarser,
                "{} face {:?}",
                leaf,
                face
            );
            if leaf.lod == 0 {
                let too_coarse = neighbour.ancestor_at(2);
                assert!(!h.terrain.block(&too_coarse).is_some_and(|block| block.leaf));
            }
        }
    }
}

#[test]
fn worker_threads_produce_the_same_terrain_as_inline_generation() {
    let layout = |workers: usize| {
        let mut config = config(vec![24.0, 64.0], [-128, -64, -128], [128, 64, 128]);
        config.worker_count = workers;
        config
    };

    let mut inline = harness(layout(0), PlaneDensity::new(7.5, 2));
    let mut threaded = harness(layout(3), PlaneDensity::new(7.5, 2));
    for h in [&mut inline, &mut threaded] {
        h.terrain.register_trigger(9, || Point3::new(-30.0, 5.0, 12.0));
        settle(&mut h.terrain);
    }

    let summary = |h: &common::Harness| {
        let mut blocks: Vec<(BlockKey, usize)> = h
            .terrain
            .blocks()
            .map(|record| (record.key, record.triangle_count()))
            .collect();
        blocks.sort_by_key(|(key, _)| (key.lod, key.coord.x, key.coord.y, key.coord.z));
        blocks
    };
    assert_eq!(summary(&inline), summary(&threaded));
}

#[test]
fn unregistering_the_last_trigger_empties_the_terrain() {
    let mut h = harness(
        config(vec![32.0], [-64, -64, -64], [64, 64, 64]),
        PlaneDensity::new(0.5, 0),
    );
    h.terrain.register_trigger(4, || Point3::new(0.0, 0.0, 0.0));
    settle(&mut h.terrain);
    assert!(h.terrain.resident_count() > 0);

    assert!(h.terrain.unregister_trigger(4));
    settle(&mut h.terrain);
    assert_eq!(h.terrain.resident_count(), 0);
    assert!(h.renderer.scene().get().nodes.is_empty());
    assert!(h.physics.world().get().bodies.is_empty());
}
