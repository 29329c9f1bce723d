//! # LOD Layout
//!
//! Decides which blocks must be resident for a set of trigger positions.
//!
//! The world is covered by blocks of the coarsest LOD `N`. A coarsest block is
//! required when some trigger is closer than `radius(N)` to its box. A required
//! block at LOD `L > 0` is split into its eight children when some trigger is
//! closer than `radius(L - 1)`; otherwise it is a leaf. The finest LOD wins
//! wherever rings of different triggers overlap, since splitting only ever
//! refines.
//!
//! Leaves are then balanced so that no leaf touches a face neighbour more than
//! one LOD coarser, which is what the seam stitching supports. Every ancestor
//! of a leaf is required too: leaves are meshed, ancestors only hold density
//! (the parent's density is what a leaf stitches its coarse-facing faces to).

use std::collections::{HashMap, HashSet};

use cgmath::Point3;

use crate::engine_state::{
    spatial::Aabb,
    voxels::block_key::{BlockFace, BlockKey},
};

/// Role of a required block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequiredBlock {
    /// Leaves are meshed; the rest only keep density.
    pub leaf: bool,
    /// Faces bordering a leaf one LOD coarser. Zero for non-leaves.
    pub neighbor_lod_mask: u8,
}

/// LOD radii and world extents.
#[derive(Clone, Debug)]
pub struct LodLayout {
    radii: Vec<f64>,
    world_min: Point3<i32>,
    world_max: Point3<i32>,
}

impl LodLayout {
    /// # Arguments
    /// * `radii` - Outer radius of every LOD ring, finest first, strictly increasing
    /// * `world_min` / `world_max` - World extents, aligned to the coarsest block size
    pub fn new(radii: Vec<f64>, world_min: Point3<i32>, world_max: Point3<i32>) -> Self {
        debug_assert!(!radii.is_empty());
        LodLayout {
            radii,
            world_min,
            world_max,
        }
    }

    pub fn coarsest_lod(&self) -> u8 {
        (self.radii.len() - 1) as u8
    }

    pub fn radius(&self, lod: u8) -> f64 {
        self.radii[lod as usize]
    }

    pub fn world_bounds(&self) -> Aabb {
        Aabb::new(
            [
                self.world_min.x as f64,
                self.world_min.y as f64,
                self.world_min.z as f64,
            ],
            [
                self.world_max.x as f64,
                self.world_max.y as f64,
                self.world_max.z as f64,
            ],
        )
    }

    /// True if the block's core region lies inside the world.
    pub fn contains(&self, key: &BlockKey) -> bool {
        let origin = key.origin();
        let size = key.size();
        (0..3).all(|axis| {
            origin[axis] >= self.world_min[axis] && origin[axis] + size <= self.world_max[axis]
        })
    }

    /// Distance from the block's box to the nearest trigger.
    pub fn distance_to_triggers(&self, key: &BlockKey, triggers: &[Point3<f64>]) -> f64 {
        let bounds = key.bounds();
        triggers
            .iter()
            .map(|p| bounds.distance_to(&[p.x, p.y, p.z]))
            .fold(f64::INFINITY, f64::min)
    }

    /// Every block that must be resident for `triggers`, with its role.
    pub fn required_blocks(&self, triggers: &[Point3<f64>]) -> HashMap<BlockKey, RequiredBlock> {
        let top = self.coarsest_lod();

        let mut leaves = HashSet::new();
        let mut stack: Vec<BlockKey> = self
            .coarse_candidates(triggers)
            .into_iter()
            .filter(|key| self.distance_to_triggers(key, triggers) < self.radius(top))
            .collect();

        while let Some(key) = stack.pop() {
            if key.lod > 0 && self.distance_to_triggers(&key, triggers) < self.radius(key.lod - 1) {
                stack.extend(key.children());
            } else {
                leaves.insert(key);
            }
        }

        balance(&mut leaves, top);

        let mut required: HashMap<BlockKey, RequiredBlock> = leaves
            .iter()
            .map(|leaf| {
                (
                    *leaf,
                    RequiredBlock {
                        leaf: true,
                        neighbor_lod_mask: neighbor_lod_mask(&leaves, leaf, top),
                    },
                )
            })
            .collect();

        for leaf in &leaves {
            let mut key = *leaf;
            while key.lod < top {
                key = key.parent();
                required.entry(key).or_insert(RequiredBlock {
                    leaf: false,
                    neighbor_lod_mask: 0,
                });
            }
        }

        required
    }

    /// Coarsest blocks inside the world whose grid range can reach a trigger.
    fn coarse_candidates(&self, triggers: &[Point3<f64>]) -> HashSet<BlockKey> {
        let top = self.coarsest_lod();
        let size = BlockKey::size_at(top);
        let radius = self.radius(top);
        let mut candidates = HashSet::new();

        for trigger in triggers {
            let mut low = [0i32; 3];
            let mut high = [0i32; 3];
            for axis in 0..3 {
                let world_low = self.world_min[axis] / size;
                let world_high = self.world_max[axis] / size - 1;
                low[axis] = (((trigger[axis] - radius) / size as f64).floor() as i32).max(world_low);
                high[axis] = (((trigger[axis] + radius) / size as f64).floor() as i32).min(world_high);
            }

            for z in low[2]..=high[2] {
                for y in low[1]..=high[1] {
                    for x in low[0]..=high[0] {
                        candidates.insert(BlockKey::new(top, Point3::new(x, y, z)));
                    }
                }
            }
        }

        candidates
    }
}

/// The leaf covering `key`'s region at `key`'s LOD or coarser, if any.
fn covering_leaf(leaves: &HashSet<BlockKey>, key: BlockKey, top: u8) -> Option<BlockKey> {
    let mut key = key;
    loop {
        if leaves.contains(&key) {
            return Some(key);
        }
        if key.lod >= top {
            return None;
        }
        key = key.parent();
    }
}

/// Splits leaves until no leaf has a face neighbour more than one LOD coarser.
fn balance(leaves: &mut HashSet<BlockKey>, top: u8) {
    let mut pending: Vec<BlockKey> = leaves.iter().copied().collect();

    while let Some(leaf) = pending.pop() {
        if !leaves.contains(&leaf) {
            continue;
        }
        for face in BlockFace::ALL {
            let Some(cover) = covering_leaf(leaves, leaf.neighbor(face), top) else {
                continue;
            };
            if cover.lod > leaf.lod + 1 {
                leaves.remove(&cover);
                for child in cover.children() {
                    leaves.insert(child);
                    pending.push(child);
                }
                // the split child next to us may still be too coarse
                pending.push(leaf);
            }
        }
    }
}

fn neighbor_lod_mask(leaves: &HashSet<BlockKey>, leaf: &BlockKey, top: u8) -> u8 {
    BlockFace::ALL
        .iter()
        .filter(|face| {
            covering_leaf(leaves, leaf.neighbor(**face), top)
                .is_some_and(|cover| cover.lod == leaf.lod + 1)
        })
        .fold(0, |mask, face| mask | face.bit())
}
