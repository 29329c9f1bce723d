//! # Edit Operations
//!
//! Runtime terrain edits. An edit is a closed shape plus the density it writes;
//! every sample whose world position lies inside the shape is overwritten.
//! Applying an edit never reads the old density, so applying it twice leaves the
//! field exactly as applying it once.

use cgmath::{MetricSpace, Point3};

use crate::engine_state::spatial::Aabb;

use super::density_block::{DensityBlock, SAMPLES_PER_AXIS};

/// Shapes an edit can take.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditShape {
    /// Solid ball, boundary included.
    Sphere { center: Point3<f64>, radius: f64 },
    /// Axis-aligned box, boundary included.
    Box { min: Point3<f64>, max: Point3<f64> },
}

impl EditShape {
    pub fn contains(&self, point: Point3<f64>) -> bool {
        match *self {
            EditShape::Sphere { center, radius } => center.distance2(point) <= radius * radius,
            EditShape::Box { min, max } => {
                point.x >= min.x
                    && point.x <= max.x
                    && point.y >= min.y
                    && point.y <= max.y
                    && point.z >= min.z
                    && point.z <= max.z
            }
        }
    }

    pub fn bounds(&self) -> Aabb {
        match *self {
            EditShape::Sphere { center, radius } => {
                Aabb::around([center.x, center.y, center.z], radius)
            }
            EditShape::Box { min, max } => Aabb::from_points(min, max),
        }
    }
}

/// A density write over a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditOperation {
    pub shape: EditShape,
    /// Density written to every covered sample.
    pub density: u8,
    /// Material written alongside the density. `None` keeps existing materials.
    pub material: Option<u8>,
}

impl EditOperation {
    /// Writes `density` into every sample inside a sphere.
    pub fn sphere(center: Point3<f64>, radius: f64, density: u8) -> Self {
        EditOperation {
            shape: EditShape::Sphere { center, radius },
            density,
            material: None,
        }
    }

    /// Writes `density` into every sample inside a box.
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>, density: u8) -> Self {
        EditOperation {
            shape: EditShape::Box { min, max },
            density,
            material: None,
        }
    }

    pub fn with_material(mut self, material: u8) -> Self {
        self.material = Some(material);
        self
    }

    /// World-space bounding box of the affected region.
    pub fn bounds(&self) -> Aabb {
        self.shape.bounds()
    }

    /// Applies the edit to one block.
    ///
    /// # Arguments
    /// * `block` - Samples to modify
    /// * `origin` - World position of sample (0, 0, 0)
    /// * `scale` - World distance between adjacent samples (`2^lod`)
    ///
    /// # Returns
    /// `true` if at least one sample changed. The block is untouched when the
    /// edit's bounds do not reach any of its samples.
    pub fn apply(&self, block: &mut DensityBlock, origin: Point3<i32>, scale: i32) -> bool {
        let Some(range) = self.local_range(origin, scale) else {
            return false;
        };

        let mut changed = false;
        for z in range[2].0..=range[2].1 {
            for y in range[1].0..=range[1].1 {
                for x in range[0].0..=range[0].1 {
                    let world = Point3::new(
                        (origin.x + x as i32 * scale) as f64,
                        (origin.y + y as i32 * scale) as f64,
                        (origin.z + z as i32 * scale) as f64,
                    );
                    if !self.shape.contains(world) {
                        continue;
                    }

                    let sample = block.sample_mut(x, y, z);
                    let material = self.material.unwrap_or(sample.material);
                    if sample.density != self.density || sample.material != material {
                        sample.density = self.density;
                        sample.material = material;
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// Inclusive local sample range per axis covered by the edit's bounds,
    /// clipped to the block. `None` if the intersection is empty.
    fn local_range(&self, origin: Point3<i32>, scale: i32) -> Option<[(usize, usize); 3]> {
        let bounds = self.bounds();
        let origin = [origin.x, origin.y, origin.z];
        let last = (SAMPLES_PER_AXIS - 1) as f64;
        let mut range = [(0, 0); 3];

        for axis in 0..3 {
            let low = ((bounds.min[axis] - origin[axis] as f64) / scale as f64).ceil().max(0.0);
            let high = ((bounds.max[axis] - origin[axis] as f64) / scale as f64)
                .floor()
                .min(last);
            if low > high {
                return None;
            }
            range[axis] = (low as usize, high as usize);
        }
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::density_block::{Sample, BLOCK_SIZE};

    #[test]
    fn applying_twice_matches_applying_once() {
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..50 {
            let center = Point3::new(rng.f64() * 24.0 - 4.0, rng.f64() * 24.0 - 4.0, rng.f64() * 24.0 - 4.0);
            let edit = if rng.bool() {
                EditOperation::sphere(center, rng.f64() * 8.0, rng.u8(..))
            } else {
                EditOperation::cuboid(center, center + cgmath::vec3(5.0, 3.0, 7.0), rng.u8(..))
                    .with_material(rng.u8(..))
            };

            let mut once = DensityBlock::filled(Sample::new(200, 1));
            edit.apply(&mut once, Point3::new(0, 0, 0), 1);
            let mut twice = once.clone();
            assert!(!edit.apply(&mut twice, Point3::new(0, 0, 0), 1));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn sphere_carves_only_inside_samples() {
        let mut block = DensityBlock::filled(Sample::new(255, 2));
        let edit = EditOperation::sphere(Point3::new(8.0, 8.0, 8.0), 4.0, 0);
        assert!(edit.apply(&mut block, Point3::new(0, 0, 0), 1));

        assert_eq!(block.density(8, 8, 8), 0);
        assert_eq!(block.density(12, 8, 8), 0);
        assert_eq!(block.density(13, 8, 8), 255);
        assert_eq!(block.density(11, 11, 8), 255);
        assert_eq!(block.get(8, 8, 8).unwrap().material, 2);
    }

    #[test]
    fn edits_outside_the_block_are_no_ops() {
        let mut block = DensityBlock::filled(Sample::new(255, 0));
        let before = block.clone();
        let edit = EditOperation::sphere(Point3::new(-10.0, 8.0, 8.0), 4.0, 0);
        assert!(!edit.apply(&mut block, Point3::new(0, 0, 0), 1));
        assert_eq!(block, before);
    }

    #[test]
    fn coarse_blocks_sample_at_their_own_spacing() {
        let mut block = DensityBlock::filled(Sample::new(255, 0));
        // block at LOD 1 starting at x = 32: samples at 32, 34, 36, ...
        let edit = EditOperation::cuboid(Point3::new(33.0, 0.0, 0.0), Point3::new(35.0, 0.0, 0.0), 0);
        assert!(edit.apply(&mut block, Point3::new(32, 0, 0), 2));
        assert_eq!(block.density(0, 0, 0), 255);
        assert_eq!(block.density(1, 0, 0), 0);
        assert_eq!(block.density(2, 0, 0), 255);
        assert_eq!(block.density(BLOCK_SIZE, 0, 0), 255);
    }
}
