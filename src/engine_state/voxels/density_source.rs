//! # Density Sources
//!
//! Procedural generators that fill a freshly created block with its initial
//! density. Sources run on worker threads inside generation jobs, so they must
//! be `Send + Sync` and must not touch terrain state.
//!
//! Sources that describe a surface produce a density gradient around it rather
//! than a hard 0/255 step. The contouring pass interpolates between samples, so
//! a gradient places vertices accurately even at coarse LODs.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use crate::error::Result;

use super::{
    block_key::BlockKey,
    density_block::{DensityBlock, Sample, SAMPLES_PER_AXIS},
};

/// Density change per world unit across a surface, used by the bundled sources.
pub const DEFAULT_SHARPNESS: f64 = 8.0;

/// Turns a signed distance to a surface (positive inside solid) into a density.
pub fn density_from_distance(distance: f64, sharpness: f64) -> u8 {
    (127.5 + distance * sharpness).clamp(0.0, 255.0).round() as u8
}

/// Fills density blocks for the terrain.
pub trait DensitySource: Send + Sync {
    /// Density and material at a world voxel position.
    fn sample(&self, position: Point3<i32>) -> Sample;

    /// Fills every sample of `block`, overlap layer included.
    ///
    /// # Errors
    /// The default implementation cannot fail. Sources backed by external data
    /// report `GenerationFailure` when it is unavailable.
    fn fill(&self, key: BlockKey, block: &mut DensityBlock) -> Result<()> {
        let origin = key.origin();
        let scale = key.scale();
        for z in 0..SAMPLES_PER_AXIS {
            for y in 0..SAMPLES_PER_AXIS {
                for x in 0..SAMPLES_PER_AXIS {
                    let position = Point3::new(
                        origin.x + x as i32 * scale,
                        origin.y + y as i32 * scale,
                        origin.z + z as i32 * scale,
                    );
                    *block.sample_mut(x, y, z) = self.sample(position);
                }
            }
        }
        Ok(())
    }
}

impl<F> DensitySource for F
where
    F: Fn(Point3<i32>) -> Sample + Send + Sync,
{
    fn sample(&self, position: Point3<i32>) -> Sample {
        self(position)
    }
}

/// The same sample everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantDensity(pub Sample);

impl DensitySource for ConstantDensity {
    fn sample(&self, _position: Point3<i32>) -> Sample {
        self.0
    }

    fn fill(&self, _key: BlockKey, block: &mut DensityBlock) -> Result<()> {
        *block = DensityBlock::filled(self.0);
        Ok(())
    }
}

/// Solid below a horizontal plane, empty above it.
#[derive(Clone, Copy, Debug)]
pub struct PlaneDensity {
    pub height: f64,
    pub material: u8,
    pub sharpness: f64,
}

impl PlaneDensity {
    pub fn new(height: f64, material: u8) -> Self {
        PlaneDensity {
            height,
            material,
            sharpness: DEFAULT_SHARPNESS,
        }
    }
}

impl DensitySource for PlaneDensity {
    fn sample(&self, position: Point3<i32>) -> Sample {
        Sample::new(
            density_from_distance(self.height - position.y as f64, self.sharpness),
            self.material,
        )
    }
}

/// Rolling Perlin heightfield.
pub struct PerlinTerrain {
    perlin: Perlin,
    /// World height of the noise's zero level.
    pub base_height: f64,
    /// Peak deviation from `base_height`.
    pub amplitude: f64,
    /// Horizontal noise frequency per world unit.
    pub frequency: f64,
    pub material: u8,
}

impl PerlinTerrain {
    pub fn new(seed: u32) -> Self {
        PerlinTerrain {
            perlin: Perlin::new(seed),
            base_height: 0.0,
            amplitude: 24.0,
            frequency: 0.01,
            material: 1,
        }
    }

    /// Surface height above the column at `(x, z)`.
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        let broad = self.perlin.get([x * self.frequency, z * self.frequency]);
        let detail = self
            .perlin
            .get([x * self.frequency * 4.0, z * self.frequency * 4.0]);
        self.base_height + self.amplitude * (broad + 0.25 * detail)
    }
}

impl DensitySource for PerlinTerrain {
    fn sample(&self, position: Point3<i32>) -> Sample {
        let height = self.height_at(position.x as f64, position.z as f64);
        Sample::new(
            density_from_distance(height - position.y as f64, DEFAULT_SHARPNESS),
            self.material,
        )
    }
}
