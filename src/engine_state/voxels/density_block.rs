//! # Density Blocks
//!
//! A `DensityBlock` is the volumetric payload of one terrain block: a cube of
//! `(density, material)` samples. The core region is `BLOCK_SIZE` samples per
//! axis; one extra overlap layer on the positive side repeats the first layer of
//! the next block so both blocks agree on the values of their shared boundary.
//!
//! Sample `(i, j, k)` of a block sits at world position
//! `origin + (i, j, k) * 2^lod`.

use bytemuck::{Pod, Zeroable};
use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

use super::block_key::BlockKey;

/// Number of cells along one edge of a block.
pub const BLOCK_SIZE: usize = 16;

/// Overlap layer shared with the positive neighbour on each axis.
pub const OVERLAP: usize = 1;

/// Samples along one edge of a block, overlap included.
pub const SAMPLES_PER_AXIS: usize = BLOCK_SIZE + OVERLAP;

/// Samples in one block.
pub const SAMPLE_COUNT: usize = SAMPLES_PER_AXIS * SAMPLES_PER_AXIS * SAMPLES_PER_AXIS;

/// Densities strictly above this value are solid.
pub const SOLID_THRESHOLD: u8 = 127;

/// Density value halfway between solid and empty. The contouring surface sits
/// where the interpolated density crosses it.
pub const ISO_LEVEL: f32 = 127.5;

/// A single density sample.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Sample {
    pub density: u8,
    pub material: u8,
}

impl Sample {
    pub const EMPTY: Sample = Sample {
        density: 0,
        material: 0,
    };

    pub fn new(density: u8, material: u8) -> Self {
        Sample { density, material }
    }

    pub fn is_solid(&self) -> bool {
        self.density > SOLID_THRESHOLD
    }
}

/// Cube of density samples owned by one block record.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityBlock {
    samples: Vec<Sample>,
}

impl DensityBlock {
    /// Creates a block where every sample is empty.
    pub fn empty() -> Self {
        Self::filled(Sample::EMPTY)
    }

    /// Creates a block where every sample equals `sample`.
    pub fn filled(sample: Sample) -> Self {
        DensityBlock {
            samples: vec![sample; SAMPLE_COUNT],
        }
    }

    /// Builds a block from a flat x-fastest sample array.
    ///
    /// # Errors
    /// `InvalidConfig` if the array does not hold exactly [`SAMPLE_COUNT`] samples.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        if samples.len() != SAMPLE_COUNT {
            return Err(TerrainError::InvalidConfig(format!(
                "density block needs {} samples, got {}",
                SAMPLE_COUNT,
                samples.len()
            )));
        }
        Ok(DensityBlock { samples })
    }

    /// Flat x-fastest sample array.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        x + y * SAMPLES_PER_AXIS + z * SAMPLES_PER_AXIS * SAMPLES_PER_AXIS
    }

    #[inline]
    fn in_range(x: usize, y: usize, z: usize) -> bool {
        x < SAMPLES_PER_AXIS && y < SAMPLES_PER_AXIS && z < SAMPLES_PER_AXIS
    }

    /// Returns the sample at local coordinates, `None` outside the block.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<Sample> {
        Self::in_range(x, y, z).then(|| self.samples[Self::index(x, y, z)])
    }

    /// Density at local coordinates. The coordinates must be in range.
    #[inline]
    pub fn density(&self, x: usize, y: usize, z: usize) -> u8 {
        debug_assert!(Self::in_range(x, y, z));
        self.samples[Self::index(x, y, z)].density
    }

    /// Overwrites the sample at local coordinates.
    ///
    /// # Errors
    /// `OutOfBounds` if the coordinates fall outside the core and overlap region.
    pub fn set(&mut self, x: usize, y: usize, z: usize, density: u8, material: u8) -> Result<()> {
        if !Self::in_range(x, y, z) {
            return Err(TerrainError::out_of_bounds(
                "density block",
                Point3::new(x as f64, y as f64, z as f64),
            ));
        }
        self.samples[Self::index(x, y, z)] = Sample { density, material };
        Ok(())
    }

    /// Mutable access for in-crate writers that already clipped their range.
    #[inline]
    pub(crate) fn sample_mut(&mut self, x: usize, y: usize, z: usize) -> &mut Sample {
        &mut self.samples[Self::index(x, y, z)]
    }

    /// True when no sample differs in solidity from the first one, so the
    /// block cannot contain a surface.
    pub fn is_uniform(&self) -> bool {
        let first = self.samples[0].is_solid();
        self.samples.iter().all(|sample| sample.is_solid() == first)
    }
}

/// Flat persisted form of a block's density: its key plus the sample array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub lod: u8,
    pub coord: [i32; 3],
    pub samples: Vec<Sample>,
}

impl StoredBlock {
    pub fn new(key: BlockKey, block: &DensityBlock) -> Self {
        StoredBlock {
            lod: key.lod,
            coord: [key.coord.x, key.coord.y, key.coord.z],
            samples: block.samples().to_vec(),
        }
    }

    pub fn key(&self) -> BlockKey {
        BlockKey::new(
            self.lod,
            Point3::new(self.coord[0], self.coord[1], self.coord[2]),
        )
    }

    /// Converts back into a density block, validating the sample count.
    pub fn into_density(self) -> Result<(BlockKey, DensityBlock)> {
        let key = self.key();
        Ok((key, DensityBlock::from_samples(self.samples)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_rejects_writes_outside_the_overlap() {
        let mut block = DensityBlock::empty();
        assert!(block.set(BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE, 200, 1).is_ok());
        assert_eq!(
            block.get(BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE),
            Some(Sample::new(200, 1))
        );
        assert!(matches!(
            block.set(SAMPLES_PER_AXIS, 0, 0, 200, 1),
            Err(TerrainError::OutOfBounds { .. })
        ));
        assert_eq!(block.get(0, SAMPLES_PER_AXIS, 0), None);
    }

    #[test]
    fn uniformity_tracks_solidity_only() {
        let mut block = DensityBlock::filled(Sample::new(255, 0));
        block.set(3, 4, 5, 140, 7).unwrap();
        assert!(block.is_uniform());
        block.set(3, 4, 5, 100, 7).unwrap();
        assert!(!block.is_uniform());
    }

    #[test]
    fn stored_block_survives_json() {
        let mut block = DensityBlock::empty();
        block.set(1, 2, 3, 250, 4).unwrap();
        let key = BlockKey::new(2, Point3::new(-1, 0, 3));

        let json = serde_json::to_string(&StoredBlock::new(key, &block)).unwrap();
        let stored: StoredBlock = serde_json::from_str(&json).unwrap();
        let (restored_key, restored) = stored.into_density().unwrap();

        assert_eq!(restored_key, key);
        assert_eq!(restored, block);
    }

    #[test]
    fn short_sample_arrays_are_rejected() {
        let stored = StoredBlock {
            lod: 0,
            coord: [0, 0, 0],
            samples: vec![Sample::EMPTY; 10],
        };
        assert!(stored.into_density().is_err());
    }
}
