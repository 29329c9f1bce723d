//! # Block Keys
//!
//! A block is addressed by its LOD level and its integer coordinate in that
//! level's grid. A block at LOD `L` spans `BLOCK_SIZE * 2^L` world units on
//! every axis, so the eight blocks at `L` under one block at `L + 1` are found
//! by doubling the coordinate and adding a 0/1 offset per axis.

use std::fmt;

use cgmath::{Point3, Vector3};

use crate::engine_state::spatial::Aabb;

use super::density_block::BLOCK_SIZE;

/// Represents the six faces of a block.
///
/// The discriminants are the bits used in a block's neighbour LOD mask.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockFace {
    /// The face pointing towards positive X
    PosX = 0x20,
    /// The face pointing towards negative X
    NegX = 0x10,
    /// The face pointing towards positive Y
    PosY = 0x08,
    /// The face pointing towards negative Y
    NegY = 0x04,
    /// The face pointing towards positive Z
    PosZ = 0x02,
    /// The face pointing towards negative Z
    NegZ = 0x01,
}

impl BlockFace {
    /// All six faces, in mask bit order from the highest bit down.
    pub const ALL: [BlockFace; 6] = [
        BlockFace::PosX,
        BlockFace::NegX,
        BlockFace::PosY,
        BlockFace::NegY,
        BlockFace::PosZ,
        BlockFace::NegZ,
    ];

    /// The bit this face occupies in a neighbour LOD mask.
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Axis the face is perpendicular to (0 = x, 1 = y, 2 = z).
    pub fn axis(self) -> usize {
        match self {
            BlockFace::PosX | BlockFace::NegX => 0,
            BlockFace::PosY | BlockFace::NegY => 1,
            BlockFace::PosZ | BlockFace::NegZ => 2,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, BlockFace::PosX | BlockFace::PosY | BlockFace::PosZ)
    }

    /// Unit step from a block to the neighbour behind this face.
    pub fn direction(self) -> Vector3<i32> {
        let step = if self.is_positive() { 1 } else { -1 };
        let mut direction = Vector3::new(0, 0, 0);
        direction[self.axis()] = step;
        direction
    }
}

/// Identity of a terrain block: LOD level plus grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// 0 is the finest level.
    pub lod: u8,
    /// Coordinate in units of this level's block size.
    pub coord: Point3<i32>,
}

impl BlockKey {
    pub fn new(lod: u8, coord: Point3<i32>) -> Self {
        BlockKey { lod, coord }
    }

    /// The block at `lod` whose core region contains the world voxel `position`.
    pub fn containing(position: Point3<i32>, lod: u8) -> Self {
        let size = Self::size_at(lod);
        BlockKey {
            lod,
            coord: Point3::new(
                position.x.div_euclid(size),
                position.y.div_euclid(size),
                position.z.div_euclid(size),
            ),
        }
    }

    /// Edge length in world units of a block at `lod`.
    pub fn size_at(lod: u8) -> i32 {
        (BLOCK_SIZE as i32) << lod
    }

    /// Edge length in world units of this block.
    pub fn size(&self) -> i32 {
        Self::size_at(self.lod)
    }

    /// Distance in world units between two adjacent samples of this block.
    pub fn scale(&self) -> i32 {
        1 << self.lod
    }

    /// World position of sample (0, 0, 0).
    pub fn origin(&self) -> Point3<i32> {
        let size = self.size();
        Point3::new(self.coord.x * size, self.coord.y * size, self.coord.z * size)
    }

    pub fn center(&self) -> Point3<f64> {
        let origin = self.origin();
        let half = self.size() as f64 * 0.5;
        Point3::new(
            origin.x as f64 + half,
            origin.y as f64 + half,
            origin.z as f64 + half,
        )
    }

    /// World box covered by the block's samples, overlap layer included.
    /// Adjacent blocks share their boundary planes.
    pub fn bounds(&self) -> Aabb {
        let origin = self.origin();
        let size = self.size() as f64;
        let min = Point3::new(origin.x as f64, origin.y as f64, origin.z as f64);
        Aabb::from_points(min, Point3::new(min.x + size, min.y + size, min.z + size))
    }

    pub fn parent(&self) -> BlockKey {
        BlockKey {
            lod: self.lod + 1,
            coord: Point3::new(
                self.coord.x.div_euclid(2),
                self.coord.y.div_euclid(2),
                self.coord.z.div_euclid(2),
            ),
        }
    }

    /// Position of this block inside its parent, 0 or 1 per axis.
    pub fn child_offset(&self) -> [usize; 3] {
        [
            self.coord.x.rem_euclid(2) as usize,
            self.coord.y.rem_euclid(2) as usize,
            self.coord.z.rem_euclid(2) as usize,
        ]
    }

    /// The eight blocks one level finer. Bit 0 of the index selects +x, bit 1
    /// +y and bit 2 +z.
    ///
    /// # Panics
    /// Panics in debug builds when called on a LOD 0 block.
    pub fn children(&self) -> [BlockKey; 8] {
        debug_assert!(self.lod > 0, "LOD 0 blocks have no children");
        let lod = self.lod.saturating_sub(1);
        let base = Point3::new(self.coord.x * 2, self.coord.y * 2, self.coord.z * 2);
        std::array::from_fn(|index| BlockKey {
            lod,
            coord: Point3::new(
                base.x + (index & 1) as i32,
                base.y + ((index >> 1) & 1) as i32,
                base.z + ((index >> 2) & 1) as i32,
            ),
        })
    }

    /// Same-level block behind `face`.
    pub fn neighbor(&self, face: BlockFace) -> BlockKey {
        BlockKey {
            lod: self.lod,
            coord: self.coord + face.direction(),
        }
    }

    /// The block at the coarser level `lod` that contains this one.
    pub fn ancestor_at(&self, lod: u8) -> BlockKey {
        debug_assert!(lod >= self.lod);
        let shift = lod - self.lod;
        BlockKey {
            lod,
            coord: Point3::new(
                self.coord.x >> shift,
                self.coord.y >> shift,
                self.coord.z >> shift,
            ),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L{}({}, {}, {})",
            self.lod, self.coord.x, self.coord.y, self.coord.z
        )
    }
}
