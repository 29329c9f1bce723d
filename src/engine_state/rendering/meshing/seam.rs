//! # LOD Seams
//!
//! When a block borders a neighbour one LOD coarser, the two blocks contour
//! the shared face plane at different resolutions and their boundary vertices
//! would not line up. Before contouring, the fine block's samples on every
//! such face are replaced by the coarse grid's piecewise-linear interpolation,
//! taken from the block's parent (which covers the same face plane at the
//! coarser spacing).
//!
//! The interpolation follows the triangulation the contourer uses on face
//! planes: every square cell is split along its low-low/high-high diagonal.
//! Each fine face triangle lies inside one coarse face triangle, where the
//! interpolant is linear, so the fine contour on the face is the coarse
//! contour. The two meshes meet along the face without cracks, leaving only
//! T-junctions.

use crate::engine_state::voxels::{
    block_key::BlockFace,
    density_block::{DensityBlock, BLOCK_SIZE, ISO_LEVEL, SAMPLES_PER_AXIS},
};

/// The parent block's density, used to resample faces bordering a coarser LOD.
#[derive(Clone, Copy, Debug)]
pub struct CoarserNeighbor<'a> {
    pub density: &'a DensityBlock,
    /// Position of the fine block inside the parent, 0 or 1 per axis.
    pub child_offset: [usize; 3],
}

/// Densities shifted by the iso level: positive is solid.
pub(super) struct ScalarField {
    values: Vec<f32>,
}

impl ScalarField {
    pub(super) fn from_block(block: &DensityBlock) -> Self {
        ScalarField {
            values: block
                .samples()
                .iter()
                .map(|sample| sample.density as f32 - ISO_LEVEL)
                .collect(),
        }
    }

    #[inline]
    pub(super) fn index(x: usize, y: usize, z: usize) -> usize {
        x + y * SAMPLES_PER_AXIS + z * SAMPLES_PER_AXIS * SAMPLES_PER_AXIS
    }

    #[inline]
    pub(super) fn at(&self, index: usize) -> f32 {
        self.values[index]
    }

    /// Replaces the samples on every face flagged in `mask` with the parent's
    /// interpolated values.
    pub(super) fn snap_faces(&mut self, parent: &CoarserNeighbor<'_>, mask: u8) {
        for face in BlockFace::ALL {
            if mask & face.bit() == 0 {
                continue;
            }

            let axis = face.axis();
            let (u_axis, v_axis) = match axis {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            let plane = if face.is_positive() { BLOCK_SIZE } else { 0 };

            for v in 0..SAMPLES_PER_AXIS {
                for u in 0..SAMPLES_PER_AXIS {
                    let mut local = [0usize; 3];
                    local[axis] = plane;
                    local[u_axis] = u;
                    local[v_axis] = v;

                    let value = parent_face_value(parent, local, axis, u_axis, v_axis);
                    self.values[Self::index(local[0], local[1], local[2])] = value;
                }
            }
        }
    }
}

/// Piecewise-linear interpolation of the parent's face plane at the parent
/// position of fine sample `local`.
fn parent_face_value(
    parent: &CoarserNeighbor<'_>,
    local: [usize; 3],
    axis: usize,
    u_axis: usize,
    v_axis: usize,
) -> f32 {
    // fine sample i of a child at offset o sits at parent coordinate (o * B + i) / 2
    let doubled = |a: usize| parent.child_offset[a] * BLOCK_SIZE + local[a];

    let plane = doubled(axis) / 2;
    let (u0, u_half) = (doubled(u_axis) / 2, doubled(u_axis) % 2);
    let (v0, v_half) = (doubled(v_axis) / 2, doubled(v_axis) % 2);

    let sample = |du: usize, dv: usize| {
        let mut position = [0usize; 3];
        position[axis] = plane;
        position[u_axis] = (u0 + du).min(BLOCK_SIZE);
        position[v_axis] = (v0 + dv).min(BLOCK_SIZE);
        parent.density.density(position[0], position[1], position[2]) as f32 - ISO_LEVEL
    };

    let s = u_half as f32 * 0.5;
    let t = v_half as f32 * 0.5;
    let f00 = sample(0, 0);
    if s == 0.0 && t == 0.0 {
        return f00;
    }

    let f11 = sample(1, 1);
    if s >= t {
        let f10 = sample(1, 0);
        f00 + s * (f10 - f00) + t * (f11 - f10)
    } else {
        let f01 = sample(0, 1);
        f00 + t * (f01 - f00) + s * (f11 - f01)
    }
}
