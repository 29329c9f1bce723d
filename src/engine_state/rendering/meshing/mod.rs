//! # Mesh Extraction
//!
//! Converts a block's density samples into a triangle mesh approximating the
//! boundary between solid and empty space.
//!
//! # Architecture
//! - `MeshExtractor`: entry point used by generation jobs
//! - `seam`: resamples faces that border a coarser LOD before contouring
//! - `tetrahedra`: the contouring pass itself (marching tetrahedra)
//! - `mesh`: the output buffers and their validation
//!
//! # Coordinates
//! Vertex positions are relative to the block origin, in world units, so a
//! LOD `L` mesh spans `BLOCK_SIZE * 2^L` on every axis. The renderer receives
//! the block origin as a translation.

mod mesh;
mod seam;
mod tetrahedra;

pub use mesh::{CollisionMesh, Mesh};
pub use seam::CoarserNeighbor;

use log::debug;

use crate::engine_state::voxels::density_block::DensityBlock;

use seam::ScalarField;
use tetrahedra::Contourer;

/// Stateless contouring front end.
pub struct MeshExtractor;

impl MeshExtractor {
    /// Contours one block.
    ///
    /// # Arguments
    /// * `block` - The block's samples, overlap layer included
    /// * `coarser` - The parent block's samples, needed when `neighbor_lod_mask` is non-zero
    /// * `neighbor_lod_mask` - Faces bordering a block one LOD coarser
    /// * `lod` - The block's LOD; sample spacing is `2^lod`
    ///
    /// # Returns
    /// The mesh, possibly empty. LOD 0 meshes also carry a collision mesh
    /// sharing the render geometry.
    pub fn extract(
        block: &DensityBlock,
        coarser: Option<CoarserNeighbor<'_>>,
        neighbor_lod_mask: u8,
        lod: u8,
    ) -> Mesh {
        if neighbor_lod_mask == 0 && block.is_uniform() {
            return Self::finish(Mesh::new(), lod);
        }

        let mut field = ScalarField::from_block(block);
        match coarser {
            Some(parent) if neighbor_lod_mask != 0 => field.snap_faces(&parent, neighbor_lod_mask),
            None if neighbor_lod_mask != 0 => {
                debug!(
                    "Seam mask {:#04x} without coarser samples, faces left unstitched",
                    neighbor_lod_mask
                );
            }
            _ => {}
        }

        let mesh = Contourer::new(&field, block, (1u32 << lod) as f32).run();
        Self::finish(mesh, lod)
    }

    fn finish(mut mesh: Mesh, lod: u8) -> Mesh {
        if lod == 0 {
            mesh.collision = Some(CollisionMesh {
                positions: mesh.vertices.iter().map(|vertex| vertex.position).collect(),
                indices: mesh.indices.clone(),
            });
        }
        mesh
    }
}
