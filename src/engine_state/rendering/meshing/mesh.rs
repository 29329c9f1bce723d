//! Mesh data produced by contouring.

use crate::engine_state::rendering::Vertex;

/// Triangle soup handed to the physics collaborator for LOD 0 blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

/// An indexed triangle mesh for one block.
///
/// Positions are relative to the block origin, in world units. A mesh with no
/// triangles is a valid result for blocks that are entirely solid or empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Only populated for LOD 0 blocks.
    pub collision: Option<CollisionMesh>,
}

impl Mesh {
    /// Creates a new, empty mesh.
    pub fn new() -> Self {
        Mesh::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Checks the structural invariants a renderer relies on.
    ///
    /// # Returns
    /// `Err` with a description of the first violation: an index count that
    /// is not a multiple of three, an index past the vertex buffer, or a
    /// non-finite position. The same checks cover the collision mesh.
    pub fn validate(&self) -> Result<(), String> {
        Self::validate_buffers(
            self.vertices.iter().map(|vertex| &vertex.position),
            self.vertices.len(),
            &self.indices,
        )?;
        if let Some(collision) = &self.collision {
            Self::validate_buffers(
                collision.positions.iter(),
                collision.positions.len(),
                &collision.indices,
            )
            .map_err(|reason| format!("collision mesh: {}", reason))?;
        }
        Ok(())
    }

    fn validate_buffers<'a>(
        positions: impl Iterator<Item = &'a [f32; 3]>,
        vertex_count: usize,
        indices: &[u32],
    ) -> Result<(), String> {
        if indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            ));
        }
        if let Some(index) = indices.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(format!(
                "index {} out of range for {} vertices",
                index, vertex_count
            ));
        }
        if positions.flatten().any(|coordinate| !coordinate.is_finite()) {
            return Err("non-finite vertex position".to_string());
        }
        Ok(())
    }
}
