//! Vertex format of terrain meshes.
//!
//! Terrain vertices are plain-old-data so a renderer can upload the vertex
//! buffer with `bytemuck::cast_slice` and no intermediate copy.

use cgmath::{Point3, Vector3};

/// A vertex of a terrain mesh.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes), block-local world units
/// - Normal: [f32; 3] (12 bytes), unit length, pointing out of the solid
/// - Material: u32 (4 bytes)
///
/// Total size: 28 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub material: u32,
}

impl Vertex {
    /// Creates a new vertex with a zero normal.
    ///
    /// # Arguments
    /// * `position` - Position relative to the owning block's origin
    /// * `material` - Material id of the solid side
    pub fn new(position: Point3<f32>, material: u32) -> Self {
        Vertex {
            position: [position.x, position.y, position.z],
            normal: [0.0; 3],
            material,
        }
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }

    pub fn normal(&self) -> Vector3<f32> {
        Vector3::new(self.normal[0], self.normal[1], self.normal[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_cast_to_bytes_without_padding() {
        let vertices = [Vertex::new(Point3::new(1.0, 2.0, 3.0), 7); 2];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 2 * 28);
        assert_eq!(std::mem::size_of::<Vertex>(), 28);
    }
}
