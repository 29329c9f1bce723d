//! Hands finished meshes to the renderer and physics collaborators and
//! releases what they returned.

use std::sync::Arc;

use cgmath::{Matrix4, Vector3};
use log::warn;

use crate::{
    engine_state::{
        rendering::{Mesh, NodeHandle, Physics, Renderer},
        voxels::block_key::BlockKey,
    },
    error::TerrainError,
};

use super::block_record::MeshHandle;

pub(super) struct SceneBinding {
    renderer: Box<dyn Renderer>,
    physics: Box<dyn Physics>,
    root: NodeHandle,
    material: u32,
}

impl SceneBinding {
    pub fn new(
        renderer: Box<dyn Renderer>,
        physics: Box<dyn Physics>,
        root: NodeHandle,
        material: u32,
    ) -> Self {
        SceneBinding {
            renderer,
            physics,
            root,
            material,
        }
    }

    /// Creates the node (and, at LOD 0, the collision body) for a mesh. New
    /// nodes start hidden; visibility is decided once per update.
    ///
    /// Collaborator failures leave the corresponding handle empty and are
    /// pushed to `diagnostics`.
    pub fn present(
        &mut self,
        key: BlockKey,
        mesh: Mesh,
        diagnostics: &mut Vec<TerrainError>,
    ) -> MeshHandle {
        let mesh = Arc::new(mesh);
        if mesh.is_empty() {
            return MeshHandle {
                mesh,
                node: None,
                body: None,
                visible: false,
            };
        }

        let origin = key.origin();
        let transform =
            Matrix4::from_translation(Vector3::new(origin.x as f32, origin.y as f32, origin.z as f32));

        let node = match self
            .renderer
            .create_mesh_node(self.root, mesh.clone(), self.material, transform)
        {
            Ok(node) => {
                self.renderer.set_visible(node, false);
                Some(node)
            }
            Err(error) => {
                warn!("Renderer refused mesh for {}: {}", key, error);
                diagnostics.push(TerrainError::MissingCollaborator {
                    collaborator: "renderer",
                    key,
                    reason: error.0,
                });
                None
            }
        };

        let body = match (key.lod, &mesh.collision) {
            (0, Some(collision)) if !collision.indices.is_empty() => {
                match self.physics.create_collision_body(
                    &collision.positions,
                    &collision.indices,
                    transform,
                ) {
                    Ok(body) => Some(body),
                    Err(error) => {
                        warn!("Physics refused collision mesh for {}: {}", key, error);
                        diagnostics.push(TerrainError::MissingCollaborator {
                            collaborator: "physics",
                            key,
                            reason: error.0,
                        });
                        None
                    }
                }
            }
            _ => None,
        };

        MeshHandle {
            mesh,
            node,
            body,
            visible: false,
        }
    }

    /// Destroys every collaborator handle held by `handle`.
    pub fn release(&mut self, handle: MeshHandle) {
        if let Some(node) = handle.node {
            self.renderer.destroy_node(node);
        }
        if let Some(body) = handle.body {
            self.physics.destroy_body(body);
        }
    }

    pub fn set_visible(&mut self, handle: &mut MeshHandle, visible: bool) {
        if let Some(node) = handle.node {
            if handle.visible != visible {
                self.renderer.set_visible(node, visible);
            }
        }
        handle.visible = visible && handle.node.is_some();
    }
}
