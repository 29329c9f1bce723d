//! # Renderer and Physics Collaborators
//!
//! The terrain does not draw or simulate anything itself. It hands finished
//! meshes to a [`Renderer`] (one scene node per visible block, parented under
//! a stable root node) and LOD 0 collision geometry to a [`Physics`] backend,
//! keeping only the opaque handles they return. Each handle is owned by one
//! block record and released exactly once.
//!
//! `HeadlessRenderer` and `HeadlessPhysics` keep their state in memory. Clones
//! share that state, so a caller can hand one clone to the terrain and inspect
//! the scene through another.

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Matrix4;
use thiserror::Error;

use crate::core::MtResource;

use super::meshing::Mesh;

/// Opaque scene node id issued by a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Opaque collision body id issued by a physics backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u64);

/// Reason a collaborator could not create a handle.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// Scene-side consumer of terrain meshes.
pub trait Renderer {
    /// Creates a mesh node under `parent`.
    ///
    /// # Arguments
    /// * `parent` - Stable terrain root node
    /// * `mesh` - Block-local geometry, shared with the terrain
    /// * `material` - Material id applied to the whole node
    /// * `transform` - Block origin as a world translation
    fn create_mesh_node(
        &mut self,
        parent: NodeHandle,
        mesh: Arc<Mesh>,
        material: u32,
        transform: Matrix4<f32>,
    ) -> Result<NodeHandle, CollaboratorError>;

    fn destroy_node(&mut self, node: NodeHandle);

    fn set_visible(&mut self, node: NodeHandle, visible: bool);
}

/// Physics-side consumer of LOD 0 collision geometry.
pub trait Physics {
    fn create_collision_body(
        &mut self,
        vertices: &[[f32; 3]],
        indices: &[u32],
        transform: Matrix4<f32>,
    ) -> Result<BodyHandle, CollaboratorError>;

    fn destroy_body(&mut self, body: BodyHandle);
}

/// A node held by [`HeadlessRenderer`].
#[derive(Clone, Debug)]
pub struct HeadlessNode {
    pub parent: NodeHandle,
    pub mesh: Arc<Mesh>,
    pub material: u32,
    pub transform: Matrix4<f32>,
    pub visible: bool,
}

/// Scene state shared by clones of a [`HeadlessRenderer`].
#[derive(Debug, Default)]
pub struct HeadlessScene {
    pub nodes: HashMap<NodeHandle, HeadlessNode>,
    pub created: usize,
    pub destroyed: usize,
    /// Number of upcoming `create_mesh_node` calls that fail.
    pub fail_next: usize,
    next_id: u64,
}

impl HeadlessScene {
    pub fn visible_nodes(&self) -> impl Iterator<Item = &HeadlessNode> {
        self.nodes.values().filter(|node| node.visible)
    }
}

/// In-memory renderer with failure injection.
#[derive(Clone)]
pub struct HeadlessRenderer {
    scene: MtResource<HeadlessScene>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        HeadlessRenderer {
            scene: MtResource::new(HeadlessScene::default()),
        }
    }

    /// Shared view of the scene.
    pub fn scene(&self) -> MtResource<HeadlessScene> {
        self.scene.clone()
    }

    /// Makes the next `count` node creations fail.
    pub fn fail_next(&self, count: usize) {
        self.scene.get_mut().fail_next = count;
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for HeadlessRenderer {
    fn create_mesh_node(
        &mut self,
        parent: NodeHandle,
        mesh: Arc<Mesh>,
        material: u32,
        transform: Matrix4<f32>,
    ) -> Result<NodeHandle, CollaboratorError> {
        let mut scene = self.scene.get_mut();
        if scene.fail_next > 0 {
            scene.fail_next -= 1;
            return Err(CollaboratorError("out of mesh memory".to_string()));
        }

        scene.next_id += 1;
        let handle = NodeHandle(scene.next_id);
        scene.nodes.insert(
            handle,
            HeadlessNode {
                parent,
                mesh,
                material,
                transform,
                visible: true,
            },
        );
        scene.created += 1;
        Ok(handle)
    }

    fn destroy_node(&mut self, node: NodeHandle) {
        let mut scene = self.scene.get_mut();
        let removed = scene.nodes.remove(&node);
        debug_assert!(removed.is_some(), "node {:?} destroyed twice", node);
        scene.destroyed += 1;
    }

    fn set_visible(&mut self, node: NodeHandle, visible: bool) {
        if let Some(node) = self.scene.get_mut().nodes.get_mut(&node) {
            node.visible = visible;
        }
    }
}

/// A body held by [`HeadlessPhysics`].
#[derive(Clone, Debug)]
pub struct HeadlessBody {
    pub triangle_count: usize,
    pub transform: Matrix4<f32>,
}

/// Physics world state shared by clones of a [`HeadlessPhysics`].
#[derive(Debug, Default)]
pub struct HeadlessWorld {
    pub bodies: HashMap<BodyHandle, HeadlessBody>,
    pub fail_next: usize,
    next_id: u64,
}

/// In-memory physics backend with failure injection.
#[derive(Clone)]
pub struct HeadlessPhysics {
    world: MtResource<HeadlessWorld>,
}

impl HeadlessPhysics {
    pub fn new() -> Self {
        HeadlessPhysics {
            world: MtResource::new(HeadlessWorld::default()),
        }
    }

    pub fn world(&self) -> MtResource<HeadlessWorld> {
        self.world.clone()
    }

    pub fn fail_next(&self, count: usize) {
        self.world.get_mut().fail_next = count;
    }
}

impl Default for HeadlessPhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl Physics for HeadlessPhysics {
    fn create_collision_body(
        &mut self,
        vertices: &[[f32; 3]],
        indices: &[u32],
        transform: Matrix4<f32>,
    ) -> Result<BodyHandle, CollaboratorError> {
        let mut world = self.world.get_mut();
        if world.fail_next > 0 {
            world.fail_next -= 1;
            return Err(CollaboratorError("collision shape rejected".to_string()));
        }
        debug_assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));

        world.next_id += 1;
        let handle = BodyHandle(world.next_id);
        world.bodies.insert(
            handle,
            HeadlessBody {
                triangle_count: indices.len() / 3,
                transform,
            },
        );
        Ok(handle)
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        let removed = self.world.get_mut().bodies.remove(&body);
        debug_assert!(removed.is_some(), "body {:?} destroyed twice", body);
    }
}
