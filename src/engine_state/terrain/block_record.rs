//! Per-block bookkeeping owned by the lifecycle manager.

use std::sync::Arc;

use crate::engine_state::{
    rendering::{BodyHandle, Mesh, NodeHandle},
    voxels::{block_key::BlockKey, density_block::DensityBlock},
};

/// Lifecycle state of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Resident but nothing submitted yet.
    Empty,
    /// A job carrying the current token is queued or running.
    Generating,
    /// The block's density (and mesh, for leaves) reflects its latest data.
    Ready,
    /// Data changed since the last job; resubmitted on the next update.
    Dirty,
    /// No longer required; destroyed once no job references it.
    Evicting,
}

/// The installed mesh of a block and the collaborator handles created for it.
#[derive(Debug)]
pub struct MeshHandle {
    pub mesh: Arc<Mesh>,
    /// `None` for empty meshes and when the renderer refused the mesh.
    pub node: Option<NodeHandle>,
    /// Only LOD 0 blocks get a collision body.
    pub body: Option<BodyHandle>,
    pub visible: bool,
}

impl MeshHandle {
    /// A handle that represents "meshed, nothing to show".
    pub fn empty() -> Self {
        MeshHandle {
            mesh: Arc::new(Mesh::new()),
            node: None,
            body: None,
            visible: false,
        }
    }
}

/// Everything the manager tracks about one resident block.
#[derive(Debug)]
pub struct BlockRecord {
    pub key: BlockKey,
    pub state: BlockState,
    /// Faces bordering a leaf one LOD coarser.
    pub neighbor_lod_mask: u8,
    pub mesh: Option<MeshHandle>,
    /// Token of the most recent submission. Results carrying any other token
    /// are stale.
    pub generation_token: u64,
    /// Copy-on-write density. Jobs hold clones of the `Arc`, never the record.
    pub density: Option<Arc<DensityBlock>>,
    /// Part of the current required set.
    pub required: bool,
    /// Required leaves are meshed; other required blocks only hold density.
    pub leaf: bool,
    /// Consecutive failed generations.
    pub retries: u32,
}

impl BlockRecord {
    pub fn new(key: BlockKey, density: Option<Arc<DensityBlock>>) -> Self {
        BlockRecord {
            key,
            state: BlockState::Empty,
            neighbor_lod_mask: 0,
            mesh: None,
            generation_token: 0,
            density,
            required: true,
            leaf: false,
            retries: 0,
        }
    }

    /// True when a required leaf has something settled to display, even an
    /// empty mesh.
    pub fn is_resolved_leaf(&self) -> bool {
        self.required && self.leaf && self.mesh.is_some()
    }

    /// A former leaf, now refined, still showing its old mesh.
    pub fn is_fallback(&self) -> bool {
        self.required && !self.leaf && self.mesh.is_some()
    }

    /// No longer required and not yet evicting: either waiting for its
    /// replacement to be shown or about to be evicted.
    pub fn is_lingering(&self) -> bool {
        !self.required && self.state != BlockState::Evicting
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh
            .as_ref()
            .map_or(0, |handle| handle.mesh.triangle_count())
    }
}
