//! # Block Extraction Task
//!
//! The job run for one block on a worker thread. It owns read-only snapshots
//! of everything it needs, so the main thread can keep editing and evicting
//! while it runs:
//!
//! 1. If no density snapshot was given, generate it from the density source
//!    and replay the edits recorded for the block.
//! 2. For leaves, contour the density (stitching coarse-facing faces to the
//!    parent snapshot) and validate the mesh.

use std::sync::Arc;

use web_time::{Duration, Instant};

use crate::{
    engine_state::{
        rendering::{CoarserNeighbor, Mesh, MeshExtractor},
        task_management::task::Task,
        voxels::{
            block_key::BlockKey, density_block::DensityBlock, density_source::DensitySource,
            edit_operation::EditOperation,
        },
    },
    error::{Result, TerrainError},
};

/// Work description for one block.
pub struct ExtractionTask {
    pub key: BlockKey,
    pub token: u64,
    /// Current density, or `None` to generate it.
    pub density: Option<Arc<DensityBlock>>,
    pub source: Arc<dyn DensitySource>,
    /// Edits to replay over freshly generated density, in history order.
    pub edits: Vec<EditOperation>,
    /// Length of the edit history when the task was built.
    pub history_len: usize,
    /// Parent density for seam stitching.
    pub parent: Option<Arc<DensityBlock>>,
    pub neighbor_lod_mask: u8,
    /// Leaves are contoured; ancestors only need density.
    pub build_mesh: bool,
}

/// What a finished extraction hands back to the main thread.
pub struct ExtractionOutput {
    pub key: BlockKey,
    pub token: u64,
    /// Density produced by this task, when it had to generate it.
    pub generated: Option<Arc<DensityBlock>>,
    /// See [`ExtractionTask::history_len`].
    pub history_len: usize,
    /// The mesh for leaves, `None` for density-only tasks.
    pub mesh: Result<Option<Mesh>>,
    pub elapsed: Duration,
}

impl ExtractionTask {
    fn generate(&self) -> Result<Arc<DensityBlock>> {
        let mut block = DensityBlock::empty();
        self.source.fill(self.key, &mut block)?;

        let origin = self.key.origin();
        let scale = self.key.scale();
        for edit in &self.edits {
            edit.apply(&mut block, origin, scale);
        }
        Ok(Arc::new(block))
    }

    fn contour(&self, density: &DensityBlock) -> Result<Mesh> {
        let coarser = self.parent.as_deref().map(|parent| CoarserNeighbor {
            density: parent,
            child_offset: self.key.child_offset(),
        });
        let mesh = MeshExtractor::extract(density, coarser, self.neighbor_lod_mask, self.key.lod);

        mesh.validate()
            .map_err(|reason| TerrainError::GenerationFailure {
                key: self.key,
                reason,
            })?;
        Ok(mesh)
    }
}

impl Task for ExtractionTask {
    type Output = ExtractionOutput;

    fn process(self: Box<Self>) -> ExtractionOutput {
        let start = Instant::now();

        let (density, generated) = match &self.density {
            Some(density) => (Ok(density.clone()), None),
            None => match self.generate() {
                Ok(density) => (Ok(density.clone()), Some(density)),
                Err(error) => (Err(error), None),
            },
        };

        let mesh = density.and_then(|density| {
            if self.build_mesh {
                self.contour(&density).map(Some)
            } else {
                Ok(None)
            }
        });

        ExtractionOutput {
            key: self.key,
            token: self.token,
            generated,
            history_len: self.history_len,
            mesh,
            elapsed: start.elapsed(),
        }
    }
}
