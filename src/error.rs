//! # Terrain Errors
//!
//! Every fallible operation in the crate reports a [`TerrainError`]. Per-block
//! failures never abort an update tick; they are either retried by the
//! lifecycle manager or surfaced as diagnostics in the tick's report.
//!
//! Stale generation results are deliberately absent from this taxonomy. A
//! token mismatch at drain time is expected under heavy editing and is only
//! counted.

use cgmath::Point3;
use thiserror::Error;

use crate::engine_state::voxels::block_key::BlockKey;

/// Errors produced by the terrain core.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// A position or region lies outside the extents of the structure it was
    /// handed to (spatial tree root, world bounds, block sample grid).
    #[error("position ({x}, {y}, {z}) is outside of {what}")]
    OutOfBounds {
        what: &'static str,
        x: f64,
        y: f64,
        z: f64,
    },

    /// Density generation or mesh extraction produced unusable output.
    #[error("generation failed for block {key}: {reason}")]
    GenerationFailure { key: BlockKey, reason: String },

    /// The renderer or physics collaborator could not create a handle.
    #[error("{collaborator} could not represent block {key}: {reason}")]
    MissingCollaborator {
        collaborator: &'static str,
        key: BlockKey,
        reason: String,
    },

    /// The terrain configuration is unusable.
    #[error("invalid terrain configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

impl TerrainError {
    /// Builds an [`TerrainError::OutOfBounds`] from any point convertible to `f64`.
    pub fn out_of_bounds<S: Into<f64> + Copy>(what: &'static str, position: Point3<S>) -> Self {
        TerrainError::OutOfBounds {
            what,
            x: position.x.into(),
            y: position.y.into(),
            z: position.z.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TerrainError>;
