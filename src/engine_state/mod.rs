//! # Engine State Module
//!
//! The terrain engine's subsystems.
//!
//! ## Key Components
//!
//! * `spatial` - Generic quadtree/octree point index
//! * `voxels` - Block addressing, density storage, generation and edits
//! * `rendering` - Contouring and the renderer/physics collaborator interfaces
//! * `task_management` - Worker pool running jobs off the update thread
//! * `terrain` - The block lifecycle manager tying everything together
//!
//! ## Architecture
//!
//! Data flows one way through a frame: triggers decide which blocks must be
//! resident, the spatial index tracks them, generation jobs turn their density
//! into meshes on the workers, and finished meshes go back to the update
//! thread where they are handed to the collaborators. Edits mutate density on
//! the update thread and send the affected blocks through generation again.

pub mod rendering;
pub mod spatial;
pub mod task_management;
pub mod terrain;
pub mod voxels;
