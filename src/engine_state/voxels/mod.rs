//! # Voxel Data
//!
//! The volumetric side of the terrain: how blocks are addressed, what they
//! store, how they are first filled and how they are edited afterwards.
//!
//! ## Architecture
//!
//! * **BlockKey**: LOD level plus integer coordinate in that level's grid
//! * **DensityBlock**: `(density, material)` samples for one block, with a
//!   one-sample overlap on the positive faces shared with the neighbours
//! * **DensitySource**: procedural generators run inside generation jobs
//! * **EditOperation**: idempotent shape writes applied on the update thread
//!
//! ## Thread Safety
//!
//! Density is only mutated on the update thread. Generation jobs read it
//! through `Arc` snapshots; an edit during a job clones the block first.

pub mod block_key;
pub mod density_block;
pub mod density_source;
pub mod edit_operation;
