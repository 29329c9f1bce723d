//! Rendering side of the terrain.
//!
//! This module turns density into geometry and defines the interfaces through
//! which that geometry leaves the terrain. Nothing here talks to a GPU; a
//! renderer implementing [`Renderer`] does.

pub mod collaborators;
pub mod meshing;
mod vertex;

// Re-export commonly used types
pub use collaborators::{
    BodyHandle, CollaboratorError, HeadlessPhysics, HeadlessRenderer, NodeHandle, Physics,
    Renderer,
};
pub use meshing::{CoarserNeighbor, CollisionMesh, Mesh, MeshExtractor};
pub use vertex::Vertex;
