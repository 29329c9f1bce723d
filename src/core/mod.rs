//! # Core Module
//!
//! Shared-state primitives used at the seams between the terrain and the
//! systems that feed it.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking.
//!   Doubles as a trigger position provider.

pub mod mt_resource;

pub use mt_resource::MtResource;
