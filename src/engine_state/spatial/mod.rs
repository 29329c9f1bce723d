//! # Spatial Partition Tree
//!
//! A generic point index over axis-aligned regions: a quadtree for `D = 2`, an
//! octree for `D = 3`. It answers two questions, "where is entry X" and "which
//! entries lie inside region R", and knows nothing about terrain.
//!
//! ## Structure
//!
//! Nodes live in a single arena (`Vec`). A node is either a leaf holding up to
//! `capacity` entries, or an internal node whose `2^D` children are stored
//! consecutively in the arena. Inserting into a full leaf splits it into
//! uniform halves on every axis and redistributes its entries by comparing each
//! position against the node center, one bit per axis. Nodes are never merged
//! back; removing entries leaves empty leaves behind.
//!
//! ## Threading
//!
//! The tree has no interior synchronization. It is owned by the terrain's
//! update thread and mutated only there.

pub mod region;

use std::collections::HashMap;
use std::hash::Hash;

use cgmath::Point3;

use crate::error::{Result, TerrainError};
pub use region::{Aabb, Rect, Region};

/// Entries a leaf holds before it is split.
pub const DEFAULT_CAPACITY: usize = 4;

/// Depth at which leaves stop splitting and simply grow. Guards against
/// unbounded splitting when many entries share one position.
pub const DEFAULT_MAX_DEPTH: u32 = 24;

struct Node<T, const D: usize> {
    region: Region<D>,
    /// Arena index of the first of `2^D` consecutive children.
    children: Option<usize>,
    entries: Vec<(T, [f64; D])>,
    depth: u32,
}

impl<T, const D: usize> Node<T, D> {
    fn leaf(region: Region<D>, depth: u32) -> Self {
        Node {
            region,
            children: None,
            entries: Vec::new(),
            depth,
        }
    }
}

/// Point index over a fixed root region.
pub struct SpatialTree<T, const D: usize> {
    nodes: Vec<Node<T, D>>,
    /// Leaf each entry currently lives in.
    locations: HashMap<T, usize>,
    capacity: usize,
    max_depth: u32,
}

/// Quadtree over 2D points.
pub type Quadtree<T> = SpatialTree<T, 2>;
/// Octree over 3D points.
pub type Octree<T> = SpatialTree<T, 3>;

impl<T: Copy + Eq + Hash, const D: usize> SpatialTree<T, D> {
    /// Creates an empty tree with the default leaf capacity.
    pub fn new(root: Region<D>) -> Self {
        Self::with_capacity(root, DEFAULT_CAPACITY)
    }

    /// Creates an empty tree whose leaves split once they hold more than
    /// `capacity` entries.
    pub fn with_capacity(root: Region<D>, capacity: usize) -> Self {
        SpatialTree {
            nodes: vec![Node::leaf(root, 0)],
            locations: HashMap::new(),
            capacity: capacity.max(1),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn root_region(&self) -> Region<D> {
        self.nodes[0].region
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of nodes ever created. Bounded by the entries ever inserted,
    /// since nodes are never merged.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &T) -> bool {
        self.locations.contains_key(id)
    }

    /// Stored position of an entry.
    pub fn position(&self, id: &T) -> Option<[f64; D]> {
        let leaf = *self.locations.get(id)?;
        self.nodes[leaf]
            .entries
            .iter()
            .find(|(entry, _)| entry == id)
            .map(|(_, position)| *position)
    }

    /// Inserts an entry.
    ///
    /// Inserting an id that is already present moves it to the new position.
    ///
    /// # Errors
    /// [`TerrainError::OutOfBounds`] if `position` lies outside the root region.
    pub fn insert(&mut self, id: T, position: [f64; D]) -> Result<()> {
        if !self.nodes[0].region.contains(&position) {
            return Err(Self::out_of_bounds(&position));
        }

        if self.locations.contains_key(&id) {
            self.remove(&id);
        }

        let mut node = 0;
        loop {
            if let Some(first_child) = self.nodes[node].children {
                node = first_child + self.nodes[node].region.child_index(&position);
                continue;
            }

            let leaf = &mut self.nodes[node];
            if leaf.entries.len() < self.capacity || leaf.depth >= self.max_depth {
                leaf.entries.push((id, position));
                self.locations.insert(id, node);
                return Ok(());
            }

            // leaf is full, split and retry from the same node
            self.split(node);
        }
    }

    /// Removes an entry, returning its last position. Never merges nodes.
    pub fn remove(&mut self, id: &T) -> Option<[f64; D]> {
        let leaf = self.locations.remove(id)?;
        let entries = &mut self.nodes[leaf].entries;
        let index = entries.iter().position(|(entry, _)| entry == id)?;
        Some(entries.swap_remove(index).1)
    }

    /// Moves an entry to a new position.
    ///
    /// # Errors
    /// [`TerrainError::OutOfBounds`] if `position` lies outside the root
    /// region; the entry is left untouched in that case.
    pub fn update(&mut self, id: T, position: [f64; D]) -> Result<()> {
        if !self.nodes[0].region.contains(&position) {
            return Err(Self::out_of_bounds(&position));
        }

        if let Some(&leaf) = self.locations.get(&id) {
            if self.nodes[leaf].region.contains(&position) {
                if let Some(entry) = self.nodes[leaf]
                    .entries
                    .iter_mut()
                    .find(|(entry, _)| *entry == id)
                {
                    entry.1 = position;
                    return Ok(());
                }
            }
        }

        self.remove(&id);
        self.insert(id, position)
    }

    /// All entries whose stored position lies inside `region`.
    pub fn query(&self, region: &Region<D>) -> Vec<T> {
        let mut result = Vec::new();
        if !self.nodes[0].region.intersects(region) {
            return result;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            match node.children {
                Some(first_child) => {
                    for child in first_child..first_child + (1 << D) {
                        if self.nodes[child].region.intersects(region) {
                            stack.push(child);
                        }
                    }
                }
                None => result.extend(
                    node.entries
                        .iter()
                        .filter(|(_, position)| region.contains(position))
                        .map(|(id, _)| *id),
                ),
            }
        }

        result
    }

    fn split(&mut self, index: usize) {
        let first_child = self.nodes.len();
        let region = self.nodes[index].region;
        let depth = self.nodes[index].depth + 1;

        for child in 0..(1 << D) {
            self.nodes.push(Node::leaf(region.child(child), depth));
        }

        let entries = std::mem::take(&mut self.nodes[index].entries);
        self.nodes[index].children = Some(first_child);

        for (id, position) in entries {
            let child = first_child + region.child_index(&position);
            self.nodes[child].entries.push((id, position));
            self.locations.insert(id, child);
        }
    }

    fn out_of_bounds(position: &[f64; D]) -> TerrainError {
        let coordinate = |axis: usize| position.get(axis).copied().unwrap_or(0.0);
        TerrainError::out_of_bounds(
            "spatial tree root region",
            Point3::new(coordinate(0), coordinate(1), coordinate(2)),
        )
    }
}

impl<T: Copy + Eq + Hash> Octree<T> {
    pub fn insert_point(&mut self, id: T, position: Point3<f64>) -> Result<()> {
        self.insert(id, [position.x, position.y, position.z])
    }
}
