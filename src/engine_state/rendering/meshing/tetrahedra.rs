//! Marching tetrahedra over a block's scalar field.
//!
//! Each cube cell is split into six tetrahedra sharing the 0-7 main diagonal,
//! which splits every cube face along its low-low/high-high diagonal. Within
//! a tetrahedron the field is treated as linear, so the surface is one
//! triangle or a quad whose corners sit on the edges with a sign change.

use std::collections::HashMap;

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3, Zero};

use crate::engine_state::{
    rendering::Vertex,
    voxels::density_block::{DensityBlock, BLOCK_SIZE},
};

use super::{mesh::Mesh, seam::ScalarField};

/// Corner offsets of a cell. Bit 0 of the index is +x, bit 1 +y, bit 2 +z.
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 3, 2, 7],
    [0, 2, 6, 7],
    [0, 6, 4, 7],
    [0, 4, 5, 7],
    [0, 5, 1, 7],
];

/// Triangles with less doubled area than this are dropped.
const DEGENERATE_AREA: f32 = 1e-10;

#[derive(Clone, Copy)]
struct Corner {
    index: usize,
    position: Point3<f32>,
    value: f32,
}

pub(super) struct Contourer<'a> {
    field: &'a ScalarField,
    block: &'a DensityBlock,
    scale: f32,
    vertices: Vec<Vertex>,
    normals: Vec<Vector3<f32>>,
    indices: Vec<u32>,
    edge_vertices: HashMap<(usize, usize), u32>,
}

impl<'a> Contourer<'a> {
    pub(super) fn new(field: &'a ScalarField, block: &'a DensityBlock, scale: f32) -> Self {
        Contourer {
            field,
            block,
            scale,
            vertices: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
            edge_vertices: HashMap::new(),
        }
    }

    /// Walks every core cell and returns the welded mesh.
    pub(super) fn run(mut self) -> Mesh {
        for z in 0..BLOCK_SIZE {
            for y in 0..BLOCK_SIZE {
                for x in 0..BLOCK_SIZE {
                    self.contour_cell(x, y, z);
                }
            }
        }

        for (vertex, normal) in self.vertices.iter_mut().zip(&self.normals) {
            let normal = if normal.magnitude2() > 0.0 {
                normal.normalize()
            } else {
                Vector3::unit_y()
            };
            vertex.normal = [normal.x, normal.y, normal.z];
        }

        Mesh {
            vertices: self.vertices,
            indices: self.indices,
            collision: None,
        }
    }

    fn contour_cell(&mut self, x: usize, y: usize, z: usize) {
        let corners: [Corner; 8] = std::array::from_fn(|i| {
            let [dx, dy, dz] = CORNERS[i];
            let index = ScalarField::index(x + dx, y + dy, z + dz);
            Corner {
                index,
                position: Point3::new((x + dx) as f32, (y + dy) as f32, (z + dz) as f32),
                value: self.field.at(index),
            }
        });

        let solid = corners.iter().filter(|corner| corner.value > 0.0).count();
        if solid == 0 || solid == 8 {
            return;
        }

        for tetrahedron in TETRAHEDRA {
            let tet = tetrahedron.map(|i| corners[i]);
            self.contour_tetrahedron(&tet);
        }
    }

    fn contour_tetrahedron(&mut self, tet: &[Corner; 4]) {
        let (inside, outside): (Vec<Corner>, Vec<Corner>) =
            tet.iter().copied().partition(|corner| corner.value > 0.0);

        match (inside.as_slice(), outside.as_slice()) {
            ([a], [o0, o1, o2]) => {
                let v = [self.edge(a, o0), self.edge(a, o1), self.edge(a, o2)];
                self.triangle(v, &inside, &outside);
            }
            ([i0, i1, i2], [o]) => {
                let v = [self.edge(i0, o), self.edge(i1, o), self.edge(i2, o)];
                self.triangle(v, &inside, &outside);
            }
            ([i0, i1], [o0, o1]) => {
                let quad = [
                    self.edge(i0, o0),
                    self.edge(i0, o1),
                    self.edge(i1, o1),
                    self.edge(i1, o0),
                ];
                self.triangle([quad[0], quad[1], quad[2]], &inside, &outside);
                self.triangle([quad[0], quad[2], quad[3]], &inside, &outside);
            }
            _ => {}
        }
    }

    /// Vertex where the surface crosses the edge between a solid and an
    /// empty corner. Shared by every tetrahedron using the same edge.
    fn edge(&mut self, solid: &Corner, empty: &Corner) -> u32 {
        let key = (solid.index.min(empty.index), solid.index.max(empty.index));
        if let Some(&vertex) = self.edge_vertices.get(&key) {
            return vertex;
        }

        let t = solid.value / (solid.value - empty.value);
        let position = solid.position + (empty.position - solid.position) * t;
        let material = self.block.samples()[solid.index].material as u32;

        let vertex = self.vertices.len() as u32;
        self.vertices.push(Vertex::new(position * self.scale, material));
        self.normals.push(Vector3::zero());
        self.edge_vertices.insert(key, vertex);
        vertex
    }

    /// Emits a triangle facing from the solid corners towards the empty ones.
    fn triangle(&mut self, vertices: [u32; 3], inside: &[Corner], outside: &[Corner]) {
        let [a, b, c] = vertices.map(|v| self.vertices[v as usize].position());
        let mut normal = (b - a).cross(c - a);
        if normal.magnitude2() <= DEGENERATE_AREA {
            return;
        }

        let outward = centroid(outside) - centroid(inside);
        let mut vertices = vertices;
        if normal.dot(outward) < 0.0 {
            vertices.swap(1, 2);
            normal = -normal;
        }

        for v in vertices {
            self.normals[v as usize] += normal;
        }
        self.indices.extend_from_slice(&vertices);
    }
}

fn centroid(corners: &[Corner]) -> Point3<f32> {
    let sum = corners
        .iter()
        .fold(Vector3::zero(), |sum, corner| sum + corner.position.to_vec());
    Point3::from_vec(sum / corners.len() as f32)
}
