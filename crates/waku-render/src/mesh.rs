// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Vertex layout consumed by the pipeline: locations 0, 1, 2.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const fn new(pos: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Self {
        Self { pos, color, uv }
    }

    pub fn key(&self) -> VertexKey {
        VertexKey::from(self)
    }
}

/// Dedup key for a [`Vertex`].
///
/// Two keys are equal iff every component has the same bit pattern, so
/// `0.0` and `-0.0` are distinct and a NaN matches the identical NaN.
/// This is an equivalence relation, unlike float `==`.
///
/// The hash feeds the eight component bit patterns to the hasher in field
/// order: position xyz, color rgb, uv. Equal keys always hash equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexKey {
    bits: [u32; 8],
}

impl From<&Vertex> for VertexKey {
    fn from(v: &Vertex) -> Self {
        let [px, py, pz] = v.pos;
        let [r, g, b] = v.color;
        let [u, w] = v.uv;
        Self {
            bits: [px, py, pz, r, g, b, u, w].map(f32::to_bits),
        }
    }
}

impl Hash for VertexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.bits {
            state.write_u32(b);
        }
    }
}

/// Indexed triangle mesh with no repeated vertex.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Build from vertices in face traversal order. Each input vertex
    /// contributes exactly one index; the vertex list keeps first
    /// occurrences only.
    pub fn from_face_vertices<I>(face_vertices: I) -> Self
    where
        I: IntoIterator<Item = Vertex>,
    {
        let iter = face_vertices.into_iter();
        let mut seen: HashMap<VertexKey, u32> = HashMap::with_capacity(iter.size_hint().0);
        let mut mesh = MeshData::default();

        for v in iter {
            let idx = *seen.entry(v.key()).or_insert_with(|| {
                mesh.vertices.push(v);
                (mesh.vertices.len() - 1) as u32
            });
            mesh.indices.push(idx);
        }
        mesh
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
