//! # Rendering Hand-off
//!
//! The worker never touches GPU resources. Tesselation writes a [`ChunkMesh`]
//! (plain vertex and index vectors) into the chunk's mesh slot; the renderer
//! takes it on the main thread and uploads [`ChunkMesh::vertex_bytes`] and
//! [`ChunkMesh::index_bytes`] however it likes.

mod tesselator;
mod vertex;

pub use tesselator::{tesselate, NeighbourView};
pub use vertex::Vertex;

/// Vertices emitted for one visible block face.
pub const VERTICES_PER_FACE: usize = 4;
/// Indices emitted for one visible block face (two triangles).
pub const INDICES_PER_FACE: usize = 6;

/// CPU-side mesh for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkMesh {
    /// Four vertices per visible face.
    pub vertices: Vec<Vertex>,
    /// Six indices per visible face, into `vertices`.
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Empties the mesh, keeping its allocations for reuse.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Whether the mesh has no faces.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of faces in the mesh.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_FACE
    }

    /// Raw vertex data, ready for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index data, ready for upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
