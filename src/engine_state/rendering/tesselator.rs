//! # Tesselation
//!
//! Converts a chunk's voxels into a [`ChunkMesh`] with one quad per visible
//! face. Culling runs against a padded opacity mask: the chunk plus a one
//! block border on every side. The horizontal border is filled from the four
//! neighbouring chunks when they are generated, so faces hidden by a
//! neighbour's blocks are not emitted. Missing neighbours leave their border
//! transparent and the edge faces are kept.

use bitvec::vec::BitVec;
use cgmath::{Point3, Vector3};
use log::trace;

use crate::engine_state::voxels::block::{block_side::BlockSide, Block, BlockTypeSize};
use crate::engine_state::voxels::chunk::{
    chunk_origin, ChunkCoord, ChunkVoxels, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH,
};

use super::{ChunkMesh, Vertex};

const PADDED_WIDTH: usize = CHUNK_WIDTH + 2;
const PADDED_DEPTH: usize = CHUNK_DEPTH + 2;
const PADDED_HEIGHT: usize = CHUNK_HEIGHT + 2;
const PADDED_SIZE: usize = PADDED_WIDTH * PADDED_DEPTH * PADDED_HEIGHT;

/// Light used for faces looking out of the top of the world.
const OPEN_SKY_LIGHT: u8 = 0xF0;

/// Index into the padded mask. Every coordinate may be one past the chunk.
fn padded_index(x: i32, y: i32, z: i32) -> usize {
    (x + 1) as usize + PADDED_WIDTH * ((z + 1) as usize + PADDED_DEPTH * (y + 1) as usize)
}

/// A chunk together with whichever of its four horizontal neighbours are
/// available for border lookups.
pub struct NeighbourView<'a> {
    center: &'a ChunkVoxels,
    /// Ordered -x, +x, -z, +z.
    sides: [Option<&'a ChunkVoxels>; 4],
}

impl<'a> NeighbourView<'a> {
    /// Chunk-grid offsets of the neighbours, in the order `new` expects them.
    pub const NEIGHBOUR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

    /// A view with neighbours. Neighbours that are not fully allocated are
    /// ignored.
    pub fn new(center: &'a ChunkVoxels, sides: [Option<&'a ChunkVoxels>; 4]) -> Self {
        NeighbourView {
            center,
            sides: sides.map(|side| side.filter(|voxels| voxels.is_allocated())),
        }
    }

    /// A view of a chunk with no neighbours.
    pub fn isolated(center: &'a ChunkVoxels) -> Self {
        NeighbourView {
            center,
            sides: [None; 4],
        }
    }

    /// Reads a block relative to the center chunk. Coordinates one block
    /// past a horizontal edge read from the matching neighbour.
    pub fn block(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        if y < 0 || y >= CHUNK_HEIGHT as i32 {
            return None;
        }
        let width = CHUNK_WIDTH as i32;
        let depth = CHUNK_DEPTH as i32;
        let inside_x = (0..width).contains(&x);
        let inside_z = (0..depth).contains(&z);

        let (source, local_x, local_z) = if inside_x && inside_z {
            (Some(self.center), x, z)
        } else if x == -1 && inside_z {
            (self.sides[0], width - 1, z)
        } else if x == width && inside_z {
            (self.sides[1], 0, z)
        } else if z == -1 && inside_x {
            (self.sides[2], x, depth - 1)
        } else if z == depth && inside_x {
            (self.sides[3], x, 0)
        } else {
            (None, 0, 0)
        };
        source?.block(local_x as usize, y as usize, local_z as usize)
    }

    /// Builds the padded opacity mask. The layer below the world counts as
    /// opaque so the underside of the bottom layer is never drawn.
    fn opacity_mask(&self) -> BitVec {
        let mut mask = BitVec::repeat(false, PADDED_SIZE);
        let width = CHUNK_WIDTH as i32;
        let depth = CHUNK_DEPTH as i32;

        for z in -1..=depth {
            for x in -1..=width {
                mask.set(padded_index(x, -1, z), true);
            }
        }
        for y in 0..CHUNK_HEIGHT as i32 {
            for z in -1..=depth {
                for x in -1..=width {
                    if let Some(block) = self.block(x, y, z) {
                        if block.kind().is_opaque() {
                            mask.set(padded_index(x, y, z), true);
                        }
                    }
                }
            }
        }
        mask
    }
}

fn push_face(
    mesh: &mut ChunkMesh,
    position: Point3<i32>,
    block_type: BlockTypeSize,
    side: BlockSide,
    light: u8,
) {
    let base = mesh.vertices.len() as u32;
    for corner in side.corners() {
        mesh.vertices
            .push(Vertex::new(position + corner, block_type, side, light));
    }
    mesh.indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

/// Tesselates the center chunk of `view` into `mesh`.
///
/// The mesh is cleared first and its allocations reused. Vertex positions
/// are in world space.
pub fn tesselate(coord: ChunkCoord, view: &NeighbourView<'_>, mesh: &mut ChunkMesh) {
    mesh.clear();
    let mask = view.opacity_mask();
    let origin = chunk_origin(coord);

    for (local, block) in view.center.iter_blocks() {
        if !block.kind().is_visible() {
            continue;
        }
        let (x, y, z) = (local.x as i32, local.y as i32, local.z as i32);
        let world = origin + Vector3::new(x, y, z);

        for side in BlockSide::all() {
            let offset = side.offset();
            let (nx, ny, nz) = (x + offset.x, y + offset.y, z + offset.z);
            if mask[padded_index(nx, ny, nz)] {
                continue;
            }
            let neighbour = view.block(nx, ny, nz);
            // Faces between two transparent blocks of the same type are hidden.
            if neighbour.is_some_and(|n| n.block_type == block.block_type) {
                continue;
            }
            let light = match neighbour {
                Some(n) => n.light,
                None if ny >= CHUNK_HEIGHT as i32 => OPEN_SKY_LIGHT,
                None => block.light,
            };
            push_face(mesh, world, block.block_type, side, light);
        }
    }

    trace!(
        "tesselated chunk ({}, {}) into {} faces",
        coord.x,
        coord.y,
        mesh.face_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::{INDICES_PER_FACE, VERTICES_PER_FACE};
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::{SubChunk, SUB_CHUNKS_PER_CHUNK};
    use cgmath::Point2;

    fn allocated() -> ChunkVoxels {
        let mut voxels = ChunkVoxels::new();
        voxels.install_sub_chunks(
            (0..SUB_CHUNKS_PER_CHUNK)
                .map(|_| Box::new(SubChunk::new()))
                .collect(),
        );
        voxels
    }

    #[test]
    fn single_block_has_six_faces() {
        let mut voxels = allocated();
        voxels.set_block_type(4, 10, 4, BlockType::STONE);
        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(1, 2), &NeighbourView::isolated(&voxels), &mut mesh);

        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertices.len(), 6 * VERTICES_PER_FACE);
        assert_eq!(mesh.indices.len(), 6 * INDICES_PER_FACE);
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.block_type() == BlockType::STONE as u8));
        // World space: chunk (1, 2) starts at x = 16, z = 32.
        assert!(mesh.vertices.iter().any(|v| v.position() == Point3::new(20, 10, 36)));
        assert!(mesh.vertices.iter().any(|v| v.position() == Point3::new(21, 11, 37)));
        assert_eq!(mesh.vertex_bytes().len(), mesh.vertices.len() * 24);
    }

    #[test]
    fn shared_faces_are_culled() {
        let mut voxels = allocated();
        voxels.set_block_type(4, 10, 4, BlockType::STONE);
        voxels.set_block_type(5, 10, 4, BlockType::STONE);
        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&voxels), &mut mesh);
        assert_eq!(mesh.face_count(), 10);
    }

    #[test]
    fn bottom_of_world_is_not_drawn() {
        let mut voxels = allocated();
        voxels.set_block_type(0, 0, 0, BlockType::BEDROCK);
        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&voxels), &mut mesh);
        assert_eq!(mesh.face_count(), 5);
    }

    #[test]
    fn neighbours_hide_border_faces() {
        let mut center = allocated();
        center.set_block_type(15, 10, 8, BlockType::STONE);
        let mut east = allocated();
        east.set_block_type(0, 10, 8, BlockType::STONE);

        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&center), &mut mesh);
        assert_eq!(mesh.face_count(), 6);

        let view = NeighbourView::new(&center, [None, Some(&east), None, None]);
        tesselate(Point2::new(0, 0), &view, &mut mesh);
        assert_eq!(mesh.face_count(), 5);
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.face() != BlockSide::RIGHT as u32));
    }

    #[test]
    fn unallocated_neighbours_are_ignored() {
        let mut center = allocated();
        center.set_block_type(0, 10, 0, BlockType::STONE);
        let empty = ChunkVoxels::new();
        let view = NeighbourView::new(&center, [Some(&empty), None, Some(&empty), None]);
        assert_eq!(view.block(-1, 10, 0), None);

        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &view, &mut mesh);
        assert_eq!(mesh.face_count(), 6);
    }

    #[test]
    fn water_does_not_draw_internal_faces() {
        let mut voxels = allocated();
        voxels.set_block_type(3, 20, 3, BlockType::WATER);
        voxels.set_block_type(4, 20, 3, BlockType::WATER);
        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&voxels), &mut mesh);
        assert_eq!(mesh.face_count(), 10);
    }

    #[test]
    fn faces_carry_the_light_they_look_into() {
        let mut voxels = allocated();
        voxels.set_block_type(8, 30, 8, BlockType::STONE);
        if let Some(above) = voxels.block_mut(8, 31, 8) {
            above.set_sky_light(12);
        }
        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&voxels), &mut mesh);
        let top: Vec<_> = mesh
            .vertices
            .iter()
            .filter(|v| v.face() == BlockSide::TOP as u32)
            .collect();
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|v| v.light() == 12 << 4));
    }

    #[test]
    fn retesselation_reuses_the_mesh() {
        let mut voxels = allocated();
        voxels.set_block_type(1, 1, 1, BlockType::DIRT);
        let mut mesh = ChunkMesh::default();
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&voxels), &mut mesh);
        voxels.set_block_type(1, 1, 1, BlockType::AIR);
        tesselate(Point2::new(0, 0), &NeighbourView::isolated(&voxels), &mut mesh);
        assert!(mesh.is_empty());
        assert!(mesh.indices.is_empty());
    }
}
