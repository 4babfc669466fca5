//! # Chunk Module
//!
//! A chunk is a 16x256x16 column of voxels addressed by a 2D chunk coordinate.
//! Its voxel data is split into 16 vertically stacked [`SubChunk`]s that are
//! borrowed from the store's pool while the chunk is resident.
//!
//! ## Ownership
//!
//! The [`ChunkStore`](crate::engine_state::voxels::chunk_store::ChunkStore)
//! owns every [`ChunkHandle`]. The worker takes the write lock on a chunk's
//! voxels for the duration of one job and drops it before the next, so it never
//! keeps a reference past the job that needed it. The main thread decides when
//! the data is safe to read from [`ChunkHandle::status`] and
//! [`ChunkHandle::is_ready`], never by inspecting the voxels themselves.

use std::sync::{Mutex, PoisonError, RwLockReadGuard};

use cgmath::{Point2, Point3};

use crate::core::MtResource;
use crate::engine_state::rendering::ChunkMesh;

use super::block::{block_type::BlockType, Block};

pub mod chunk_iteration;
pub mod chunk_status;
pub mod sub_chunk;

pub use chunk_status::{ChunkStatus, ChunkStatusCell};
pub use sub_chunk::SubChunk;

/// Chunk grid coordinate. `x` is the chunk's x, `y` is the chunk's z.
pub type ChunkCoord = Point2<i32>;

/// Blocks along the x axis of a chunk.
pub const CHUNK_WIDTH: usize = 16;
/// Blocks along the z axis of a chunk.
pub const CHUNK_DEPTH: usize = 16;
/// Blocks along the y axis of a sub-chunk.
pub const SUB_CHUNK_HEIGHT: usize = 16;
/// Sub-chunks stacked in one chunk.
pub const SUB_CHUNKS_PER_CHUNK: usize = 16;
/// Blocks along the y axis of a chunk.
pub const CHUNK_HEIGHT: usize = SUB_CHUNK_HEIGHT * SUB_CHUNKS_PER_CHUNK;

/// Returns the coordinate of the chunk containing a world block position.
pub fn world_to_chunk_coord(position: Point3<i32>) -> ChunkCoord {
    Point2::new(
        position.x.div_euclid(CHUNK_WIDTH as i32),
        position.z.div_euclid(CHUNK_DEPTH as i32),
    )
}

/// Converts a world block position to chunk-local coordinates.
///
/// # Returns
/// `None` when the height is outside the chunk.
pub fn world_to_local(position: Point3<i32>) -> Option<Point3<usize>> {
    if position.y < 0 || position.y >= CHUNK_HEIGHT as i32 {
        return None;
    }
    Some(Point3::new(
        position.x.rem_euclid(CHUNK_WIDTH as i32) as usize,
        position.y as usize,
        position.z.rem_euclid(CHUNK_DEPTH as i32) as usize,
    ))
}

/// Largest chunk coordinate magnitude whose blocks, and the reach of a tree
/// canopy past them, still have `i32` world positions.
pub const CHUNK_COORD_LIMIT: i32 = i32::MAX / CHUNK_WIDTH as i32 - 1;

/// Whether a chunk lies inside the addressable world.
pub fn is_valid_chunk_coord(coord: ChunkCoord) -> bool {
    let range = -CHUNK_COORD_LIMIT..=CHUNK_COORD_LIMIT;
    range.contains(&coord.x) && range.contains(&coord.y)
}

/// World position of the chunk's (0, 0, 0) block. Saturates for chunks
/// outside [`is_valid_chunk_coord`].
pub fn chunk_origin(coord: ChunkCoord) -> Point3<i32> {
    Point3::new(
        coord.x.saturating_mul(CHUNK_WIDTH as i32),
        0,
        coord.y.saturating_mul(CHUNK_DEPTH as i32),
    )
}

/// Squared distance between two chunk coordinates, in chunk units.
pub fn chunk_distance_squared(a: ChunkCoord, b: ChunkCoord) -> i64 {
    let dx = a.x as i64 - b.x as i64;
    let dz = a.y as i64 - b.y as i64;
    dx * dx + dz * dz
}

/// The voxel data of one chunk: a stack of optional sub-chunks.
///
/// A chunk is "generated" once every slot holds a sub-chunk; reads from an
/// empty slot yield `None` instead of touching unallocated memory.
pub struct ChunkVoxels {
    sub_chunks: Vec<Option<Box<SubChunk>>>,
}

impl ChunkVoxels {
    /// Voxel data with no sub-chunks attached.
    pub fn new() -> Self {
        ChunkVoxels {
            sub_chunks: (0..SUB_CHUNKS_PER_CHUNK).map(|_| None).collect(),
        }
    }

    /// Whether every sub-chunk slot is filled.
    pub fn is_allocated(&self) -> bool {
        self.sub_chunks.iter().all(Option::is_some)
    }

    /// Number of filled sub-chunk slots.
    pub fn allocated_count(&self) -> usize {
        self.sub_chunks.iter().filter(|slot| slot.is_some()).count()
    }

    /// Fills empty slots from `sub_chunks`, bottom up. Returns whatever was
    /// not needed.
    pub fn install_sub_chunks(&mut self, sub_chunks: Vec<Box<SubChunk>>) -> Vec<Box<SubChunk>> {
        let mut incoming = sub_chunks.into_iter();
        for slot in self.sub_chunks.iter_mut().filter(|slot| slot.is_none()) {
            match incoming.next() {
                Some(sub_chunk) => *slot = Some(sub_chunk),
                None => break,
            }
        }
        incoming.collect()
    }

    /// Detaches every sub-chunk, leaving the chunk unallocated.
    pub fn take_sub_chunks(&mut self) -> Vec<Box<SubChunk>> {
        self.sub_chunks.iter_mut().filter_map(Option::take).collect()
    }

    /// The sub-chunk at a vertical index, if attached.
    pub fn sub_chunk(&self, index: usize) -> Option<&SubChunk> {
        self.sub_chunks.get(index).and_then(|slot| slot.as_deref())
    }

    /// Mutable access to the sub-chunk at a vertical index, if attached.
    pub fn sub_chunk_mut(&mut self, index: usize) -> Option<&mut SubChunk> {
        self.sub_chunks.get_mut(index).and_then(|slot| slot.as_deref_mut())
    }

    /// Resets every attached sub-chunk to unlit air.
    pub fn clear(&mut self) {
        for sub_chunk in self.sub_chunks.iter_mut().flatten() {
            sub_chunk.clear();
        }
    }

    /// Reads a block at chunk-local coordinates.
    ///
    /// # Returns
    /// `None` if the coordinates are outside the chunk or the sub-chunk is missing.
    pub fn block(&self, x: usize, y: usize, z: usize) -> Option<Block> {
        if x >= CHUNK_WIDTH || z >= CHUNK_DEPTH || y >= CHUNK_HEIGHT {
            return None;
        }
        self.sub_chunk(y / SUB_CHUNK_HEIGHT)
            .map(|sub_chunk| sub_chunk.block(x, y % SUB_CHUNK_HEIGHT, z))
    }

    /// Mutable access to a block at chunk-local coordinates.
    pub fn block_mut(&mut self, x: usize, y: usize, z: usize) -> Option<&mut Block> {
        if x >= CHUNK_WIDTH || z >= CHUNK_DEPTH || y >= CHUNK_HEIGHT {
            return None;
        }
        self.sub_chunk_mut(y / SUB_CHUNK_HEIGHT)
            .map(|sub_chunk| sub_chunk.block_mut(x, y % SUB_CHUNK_HEIGHT, z))
    }

    /// The block type at chunk-local coordinates, air when missing.
    pub fn block_type(&self, x: usize, y: usize, z: usize) -> BlockType {
        self.block(x, y, z)
            .map(|block| block.kind())
            .unwrap_or(BlockType::AIR)
    }

    /// Changes the type of a block, keeping its light values.
    ///
    /// # Returns
    /// `false` if the block could not be addressed.
    pub fn set_block_type(&mut self, x: usize, y: usize, z: usize, block_type: BlockType) -> bool {
        match self.block_mut(x, y, z) {
            Some(block) => {
                block.block_type = block_type as u8;
                true
            }
            None => false,
        }
    }

    /// Height of the topmost opaque block in a column, if any.
    pub fn highest_opaque(&self, x: usize, z: usize) -> Option<usize> {
        (0..CHUNK_HEIGHT)
            .rev()
            .find(|&y| self.block_type(x, y, z).is_opaque())
    }
}

impl Default for ChunkVoxels {
    fn default() -> Self {
        Self::new()
    }
}

/// A resident chunk as seen by both threads.
pub struct ChunkHandle {
    coord: ChunkCoord,
    status: ChunkStatusCell,
    voxels: MtResource<ChunkVoxels>,
    mesh: Mutex<Option<ChunkMesh>>,
}

impl ChunkHandle {
    /// Creates an unloaded chunk with no voxel data.
    pub fn new(coord: ChunkCoord) -> Self {
        ChunkHandle {
            coord,
            status: ChunkStatusCell::new(),
            voxels: MtResource::new(ChunkVoxels::new()),
            mesh: Mutex::new(None),
        }
    }

    /// The chunk's grid coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The last stage published by the worker.
    pub fn status(&self) -> ChunkStatus {
        self.status.load()
    }

    /// The status cell, for the worker and the store.
    pub fn status_cell(&self) -> &ChunkStatusCell {
        &self.status
    }

    /// Whether the chunk is fully processed and no job is touching it.
    pub fn is_ready(&self) -> bool {
        !self.status.is_in_flight() && self.status.load() == ChunkStatus::Ready
    }

    /// Shared voxel storage. Blocking access is meant for the worker.
    pub fn voxels(&self) -> &MtResource<ChunkVoxels> {
        &self.voxels
    }

    /// Non-blocking read access for the main thread.
    ///
    /// # Returns
    /// `None` while a job holds the write lock.
    pub fn try_read_voxels(&self) -> Option<RwLockReadGuard<'_, ChunkVoxels>> {
        self.voxels.try_get()
    }

    /// Takes the mesh produced by the latest tesselation, leaving the slot empty.
    pub fn take_mesh(&self) -> Option<ChunkMesh> {
        self.mesh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether a mesh is waiting to be taken.
    pub fn has_mesh(&self) -> bool {
        self.mesh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replaces the mesh in the slot.
    pub fn store_mesh(&self, mesh: ChunkMesh) {
        *self.mesh.lock().unwrap_or_else(PoisonError::into_inner) = Some(mesh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_positions_map_to_chunks() {
        assert_eq!(world_to_chunk_coord(Point3::new(0, 10, 0)), Point2::new(0, 0));
        assert_eq!(world_to_chunk_coord(Point3::new(15, 0, 16)), Point2::new(0, 1));
        assert_eq!(world_to_chunk_coord(Point3::new(-1, 0, -17)), Point2::new(-1, -2));
        assert_eq!(
            world_to_local(Point3::new(-1, 70, -17)),
            Some(Point3::new(15, 70, 15))
        );
        assert_eq!(world_to_local(Point3::new(0, -1, 0)), None);
        assert_eq!(world_to_local(Point3::new(0, CHUNK_HEIGHT as i32, 0)), None);
    }

    #[test]
    fn distance_is_squared_euclidean() {
        assert_eq!(chunk_distance_squared(Point2::new(0, 0), Point2::new(5, 5)), 50);
        assert_eq!(chunk_distance_squared(Point2::new(-2, 1), Point2::new(1, -3)), 25);
    }

    #[test]
    fn reads_from_missing_sub_chunks_are_none() {
        let mut voxels = ChunkVoxels::new();
        assert_eq!(voxels.block(0, 0, 0), None);
        assert!(!voxels.set_block_type(0, 0, 0, BlockType::STONE));

        let leftover = voxels.install_sub_chunks(vec![Box::new(SubChunk::new())]);
        assert!(leftover.is_empty());
        assert_eq!(voxels.allocated_count(), 1);
        assert!(voxels.set_block_type(1, 2, 3, BlockType::STONE));
        assert_eq!(voxels.block_type(1, 2, 3), BlockType::STONE);
        assert_eq!(voxels.block(0, SUB_CHUNK_HEIGHT, 0), None);
    }

    #[test]
    fn install_returns_surplus() {
        let mut voxels = ChunkVoxels::new();
        let surplus = voxels.install_sub_chunks(
            (0..SUB_CHUNKS_PER_CHUNK + 2)
                .map(|_| Box::new(SubChunk::new()))
                .collect(),
        );
        assert!(voxels.is_allocated());
        assert_eq!(surplus.len(), 2);
        assert_eq!(voxels.take_sub_chunks().len(), SUB_CHUNKS_PER_CHUNK);
        assert_eq!(voxels.allocated_count(), 0);
    }

    #[test]
    fn far_chunks_are_out_of_range() {
        assert!(is_valid_chunk_coord(Point2::new(CHUNK_COORD_LIMIT, -CHUNK_COORD_LIMIT)));
        assert!(!is_valid_chunk_coord(Point2::new(i32::MAX, 0)));
        assert!(!is_valid_chunk_coord(Point2::new(0, i32::MIN)));
        assert_eq!(chunk_origin(Point2::new(i32::MAX, -2)), Point3::new(i32::MAX, 0, -32));

        let edge = chunk_origin(Point2::new(CHUNK_COORD_LIMIT, 0));
        assert!(edge.x.checked_add(CHUNK_WIDTH as i32 + 8).is_some());
    }

    #[test]
    fn handle_is_ready_only_when_idle_and_meshed() {
        let handle = ChunkHandle::new(Point2::new(0, 0));
        assert!(!handle.is_ready());
        handle.status_cell().store(ChunkStatus::Ready);
        assert!(handle.is_ready());
        assert!(handle.status_cell().try_begin_processing());
        assert!(!handle.is_ready());
        handle.status_cell().end_processing();

        assert!(handle.take_mesh().is_none());
        handle.store_mesh(ChunkMesh::default());
        assert!(handle.has_mesh());
        assert!(handle.take_mesh().is_some());
        assert!(!handle.has_mesh());
    }
}
