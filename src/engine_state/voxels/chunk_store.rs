//! # Chunk Store Module
//!
//! The `ChunkStore` owns every resident chunk and the pool their sub-chunks
//! come from. Both the main thread and the chunk worker hold an `Arc` to it.
//!
//! ## Architecture
//!
//! Chunks live in a sparse map keyed by chunk coordinate, capped at
//! `chunk_capacity` entries. Voxel memory is not allocated when a chunk is
//! created: terrain generation or a client load borrows sub-chunks from the
//! [`SubChunkPool`], whose capacity is `chunk_capacity * SUB_CHUNKS_PER_CHUNK`.
//!
//! ## Thread Safety
//!
//! - The map is guarded by its own lock, held only for lookups and inserts
//! - Each chunk's voxels are guarded separately, so a job on one chunk never
//!   blocks lookups of another
//! - Main-thread block access is non-blocking and fails while a job is
//!   writing the chunk
//! - Edits and unloads take the chunk's processing claim, the same one a
//!   job holds, so they never interleave with a job on that chunk

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Point3;
use log::debug;

use crate::core::MtResource;
use crate::engine_state::voxels::block::{block_type::BlockType, Block};
use crate::engine_state::voxels::chunk::{
    world_to_chunk_coord, world_to_local, ChunkCoord, ChunkHandle, ChunkStatus,
    SUB_CHUNKS_PER_CHUNK,
};
use crate::engine_state::voxels::sub_chunk_pool::{PoolStats, SubChunkPool};
use crate::error::ChunkJobError;

/// Owner of all resident chunks.
///
/// # Examples
///
/// ```
/// use cgmath::Point2;
/// use chunk_worker::engine_state::voxels::chunk_store::ChunkStore;
///
/// let store = ChunkStore::new(4);
/// let chunk = store.get_or_create_chunk(Point2::new(0, 0)).unwrap();
/// assert_eq!(chunk.coord(), Point2::new(0, 0));
/// assert!(store.get_chunk(Point2::new(1, 0)).is_none());
/// ```
pub struct ChunkStore {
    chunks: MtResource<HashMap<ChunkCoord, Arc<ChunkHandle>>>,
    pool: SubChunkPool,
    chunk_capacity: usize,
}

impl ChunkStore {
    /// Creates an empty store holding at most `chunk_capacity` chunks.
    pub fn new(chunk_capacity: usize) -> Self {
        ChunkStore {
            chunks: MtResource::new(HashMap::with_capacity(chunk_capacity)),
            pool: SubChunkPool::new(chunk_capacity * SUB_CHUNKS_PER_CHUNK),
            chunk_capacity,
        }
    }

    /// Creates a store whose sub-chunk pool is smaller than the chunk table.
    ///
    /// Useful when many chunks are tracked but only a few may hold voxel data.
    pub fn with_pool_capacity(chunk_capacity: usize, sub_chunk_capacity: usize) -> Self {
        ChunkStore {
            chunks: MtResource::new(HashMap::with_capacity(chunk_capacity)),
            pool: SubChunkPool::new(sub_chunk_capacity),
            chunk_capacity,
        }
    }

    /// Looks up a resident chunk.
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<Arc<ChunkHandle>> {
        self.chunks.get().get(&coord).cloned()
    }

    /// Looks up a chunk, creating an unloaded one if it is not resident.
    pub fn get_or_create_chunk(&self, coord: ChunkCoord) -> Result<Arc<ChunkHandle>, ChunkJobError> {
        if let Some(chunk) = self.get_chunk(coord) {
            return Ok(chunk);
        }

        let mut chunks = self.chunks.get_mut();
        if let Some(chunk) = chunks.get(&coord) {
            return Ok(chunk.clone());
        }
        if chunks.len() >= self.chunk_capacity {
            return Err(ChunkJobError::ResourceExhausted {
                capacity: self.chunk_capacity,
            });
        }
        let chunk = Arc::new(ChunkHandle::new(coord));
        chunks.insert(coord, chunk.clone());
        Ok(chunk)
    }

    /// Removes a chunk and returns its sub-chunks to the pool.
    ///
    /// The chunk is claimed for the duration of the unload, so a job can
    /// never start filling a handle that is being dropped from the table.
    ///
    /// # Returns
    /// `false` if the chunk is not resident or a job is currently using it.
    pub fn unload_chunk(&self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.get_chunk(coord) else {
            return false;
        };
        if !chunk.status_cell().try_begin_processing() {
            return false;
        }
        let unloaded = match chunk.voxels().try_get_mut() {
            Some(mut voxels) => {
                self.pool.release_many(voxels.take_sub_chunks());
                chunk.status_cell().store(ChunkStatus::Unloaded);
                true
            }
            None => false,
        };
        if unloaded {
            self.chunks.get_mut().remove(&coord);
            debug!("Unloaded chunk ({}, {})", coord.x, coord.y);
        }
        chunk.status_cell().end_processing();
        unloaded
    }

    /// Whether `chunk` is the handle currently stored for its coordinate.
    /// A handle looked up before an unload stays alive but is no longer
    /// resident.
    pub fn is_resident(&self, chunk: &ChunkHandle) -> bool {
        self.chunks
            .get()
            .get(&chunk.coord())
            .is_some_and(|resident| std::ptr::eq(resident.as_ref(), chunk))
    }

    /// Reads the block at a world position.
    ///
    /// # Returns
    /// `None` if the chunk is not resident, has no data at that height, or is
    /// being written by a job.
    pub fn get_block(&self, position: Point3<i32>) -> Option<Block> {
        let chunk = self.get_chunk(world_to_chunk_coord(position))?;
        let local = world_to_local(position)?;
        let voxels = chunk.try_read_voxels()?;
        voxels.block(local.x, local.y, local.z)
    }

    /// Changes the block type at a world position, keeping its light values.
    ///
    /// Lighting and the mesh become stale: the chunk is moved back to
    /// [`ChunkStatus::Decorated`] until a lighting job runs. Fails while a
    /// job holds the chunk, since the job would publish a later stage over
    /// the edit.
    pub fn set_block(&self, position: Point3<i32>, block_type: BlockType) -> Result<(), ChunkJobError> {
        let coord = world_to_chunk_coord(position);
        let chunk = self.get_chunk(coord).ok_or(ChunkJobError::MissingDependency {
            coord,
            reason: "chunk not resident",
        })?;
        let local = world_to_local(position)
            .ok_or_else(|| ChunkJobError::CorruptJob(format!("height {} out of range", position.y)))?;
        let busy = ChunkJobError::MissingDependency {
            coord,
            reason: "chunk is being processed",
        };
        if !chunk.status_cell().try_begin_processing() {
            return Err(busy);
        }

        let result = match chunk.voxels().try_get_mut() {
            None => Err(busy),
            Some(mut voxels) => {
                if voxels.set_block_type(local.x, local.y, local.z, block_type) {
                    chunk.status_cell().regress_to(ChunkStatus::Decorated);
                    Ok(())
                } else {
                    Err(ChunkJobError::MissingDependency {
                        coord,
                        reason: "terrain not generated",
                    })
                }
            }
        };
        chunk.status_cell().end_processing();
        result
    }

    /// Coordinates of every resident chunk.
    pub fn loaded_chunks(&self) -> Vec<ChunkCoord> {
        self.chunks.get().keys().copied().collect()
    }

    /// Maximum number of resident chunks.
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// The pool sub-chunks are borrowed from.
    pub fn pool(&self) -> &SubChunkPool {
        &self.pool
    }

    /// Sub-chunk pool utilization.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
