//! # Sub-Chunk Pool
//!
//! Bounded, thread-safe pool of [`SubChunk`] slabs. The pool never hands out
//! more than `capacity` slabs at once; asking for another is reported as
//! [`ChunkJobError::ResourceExhausted`]. Released slabs are cleared and kept
//! for reuse.

use std::sync::{Mutex, PoisonError};

use log::trace;

use crate::{engine_state::voxels::chunk::SubChunk, error::ChunkJobError};

struct PoolState {
    free: Vec<Box<SubChunk>>,
    outstanding: usize,
}

/// Thread-safe pool for reusing sub-chunk memory.
pub struct SubChunkPool {
    state: Mutex<PoolState>,
    capacity: usize,
}

/// Utilization snapshot of a [`SubChunkPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of slabs that can be outstanding.
    pub capacity: usize,
    /// Slabs currently attached to chunks.
    pub in_use: usize,
    /// Released slabs waiting for reuse.
    pub available: usize,
}

impl SubChunkPool {
    /// Creates an empty pool that will hand out at most `capacity` slabs.
    pub fn new(capacity: usize) -> Self {
        SubChunkPool {
            state: Mutex::new(PoolState {
                free: Vec::new(),
                outstanding: 0,
            }),
            capacity,
        }
    }

    /// Takes one slab, reusing a released one when possible.
    pub fn allocate(&self) -> Result<Box<SubChunk>, ChunkJobError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.outstanding >= self.capacity {
            return Err(ChunkJobError::ResourceExhausted {
                capacity: self.capacity,
            });
        }
        state.outstanding += 1;
        Ok(state.free.pop().unwrap_or_default())
    }

    /// Takes `count` slabs or none at all.
    pub fn allocate_many(&self, count: usize) -> Result<Vec<Box<SubChunk>>, ChunkJobError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.outstanding + count > self.capacity {
            trace!(
                "Sub-chunk pool cannot satisfy {} slabs ({} of {} in use)",
                count,
                state.outstanding,
                self.capacity
            );
            return Err(ChunkJobError::ResourceExhausted {
                capacity: self.capacity,
            });
        }
        state.outstanding += count;
        Ok((0..count)
            .map(|_| state.free.pop().unwrap_or_default())
            .collect())
    }

    /// Returns a slab to the pool.
    pub fn release(&self, mut sub_chunk: Box<SubChunk>) {
        sub_chunk.clear();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.outstanding = state.outstanding.saturating_sub(1);
        state.free.push(sub_chunk);
    }

    /// Returns several slabs to the pool.
    pub fn release_many(&self, sub_chunks: Vec<Box<SubChunk>>) {
        for sub_chunk in sub_chunks {
            self.release(sub_chunk);
        }
    }

    /// Current utilization.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        PoolStats {
            capacity: self.capacity,
            in_use: state.outstanding,
            available: state.free.len(),
        }
    }
}
