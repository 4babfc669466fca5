//! # Player Position Cell
//!
//! A lock-free cell holding the chunk the player currently stands in. The main
//! thread writes it whenever the player crosses a chunk border; the job queue
//! reads it on every priority comparison.
//!
//! The two `i32` components are packed into a single `AtomicU64` so a reader
//! can never observe the x of one update paired with the z of another. Every
//! store also bumps an epoch counter, so a reader can tell that the player
//! moved even when it came back to the same chunk.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cgmath::Point2;

use crate::engine_state::voxels::chunk::ChunkCoord;

/// Shared, atomically updated player chunk coordinate.
///
/// Starts out unset; until the first [`PlayerPositionCell::store`] the job queue
/// falls back to the position snapshot carried by each job.
#[derive(Debug, Default)]
pub struct PlayerPositionCell {
    packed: AtomicU64,
    known: AtomicBool,
    epoch: AtomicU64,
}

impl PlayerPositionCell {
    /// Creates an unset cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cell that already holds `coord`.
    pub fn with_position(coord: ChunkCoord) -> Self {
        let cell = Self::new();
        cell.store(coord);
        cell
    }

    /// Publishes a new player chunk coordinate. O(1), never blocks.
    pub fn store(&self, coord: ChunkCoord) {
        self.packed.store(pack(coord), Ordering::Release);
        self.known.store(true, Ordering::Release);
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of stores so far. Changes on every store, including one that
    /// repeats the current coordinate.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Reads the most recently published coordinate, if any.
    pub fn load(&self) -> Option<ChunkCoord> {
        if self.known.load(Ordering::Acquire) {
            Some(unpack(self.packed.load(Ordering::Acquire)))
        } else {
            None
        }
    }
}

fn pack(coord: ChunkCoord) -> u64 {
    ((coord.x as u32 as u64) << 32) | (coord.y as u32 as u64)
}

fn unpack(packed: u64) -> ChunkCoord {
    Point2::new((packed >> 32) as u32 as i32, packed as u32 as i32)
}
