//! Per-chunk pipeline stage, published by the worker and polled by the main
//! thread. This is the completion signal for jobs: the worker stores the new
//! stage with release ordering after its writes, the main thread loads it with
//! acquire ordering before reading voxel data or taking the mesh.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use num_derive::FromPrimitive;

/// How far a chunk has progressed through the generation pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum ChunkStatus {
    /// No voxel data.
    Unloaded,
    /// Terrain generation or a client load is running.
    Generating,
    /// Terrain is present, no surface features yet.
    TerrainGenerated,
    /// Surface features are present.
    Decorated,
    /// Light values are valid.
    Lit,
    /// A mesh matching the voxel data is waiting in the mesh slot (or was taken).
    Ready,
}

/// Atomic storage for a [`ChunkStatus`] plus the worker's "being processed" flag.
#[derive(Debug)]
pub struct ChunkStatusCell {
    status: AtomicU8,
    in_flight: AtomicBool,
}

impl ChunkStatusCell {
    /// A cell for a chunk with no data.
    pub fn new() -> Self {
        ChunkStatusCell {
            status: AtomicU8::new(ChunkStatus::Unloaded as u8),
            in_flight: AtomicBool::new(false),
        }
    }

    /// The last published stage.
    pub fn load(&self) -> ChunkStatus {
        num::FromPrimitive::from_u8(self.status.load(Ordering::Acquire))
            .unwrap_or(ChunkStatus::Unloaded)
    }

    /// Publishes a new stage.
    pub fn store(&self, status: ChunkStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Lowers the stage to `status` if it is currently past it. Used when an
    /// edit invalidates later stages.
    pub fn regress_to(&self, status: ChunkStatus) {
        let _ = self
            .status
            .fetch_min(status as u8, Ordering::AcqRel);
    }

    /// Whether a job is currently touching this chunk.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims the chunk for exclusive processing. The worker holds the claim
    /// for a whole job; the main thread holds it for the length of an edit or
    /// an unload.
    ///
    /// # Returns
    /// `false` if someone else already holds the claim.
    pub fn try_begin_processing(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the claim taken by [`ChunkStatusCell::try_begin_processing`].
    pub fn end_processing(&self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

impl Default for ChunkStatusCell {
    fn default() -> Self {
        Self::new()
    }
}
