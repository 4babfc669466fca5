//! Error taxonomy for chunk jobs.
//!
//! No error produced while processing one chunk is allowed to stop the worker:
//! handlers return these values, the worker logs them and moves on.

use std::io;

use thiserror::Error;

use crate::engine_state::voxels::chunk::ChunkCoord;

/// Everything that can go wrong while queueing or executing a chunk job.
#[derive(Debug, Error)]
pub enum ChunkJobError {
    /// The sub-chunk pool or the chunk table is full.
    #[error("resource exhausted (capacity {capacity})")]
    ResourceExhausted {
        /// The capacity that was hit.
        capacity: usize,
    },

    /// A chunk the job depends on has not reached the required stage.
    #[error("chunk ({}, {}) is not ready: {reason}", .coord.x, .coord.y)]
    MissingDependency {
        /// The chunk that was missing or not far enough along.
        coord: ChunkCoord,
        /// What stage was required.
        reason: &'static str,
    },

    /// The job payload could not be interpreted.
    #[error("corrupt job: {0}")]
    CorruptJob(String),

    /// The worker is stopping and accepts no new jobs.
    #[error("worker is shutting down")]
    ShutdownInProgress,

    /// The persistence backend failed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] io::Error),

    /// A handler panicked. The panic was contained to the job.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),
}

impl ChunkJobError {
    /// Whether resubmitting the same job later can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChunkJobError::ResourceExhausted { .. } | ChunkJobError::MissingDependency { .. }
        )
    }
}
