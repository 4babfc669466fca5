use crate::engine_state::voxels::chunk::ChunkCoord;
use crate::error::ChunkJobError;

use super::job::JobKind;

/// What happened to a job the worker took off the queue.
///
/// Reported in execution order through
/// [`ChunkThreadWorker::poll_outcomes`](super::ChunkThreadWorker::poll_outcomes).
#[derive(Debug)]
pub enum JobOutcome {
    /// The handler finished and its results are published on the chunk.
    Completed { kind: JobKind, coord: ChunkCoord },
    /// The handler failed; the job was dropped.
    Failed {
        kind: JobKind,
        coord: ChunkCoord,
        error: ChunkJobError,
    },
}

impl JobOutcome {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOutcome::Completed { kind, .. } | JobOutcome::Failed { kind, .. } => *kind,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        match self {
            JobOutcome::Completed { coord, .. } | JobOutcome::Failed { coord, .. } => *coord,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    /// The failure, if the job failed.
    pub fn error(&self) -> Option<&ChunkJobError> {
        match self {
            JobOutcome::Completed { .. } => None,
            JobOutcome::Failed { error, .. } => Some(error),
        }
    }
}
