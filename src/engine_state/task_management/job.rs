//! # Chunk Jobs
//!
//! A job is one unit of chunk work: a target chunk, the player position when
//! it was submitted, and a [`ChunkCommand`] carrying exactly the data its
//! handler needs.

use std::fmt;

use cgmath::Point3;

use crate::engine_state::voxels::chunk::ChunkCoord;

/// The kind of a job. Declaration order is the tie-break order of the job
/// queue: earlier kinds run first among jobs at equal distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobKind {
    SaveBlockData,
    ClientLoadChunk,
    GenerateTerrain,
    GenerateDecorations,
    CalculateLighting,
    RecalculateLighting,
    TesselateVertices,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What to do with the target chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkCommand {
    /// Encode the chunk and hand it to the persistence backend.
    SaveBlockData,
    /// Fill the chunk from encoded data, e.g. received from a server.
    ClientLoadChunk {
        /// Bytes produced by [`encode_chunk`](crate::engine_state::persistence::encode_chunk).
        data: Vec<u8>,
    },
    /// Fill the chunk with generated terrain.
    GenerateTerrain,
    /// Add trees and other surface features.
    GenerateDecorations,
    /// Compute sky and block light for the whole chunk.
    CalculateLighting,
    /// Update light after a single block changed.
    RecalculateLighting {
        /// World position of the block that changed.
        block_that_updated: Point3<i32>,
        /// Whether the block that was there emitted light.
        removed_light_source: bool,
    },
    /// Rebuild the chunk's mesh.
    TesselateVertices,
}

impl ChunkCommand {
    /// The kind of this command.
    pub fn kind(&self) -> JobKind {
        match self {
            ChunkCommand::SaveBlockData => JobKind::SaveBlockData,
            ChunkCommand::ClientLoadChunk { .. } => JobKind::ClientLoadChunk,
            ChunkCommand::GenerateTerrain => JobKind::GenerateTerrain,
            ChunkCommand::GenerateDecorations => JobKind::GenerateDecorations,
            ChunkCommand::CalculateLighting => JobKind::CalculateLighting,
            ChunkCommand::RecalculateLighting { .. } => JobKind::RecalculateLighting,
            ChunkCommand::TesselateVertices => JobKind::TesselateVertices,
        }
    }
}

/// A queued unit of chunk work. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkJob {
    /// The chunk the job works on.
    pub coord: ChunkCoord,
    /// Where the player was when the job was created. Only used for ranking
    /// while the live player position is unknown.
    pub player_pos_snapshot: ChunkCoord,
    /// The work to do.
    pub command: ChunkCommand,
}

impl ChunkJob {
    /// Creates a job.
    pub fn new(coord: ChunkCoord, player_pos_snapshot: ChunkCoord, command: ChunkCommand) -> Self {
        ChunkJob {
            coord,
            player_pos_snapshot,
            command,
        }
    }

    /// The kind of the job's command.
    pub fn kind(&self) -> JobKind {
        self.command.kind()
    }

    /// A job for the same chunk and snapshot running `command`.
    pub fn follow_up(&self, command: ChunkCommand) -> Self {
        ChunkJob::new(self.coord, self.player_pos_snapshot, command)
    }

    /// A job for another chunk, keeping this job's snapshot.
    pub fn for_chunk(&self, coord: ChunkCoord, command: ChunkCommand) -> Self {
        ChunkJob::new(coord, self.player_pos_snapshot, command)
    }
}
