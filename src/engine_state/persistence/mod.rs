//! # Persistence Boundary
//!
//! `SaveBlockData` and `ClientLoadChunk` jobs stop at this trait. The worker
//! only moves opaque byte buffers keyed by chunk coordinate; where they end
//! up (memory, disk, a network peer) is the backend's business.

use std::io;

use crate::engine_state::voxels::chunk::ChunkCoord;

pub mod codec;
mod file;
mod memory;

pub use codec::{decode_chunk, encode_chunk};
pub use file::FilePersistence;
pub use memory::InMemoryPersistence;

/// Byte-buffer storage keyed by chunk coordinate.
///
/// Called from the worker thread, so implementations must be thread-safe.
pub trait ChunkPersistence: Send + Sync {
    /// Stores the encoded data of a chunk, replacing any previous data.
    fn save(&self, coord: ChunkCoord, data: &[u8]) -> io::Result<()>;

    /// Loads the encoded data of a chunk.
    ///
    /// # Returns
    /// `Ok(None)` if nothing was saved for the chunk.
    fn load(&self, coord: ChunkCoord) -> io::Result<Option<Vec<u8>>>;
}
