use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::trace;

use crate::engine_state::voxels::chunk::ChunkCoord;

use super::ChunkPersistence;

/// Stores each chunk in its own file under a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// reader never sees a half-written chunk.
pub struct FilePersistence {
    directory: PathBuf,
}

impl FilePersistence {
    /// Opens a save directory, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(FilePersistence { directory })
    }

    /// The save directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding a chunk.
    pub fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.directory
            .join(format!("chunk_{}_{}.bin", coord.x, coord.y))
    }
}

impl ChunkPersistence for FilePersistence {
    fn save(&self, coord: ChunkCoord, data: &[u8]) -> io::Result<()> {
        let path = self.chunk_path(coord);
        let temporary = path.with_extension("tmp");
        fs::write(&temporary, data)?;
        fs::rename(&temporary, &path)?;
        trace!("wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn load(&self, coord: ChunkCoord) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.chunk_path(coord)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
