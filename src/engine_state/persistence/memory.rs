use std::io;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use log::debug;
use lru::LruCache;

use crate::engine_state::voxels::chunk::ChunkCoord;

use super::ChunkPersistence;

/// Bounded in-memory save store. When full, the least recently saved or
/// loaded chunk is forgotten.
pub struct InMemoryPersistence {
    saved: Mutex<LruCache<ChunkCoord, Vec<u8>>>,
}

impl InMemoryPersistence {
    /// Creates a store holding at most `capacity` chunks (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        InMemoryPersistence {
            saved: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of chunks currently held.
    pub fn len(&self) -> usize {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is saved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkPersistence for InMemoryPersistence {
    fn save(&self, coord: ChunkCoord, data: &[u8]) -> io::Result<()> {
        let mut saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((evicted, _)) = saved.push(coord, data.to_vec()) {
            if evicted != coord {
                debug!("save cache full, dropped chunk ({}, {})", evicted.x, evicted.y);
            }
        }
        Ok(())
    }

    fn load(&self, coord: ChunkCoord) -> io::Result<Option<Vec<u8>>> {
        let mut saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(saved.get(&coord).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point2;

    #[test]
    fn save_then_load() {
        let store = InMemoryPersistence::new(4);
        assert!(store.is_empty());
        assert_eq!(store.load(Point2::new(0, 0)).unwrap(), None);

        store.save(Point2::new(0, 0), &[1, 2, 3]).unwrap();
        store.save(Point2::new(0, 0), &[4]).unwrap();
        assert_eq!(store.load(Point2::new(0, 0)).unwrap(), Some(vec![4]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let store = InMemoryPersistence::new(2);
        store.save(Point2::new(0, 0), &[0]).unwrap();
        store.save(Point2::new(1, 0), &[1]).unwrap();
        // Touch (0, 0) so (1, 0) becomes the eviction candidate.
        store.load(Point2::new(0, 0)).unwrap();
        store.save(Point2::new(2, 0), &[2]).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.load(Point2::new(1, 0)).unwrap(), None);
        assert_eq!(store.load(Point2::new(0, 0)).unwrap(), Some(vec![0]));
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let store = InMemoryPersistence::new(0);
        store.save(Point2::new(5, 5), &[9]).unwrap();
        assert_eq!(store.load(Point2::new(5, 5)).unwrap(), Some(vec![9]));
    }
}
