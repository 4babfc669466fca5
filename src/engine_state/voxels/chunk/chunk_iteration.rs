//! # Chunk Iteration Module
//!
//! An iterator over all non-air blocks in a chunk.
//!
//! ## Sub-Chunk Aware Iteration
//!
//! The `ChunkBlockIterator` walks the chunk one sub-chunk at a time:
//! 1. Missing sub-chunks are skipped entirely
//! 2. Sub-chunks that are all air are skipped after a single scan
//! 3. Air blocks inside a populated sub-chunk are skipped
//!
//! Tesselation and the save codec only care about populated slabs, so most
//! of a chunk's height (the sky above the terrain) costs one check per slab.

use cgmath::Point3;

use crate::engine_state::voxels::block::{block_type::BlockType, Block};

use super::{ChunkVoxels, CHUNK_DEPTH, CHUNK_WIDTH, SUB_CHUNKS_PER_CHUNK, SUB_CHUNK_HEIGHT};

/// An iterator over all non-air blocks in a chunk, yielding chunk-local
/// positions.
pub struct ChunkBlockIterator<'a> {
    /// The voxels being iterated over
    voxels: &'a ChunkVoxels,
    /// Index of the current sub-chunk
    sub_chunk_index: usize,
    /// Current X position within the sub-chunk
    local_x: usize,
    /// Current Y position within the sub-chunk
    local_y: usize,
    /// Current Z position within the sub-chunk
    local_z: usize,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates an iterator positioned before the first block.
    pub fn new(voxels: &'a ChunkVoxels) -> Self {
        let mut iterator = ChunkBlockIterator {
            voxels,
            sub_chunk_index: 0,
            local_x: 0,
            local_y: 0,
            local_z: 0,
        };
        iterator.skip_unpopulated();
        iterator
    }

    /// Advances `sub_chunk_index` past missing and all-air sub-chunks.
    fn skip_unpopulated(&mut self) {
        while self.sub_chunk_index < SUB_CHUNKS_PER_CHUNK {
            match self.voxels.sub_chunk(self.sub_chunk_index) {
                Some(sub_chunk) if !sub_chunk.is_empty() => return,
                _ => self.sub_chunk_index += 1,
            }
        }
    }

    /// Moves to the next position, crossing into the next populated
    /// sub-chunk when the current one is exhausted.
    fn advance(&mut self) {
        self.local_x += 1;
        if self.local_x == CHUNK_WIDTH {
            self.local_x = 0;
            self.local_z += 1;
            if self.local_z == CHUNK_DEPTH {
                self.local_z = 0;
                self.local_y += 1;
                if self.local_y == SUB_CHUNK_HEIGHT {
                    self.local_y = 0;
                    self.sub_chunk_index += 1;
                    self.skip_unpopulated();
                }
            }
        }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = (Point3<usize>, Block);

    fn next(&mut self) -> Option<Self::Item> {
        while self.sub_chunk_index < SUB_CHUNKS_PER_CHUNK {
            let sub_chunk = self.voxels.sub_chunk(self.sub_chunk_index)?;
            let block = sub_chunk.block(self.local_x, self.local_y, self.local_z);
            let position = Point3::new(
                self.local_x,
                self.sub_chunk_index * SUB_CHUNK_HEIGHT + self.local_y,
                self.local_z,
            );
            self.advance();

            if block.kind() != BlockType::AIR {
                return Some((position, block));
            }
        }
        None
    }
}

impl ChunkVoxels {
    /// Iterates over every non-air block with its chunk-local position.
    pub fn iter_blocks(&self) -> ChunkBlockIterator<'_> {
        ChunkBlockIterator::new(self)
    }
}
