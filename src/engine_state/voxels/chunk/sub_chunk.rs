//! # Sub-Chunk Module
//!
//! A sub-chunk is one 16x16x16 slab of a chunk's voxel column. Sub-chunks are
//! handed out by the [`SubChunkPool`](crate::engine_state::voxels::sub_chunk_pool::SubChunkPool)
//! and returned to it when their chunk is unloaded, so the memory is reused
//! rather than reallocated as the player moves.

use crate::engine_state::voxels::block::Block;

use super::{CHUNK_DEPTH, CHUNK_WIDTH, SUB_CHUNK_HEIGHT};

/// Number of blocks in one sub-chunk.
pub const SUB_CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_DEPTH * SUB_CHUNK_HEIGHT;

/// Dense block storage for a 16x16x16 slab.
///
/// Blocks are laid out x-fastest, then z, then y, which keeps a horizontal
/// layer contiguous for the column passes in terrain generation and lighting.
pub struct SubChunk {
    blocks: Box<[Block]>,
}

impl SubChunk {
    /// Creates a sub-chunk filled with unlit air.
    pub fn new() -> Self {
        SubChunk {
            blocks: vec![Block::AIR; SUB_CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        x + CHUNK_WIDTH * z + CHUNK_WIDTH * CHUNK_DEPTH * y
    }

    /// Reads the block at sub-chunk-local coordinates.
    ///
    /// # Panics
    /// Panics if a coordinate is outside the sub-chunk.
    #[inline]
    pub fn block(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[Self::index(x, y, z)]
    }

    /// Mutable access to the block at sub-chunk-local coordinates.
    #[inline]
    pub fn block_mut(&mut self, x: usize, y: usize, z: usize) -> &mut Block {
        &mut self.blocks[Self::index(x, y, z)]
    }

    /// All blocks in storage order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// All blocks in storage order, mutably.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// Resets every block to unlit air so the slab can be reused.
    pub fn clear(&mut self) {
        self.blocks.fill(Block::AIR);
    }

    /// Whether every block is air.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| block.block_type == Block::AIR.block_type)
    }
}

impl Default for SubChunk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    #[test]
    fn layers_are_contiguous() {
        let mut sub_chunk = SubChunk::new();
        *sub_chunk.block_mut(0, 1, 0) = Block::new(BlockType::STONE);
        assert_eq!(
            sub_chunk.blocks()[CHUNK_WIDTH * CHUNK_DEPTH].kind(),
            BlockType::STONE
        );
    }

    #[test]
    fn clear_resets_to_air() {
        let mut sub_chunk = SubChunk::new();
        *sub_chunk.block_mut(3, 4, 5) = Block::new(BlockType::DIRT);
        assert!(!sub_chunk.is_empty());
        sub_chunk.clear();
        assert!(sub_chunk.is_empty());
    }
}
