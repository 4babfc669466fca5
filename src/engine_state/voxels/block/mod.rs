//! # Block Module
//!
//! Block type definitions, block faces, and the packed per-voxel record
//! stored in sub-chunks.

use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;

/// Represents a single voxel block in the world.
///
/// # Memory Layout
/// `#[repr(C)]` plus `Pod` lets sub-chunk arrays be written to save data as
/// raw bytes. The light byte holds block light in the low nibble and sky
/// light in the high nibble.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq, Eq, Default)]
pub struct Block {
    /// The type of this block, encoded as a `BlockTypeSize` for compact storage.
    pub block_type: BlockTypeSize,
    /// Packed light levels.
    pub light: u8,
}

impl Block {
    /// An unlit air block.
    pub const AIR: Block = Block {
        block_type: BlockType::AIR as BlockTypeSize,
        light: 0,
    };

    /// Creates a new, unlit block of the specified type.
    pub fn new(block_type: BlockType) -> Self {
        Block {
            block_type: block_type as BlockTypeSize,
            light: 0,
        }
    }

    /// The block's type. Unknown values read as air.
    pub fn kind(&self) -> BlockType {
        BlockType::from_int(self.block_type).unwrap_or(BlockType::AIR)
    }

    /// Light contributed by emitters.
    pub fn block_light(&self) -> u8 {
        self.light & 0x0F
    }

    /// Light contributed by the sky.
    pub fn sky_light(&self) -> u8 {
        self.light >> 4
    }

    /// Sets the block light nibble.
    pub fn set_block_light(&mut self, level: u8) {
        self.light = (self.light & 0xF0) | (level & 0x0F);
    }

    /// Sets the sky light nibble.
    pub fn set_sky_light(&mut self, level: u8) {
        self.light = (self.light & 0x0F) | ((level & 0x0F) << 4);
    }

    /// The brighter of the two light channels.
    pub fn combined_light(&self) -> u8 {
        self.block_light().max(self.sky_light())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_nibbles_are_independent() {
        let mut block = Block::new(BlockType::AIR);
        block.set_block_light(9);
        block.set_sky_light(15);
        assert_eq!(block.block_light(), 9);
        assert_eq!(block.sky_light(), 15);

        block.set_block_light(0);
        assert_eq!(block.sky_light(), 15);
        assert_eq!(block.combined_light(), 15);
    }

    #[test]
    fn unknown_type_reads_as_air() {
        let block = Block {
            block_type: 250,
            light: 0,
        };
        assert_eq!(block.kind(), BlockType::AIR);
    }
}
