//! # Block Type Module
//!
//! The kinds of blocks the generator, lighting and tesselation passes know about.

use num_derive::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The `FromPrimitive` derive allows conversion from the compact
/// `BlockTypeSize` stored in chunks and in save data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space.
    AIR,
    /// Bulk underground block.
    STONE,
    /// Layer between stone and the surface.
    DIRT,
    /// Surface block above sea level.
    GRASS,
    /// Surface block near and below sea level.
    SAND,
    /// Fills air up to sea level. Lets light through.
    WATER,
    /// Bottom layer of every column.
    BEDROCK,
    /// Tree trunk.
    WOOD,
    /// Tree canopy. Lets light through.
    LEAVES,
    /// Full-strength light source.
    GLOWSTONE,
    /// Small light source that does not block light.
    TORCH,
}

/// Highest light level a block or the sky can provide.
pub const MAX_LIGHT_LEVEL: u8 = 15;

impl BlockType {
    /// Converts a stored `BlockTypeSize` back to a `BlockType`.
    ///
    /// # Returns
    /// `None` when the value does not name a block type, e.g. in corrupt save data.
    pub fn from_int(btype: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u8(btype)
    }

    /// Whether the block hides the faces of its neighbours and stops light.
    pub fn is_opaque(self) -> bool {
        !matches!(
            self,
            BlockType::AIR | BlockType::WATER | BlockType::LEAVES | BlockType::TORCH
        )
    }

    /// Whether light can pass through the block.
    pub fn is_transparent(self) -> bool {
        !self.is_opaque()
    }

    /// Whether the block produces any geometry.
    pub fn is_visible(self) -> bool {
        self != BlockType::AIR
    }

    /// Block light emitted by this block.
    pub fn light_emission(self) -> u8 {
        match self {
            BlockType::GLOWSTONE => MAX_LIGHT_LEVEL,
            BlockType::TORCH => 14,
            _ => 0,
        }
    }
}
