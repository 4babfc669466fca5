//! Vertex format produced by tesselation and consumed by the renderer.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

/// A vertex in the voxel rendering pipeline.
///
/// # Memory Layout
/// - Position: 3x i32 (12 bytes)
/// - Block Type: u32 (4 bytes)
/// - Face: u32 (4 bytes), a `BlockSide` discriminant
/// - Light: u32 (4 bytes), block light in bits 0-3, sky light in bits 4-7
///
/// Total size: 24 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// X coordinate in world space
    x: i32,
    /// Y coordinate in world space
    y: i32,
    /// Z coordinate in world space
    z: i32,
    /// Block type of the face this vertex belongs to
    block_type: u32,
    /// Which side of the block the face is on
    face: u32,
    /// Packed light of the cell the face looks into
    light: u32,
}

impl Vertex {
    /// Creates a new vertex.
    pub fn new(pos: Point3<i32>, block_type: u8, face: BlockSide, light: u8) -> Self {
        Vertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            block_type: block_type as u32,
            face: face as u32,
            light: light as u32,
        }
    }

    /// World space position.
    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Block type as stored in chunks.
    pub fn block_type(&self) -> u8 {
        self.block_type as u8
    }

    /// Packed light value.
    pub fn light(&self) -> u8 {
        self.light as u8
    }

    /// The `BlockSide` discriminant of the face.
    pub fn face(&self) -> u32 {
        self.face
    }
}
