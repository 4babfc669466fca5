//! # Block Side Module
//!
//! The six faces of a voxel block, used for face culling during tesselation
//! and for neighbour walks during light propagation.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The discriminants are written into vertices, so the order is part of the
/// vertex format: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Unit offset from a block to the neighbour this face touches.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
        }
    }

    /// The four corners of this face on a unit cube, counter-clockwise when
    /// seen from outside the block.
    pub fn corners(self) -> [Vector3<i32>; 4] {
        match self {
            BlockSide::FRONT => [
                Vector3::new(0, 0, 1),
                Vector3::new(1, 0, 1),
                Vector3::new(1, 1, 1),
                Vector3::new(0, 1, 1),
            ],
            BlockSide::BACK => [
                Vector3::new(1, 0, 0),
                Vector3::new(0, 0, 0),
                Vector3::new(0, 1, 0),
                Vector3::new(1, 1, 0),
            ],
            BlockSide::BOTTOM => [
                Vector3::new(0, 0, 0),
                Vector3::new(1, 0, 0),
                Vector3::new(1, 0, 1),
                Vector3::new(0, 0, 1),
            ],
            BlockSide::TOP => [
                Vector3::new(0, 1, 1),
                Vector3::new(1, 1, 1),
                Vector3::new(1, 1, 0),
                Vector3::new(0, 1, 0),
            ],
            BlockSide::LEFT => [
                Vector3::new(0, 0, 0),
                Vector3::new(0, 0, 1),
                Vector3::new(0, 1, 1),
                Vector3::new(0, 1, 0),
            ],
            BlockSide::RIGHT => [
                Vector3::new(1, 0, 1),
                Vector3::new(1, 0, 0),
                Vector3::new(1, 1, 0),
                Vector3::new(1, 1, 1),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_lie_on_the_face_plane() {
        for side in BlockSide::all() {
            let offset = side.offset();
            for corner in side.corners() {
                // A face's corners share the coordinate along its normal axis.
                let along = corner.x * offset.x.abs() + corner.y * offset.y.abs() + corner.z * offset.z.abs();
                let expected = if offset.x + offset.y + offset.z > 0 { 1 } else { 0 };
                assert_eq!(along, expected, "{side:?}");
            }
        }
    }
}
