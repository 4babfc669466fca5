//! # Decoration Generation
//!
//! Second generation pass: trees on grass. Placement is driven by a
//! `fastrand::Rng` seeded from the world seed and the chunk coordinate, so a
//! chunk always plans the same trees.
//!
//! A tree near the chunk border spills leaves into neighbouring chunks. The
//! planner reports which chunks a tree touches; the caller only places it
//! when all of them already have terrain, and skips it otherwise.

use cgmath::Point3;

use crate::config::DecorationConfig;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{
    chunk_origin, world_to_chunk_coord, ChunkCoord, ChunkVoxels, CHUNK_DEPTH, CHUNK_HEIGHT,
    CHUNK_WIDTH,
};

/// Horizontal reach of a canopy from its trunk.
pub const CANOPY_RADIUS: i32 = 2;

/// A planned tree, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePlan {
    /// The grass block the trunk grows from.
    pub base: Point3<i32>,
    /// Number of wood blocks in the trunk.
    pub trunk_height: i32,
}

impl TreePlan {
    /// Every block of the tree with its type. The trunk comes first.
    pub fn blocks(&self) -> Vec<(Point3<i32>, BlockType)> {
        let mut blocks = Vec::new();
        let trunk_top = self.base.y + self.trunk_height;

        for y in self.base.y + 1..=trunk_top {
            blocks.push((Point3::new(self.base.x, y, self.base.z), BlockType::WOOD));
        }

        for y in trunk_top - 1..=trunk_top + 1 {
            let radius = if y <= trunk_top { CANOPY_RADIUS } else { 1 };
            for dz in -radius..=radius {
                for dx in -radius..=radius {
                    let corner = dx.abs() == radius && dz.abs() == radius;
                    let trunk = dx == 0 && dz == 0 && y <= trunk_top;
                    if (corner && radius == CANOPY_RADIUS) || trunk {
                        continue;
                    }
                    blocks.push((
                        Point3::new(self.base.x + dx, y, self.base.z + dz),
                        BlockType::LEAVES,
                    ));
                }
            }
        }
        blocks
    }

    /// Chunks other than `home` that the canopy reaches into.
    pub fn neighbour_chunks(&self, home: ChunkCoord) -> Vec<ChunkCoord> {
        let mut chunks = Vec::new();
        for dz in [-CANOPY_RADIUS, 0, CANOPY_RADIUS] {
            for dx in [-CANOPY_RADIUS, 0, CANOPY_RADIUS] {
                let coord = world_to_chunk_coord(Point3::new(
                    self.base.x + dx,
                    self.base.y,
                    self.base.z + dz,
                ));
                if coord != home && !chunks.contains(&coord) {
                    chunks.push(coord);
                }
            }
        }
        chunks
    }
}

/// Plans surface features for chunks.
pub struct DecorationGenerator {
    seed: u32,
    config: DecorationConfig,
}

impl DecorationGenerator {
    /// Creates a planner for a world seed.
    pub fn new(seed: u32, config: DecorationConfig) -> Self {
        DecorationGenerator { seed, config }
    }

    fn rng_for(&self, coord: ChunkCoord) -> fastrand::Rng {
        let x = coord.x as u32 as u64;
        let z = coord.y as u32 as u64;
        let mixed = (self.seed as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ x.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            ^ z.wrapping_mul(0x1656_67B1_9E37_79F9);
        fastrand::Rng::with_seed(mixed)
    }

    /// Plans the trees for a chunk from its terrain.
    ///
    /// Every column draws from the RNG whether or not it can hold a tree, so
    /// the plan for one column does not depend on its neighbours' terrain.
    pub fn plan_trees(&self, coord: ChunkCoord, voxels: &ChunkVoxels) -> Vec<TreePlan> {
        let mut rng = self.rng_for(coord);
        let origin = chunk_origin(coord);
        let min_trunk = self.config.min_trunk_height.max(1);
        let max_trunk = self.config.max_trunk_height.max(min_trunk);
        let mut trees: Vec<TreePlan> = Vec::new();

        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let roll = rng.f64();
                let trunk_height = rng.i32(min_trunk..=max_trunk);
                if roll >= self.config.tree_density {
                    continue;
                }
                let Some(surface) = voxels.highest_opaque(x, z) else {
                    continue;
                };
                if voxels.block_type(x, surface, z) != BlockType::GRASS {
                    continue;
                }
                if surface as i32 + trunk_height + 2 >= CHUNK_HEIGHT as i32 {
                    continue;
                }

                let base = Point3::new(origin.x + x as i32, surface as i32, origin.z + z as i32);
                let crowded = trees.iter().any(|tree| {
                    (tree.base.x - base.x).abs() <= CANOPY_RADIUS
                        && (tree.base.z - base.z).abs() <= CANOPY_RADIUS
                });
                if !crowded {
                    trees.push(TreePlan { base, trunk_height });
                }
            }
        }
        trees
    }
}
