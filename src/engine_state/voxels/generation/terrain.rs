//! # Terrain Generation
//!
//! Deterministic height-field terrain. The output for a chunk depends only on
//! the seed, the terrain configuration and the chunk coordinate: there is no
//! shared mutable state, so regenerating a chunk reproduces it exactly.
//!
//! ## Layers (bottom to top)
//! - bedrock at y = 0
//! - stone, with OpenSimplex caves carved out of it
//! - `dirt_depth` blocks of dirt (sand on beaches)
//! - one grass block (sand on beaches) at the surface height
//! - water from the surface up to sea level

use cgmath::Point3;
use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin};

use crate::config::TerrainConfig;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::chunk::{
    chunk_origin, ChunkCoord, ChunkVoxels, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH,
};
use crate::error::ChunkJobError;

/// Scaling factor applied to world coordinates when sampling cave noise.
pub const CAVE_SCALE_FACTOR: f64 = 0.045;
/// Scaling factor applied to world coordinates when sampling surface detail.
pub const DETAIL_SCALE_FACTOR: f64 = 0.06;
/// Amplitude of surface detail in blocks.
pub const DETAIL_AMPLITUDE: f64 = 2.0;
/// Caves never open within this many blocks of bedrock.
pub const CAVE_FLOOR: i32 = 5;
/// Headroom kept above the highest possible surface.
pub const SURFACE_HEADROOM: i32 = 16;

/// The noise generators used for terrain, owned by the worker.
pub struct TerrainGenerator {
    config: TerrainConfig,
    height_noise: Fbm<Perlin>,
    detail_noise: Perlin,
    cave_noise: OpenSimplex,
}

impl TerrainGenerator {
    /// Builds the generators for a seed. Each generator gets its own derived
    /// seed so the layers are uncorrelated.
    pub fn new(seed: u32, config: TerrainConfig) -> Self {
        TerrainGenerator {
            height_noise: Fbm::<Perlin>::new(seed)
                .set_octaves(config.octaves.max(1))
                .set_frequency(config.frequency),
            detail_noise: Perlin::new(seed.wrapping_add(1)),
            cave_noise: OpenSimplex::new(seed.wrapping_add(2)),
            config,
        }
    }

    /// The terrain configuration in use.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Height of the topmost terrain block of the column at world (x, z).
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let x = world_x as f64;
        let z = world_z as f64;
        let base = self.height_noise.get([x, z]) * self.config.height_variation;
        let detail = self
            .detail_noise
            .get([x * DETAIL_SCALE_FACTOR, z * DETAIL_SCALE_FACTOR])
            * DETAIL_AMPLITUDE;
        let height = self.config.base_height as f64 + base + detail;
        (height.round() as i32).clamp(1, CHUNK_HEIGHT as i32 - SURFACE_HEADROOM)
    }

    /// Whether the cave noise carves the given world position.
    fn is_cave(&self, position: Point3<i32>) -> bool {
        let sample = self.cave_noise.get([
            position.x as f64 * CAVE_SCALE_FACTOR,
            position.y as f64 * CAVE_SCALE_FACTOR,
            position.z as f64 * CAVE_SCALE_FACTOR,
        ]);
        sample > self.config.cave_threshold
    }

    /// The block type at a height in a column whose surface is `surface`.
    pub fn block_at(&self, position: Point3<i32>, surface: i32) -> BlockType {
        let y = position.y;
        let beach = surface <= self.config.sea_level + 1;
        let dirt_top = surface - self.config.dirt_depth;

        if y == 0 {
            BlockType::BEDROCK
        } else if y < dirt_top {
            if y >= CAVE_FLOOR && y < dirt_top - 1 && self.is_cave(position) {
                BlockType::AIR
            } else {
                BlockType::STONE
            }
        } else if y < surface {
            if beach {
                BlockType::SAND
            } else {
                BlockType::DIRT
            }
        } else if y == surface {
            if beach {
                BlockType::SAND
            } else {
                BlockType::GRASS
            }
        } else if y <= self.config.sea_level {
            BlockType::WATER
        } else {
            BlockType::AIR
        }
    }

    /// Fills a chunk's voxels with terrain, replacing whatever was there.
    ///
    /// # Errors
    /// `MissingDependency` if the voxels have no sub-chunks attached.
    pub fn generate(&self, coord: ChunkCoord, voxels: &mut ChunkVoxels) -> Result<(), ChunkJobError> {
        if !voxels.is_allocated() {
            return Err(ChunkJobError::MissingDependency {
                coord,
                reason: "no sub-chunks attached",
            });
        }
        voxels.clear();

        let origin = chunk_origin(coord);
        let column_top = CHUNK_HEIGHT as i32 - 1;
        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let world_x = origin.x + x as i32;
                let world_z = origin.z + z as i32;
                let surface = self.surface_height(world_x, world_z);
                let top = surface.max(self.config.sea_level).min(column_top);

                for y in 0..=top {
                    let block_type = self.block_at(Point3::new(world_x, y, world_z), surface);
                    if block_type != BlockType::AIR {
                        voxels.set_block_type(x, y as usize, z, block_type);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::{SubChunk, SUB_CHUNKS_PER_CHUNK};
    use cgmath::Point2;

    fn allocated_voxels() -> ChunkVoxels {
        let mut voxels = ChunkVoxels::new();
        voxels.install_sub_chunks(
            (0..SUB_CHUNKS_PER_CHUNK)
                .map(|_| Box::new(SubChunk::new()))
                .collect(),
        );
        voxels
    }

    fn snapshot(voxels: &ChunkVoxels) -> Vec<u8> {
        (0..SUB_CHUNKS_PER_CHUNK)
            .flat_map(|i| voxels.sub_chunk(i).unwrap().blocks().to_vec())
            .map(|block| block.block_type)
            .collect()
    }

    #[test]
    fn generation_is_reproducible() {
        let generator = TerrainGenerator::new(1234, TerrainConfig::default());
        let mut first = allocated_voxels();
        let mut second = allocated_voxels();
        generator.generate(Point2::new(3, -7), &mut first).unwrap();
        generator.generate(Point2::new(3, -7), &mut second).unwrap();
        assert_eq!(snapshot(&first), snapshot(&second));

        // A fresh generator with the same seed agrees as well.
        let again = TerrainGenerator::new(1234, TerrainConfig::default());
        let mut third = allocated_voxels();
        again.generate(Point2::new(3, -7), &mut third).unwrap();
        assert_eq!(snapshot(&first), snapshot(&third));
    }

    #[test]
    fn regeneration_overwrites_edits() {
        let generator = TerrainGenerator::new(9, TerrainConfig::default());
        let mut voxels = allocated_voxels();
        generator.generate(Point2::new(0, 0), &mut voxels).unwrap();
        let expected = snapshot(&voxels);

        voxels.set_block_type(4, 200, 4, BlockType::GLOWSTONE);
        generator.generate(Point2::new(0, 0), &mut voxels).unwrap();
        assert_eq!(snapshot(&voxels), expected);
    }

    #[test]
    fn columns_are_layered() {
        let generator = TerrainGenerator::new(5, TerrainConfig::default());
        let mut voxels = allocated_voxels();
        generator.generate(Point2::new(1, 1), &mut voxels).unwrap();

        for x in 0..CHUNK_WIDTH {
            assert_eq!(voxels.block_type(x, 0, 0), BlockType::BEDROCK);
            let surface = generator.surface_height(16 + x as i32, 16);
            let top = voxels.block_type(x, surface as usize, 0);
            assert!(matches!(top, BlockType::GRASS | BlockType::SAND), "{top:?}");
            assert!(matches!(
                voxels.block_type(x, surface as usize + 1, 0),
                BlockType::AIR | BlockType::WATER
            ));
        }
    }

    #[test]
    fn unallocated_chunk_is_rejected() {
        let generator = TerrainGenerator::new(0, TerrainConfig::default());
        assert!(matches!(
            generator.generate(Point2::new(0, 0), &mut ChunkVoxels::new()),
            Err(ChunkJobError::MissingDependency { .. })
        ));
    }
}
