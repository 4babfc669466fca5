//! # Worker Configuration
//!
//! Tunables for the chunk worker, loadable from JSON. Every field has a
//! default so a partial document (or `{}`) is a valid configuration.
//!
//! ```
//! use chunk_worker::config::WorkerConfig;
//!
//! let config = WorkerConfig::from_json_str(r#"{ "seed": 7, "chunk_capacity": 16 }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.terrain.sea_level, 62);
//! ```

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_state::voxels::chunk::SUB_CHUNKS_PER_CHUNK;

/// Failure to load a [`WorkerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    /// The document is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top level configuration for [`crate::engine_state::task_management::ChunkThreadWorker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// World seed fed to every noise generator and decoration RNG.
    pub seed: u32,
    /// Maximum number of resident chunks.
    pub chunk_capacity: usize,
    /// Emit the next pipeline stage after each successful job.
    pub chain_follow_ups: bool,
    /// Name given to the background thread.
    pub thread_name: String,
    /// Entries kept by the in-memory save cache.
    pub save_cache_capacity: usize,
    /// Undrained job outcomes held before new ones are dropped.
    pub outcome_capacity: usize,
    /// Terrain shaping.
    pub terrain: TerrainConfig,
    /// Surface features.
    pub decorations: DecorationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            seed: 0,
            chunk_capacity: 64,
            chain_follow_ups: true,
            thread_name: "chunk-worker".to_string(),
            save_cache_capacity: 256,
            outcome_capacity: 4096,
            terrain: TerrainConfig::default(),
            decorations: DecorationConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Number of sub-chunk slots the pool is allowed to hand out.
    pub fn sub_chunk_capacity(&self) -> usize {
        self.chunk_capacity * SUB_CHUNKS_PER_CHUNK
    }
}

/// Height field and cave parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Average surface height in blocks.
    pub base_height: i32,
    /// Maximum deviation of the surface from `base_height`.
    pub height_variation: f64,
    /// Water fills air up to this height.
    pub sea_level: i32,
    /// Thickness of the dirt layer under the surface block.
    pub dirt_depth: i32,
    /// Horizontal frequency of the height field.
    pub frequency: f64,
    /// fBm octaves for the height field.
    pub octaves: usize,
    /// Cave noise above this value carves air.
    pub cave_threshold: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig {
            base_height: 64,
            height_variation: 24.0,
            sea_level: 62,
            dirt_depth: 3,
            frequency: 0.008,
            octaves: 4,
            cave_threshold: 0.55,
        }
    }
}

/// Tree placement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    /// Probability that a grass column grows a tree.
    pub tree_density: f64,
    /// Shortest trunk.
    pub min_trunk_height: i32,
    /// Tallest trunk.
    pub max_trunk_height: i32,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        DecorationConfig {
            tree_density: 0.01,
            min_trunk_height: 4,
            max_trunk_height: 6,
        }
    }
}
