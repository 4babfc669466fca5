//! # Chunk Generation
//!
//! Pluggable, deterministic generators used by the worker's terrain and
//! decoration jobs. The worker owns one instance of each; nothing here keeps
//! global state.

pub mod decorations;
pub mod terrain;

pub use decorations::{DecorationGenerator, TreePlan};
pub use terrain::TerrainGenerator;
