//! # Voxel Data
//!
//! Everything the chunk worker reads and writes:
//!
//! * **Block**: voxel types and the packed per-voxel record
//! * **Chunk**: 16x256x16 columns split into pooled sub-chunks, plus the
//!   per-chunk status that tells the main thread when data is safe to read
//! * **Chunk Store**: the resident chunk table and its sub-chunk pool
//! * **Generation**: seeded terrain and decoration passes
//! * **Lighting**: sky and block light propagation inside a chunk
//!
//! ## Thread Safety
//!
//! * Each chunk's voxels sit behind their own lock; the worker takes it for
//!   one job at a time
//! * The main thread only uses non-blocking reads and learns when a chunk is
//!   finished from its status, never from the voxels themselves

pub mod block;
pub mod chunk;
pub mod chunk_store;
pub mod generation;
pub mod lighting;
pub mod sub_chunk_pool;
