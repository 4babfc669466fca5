//! # Engine State Module
//!
//! The subsystems behind the chunk worker.
//!
//! ## Key Components
//!
//! * `voxels` - Chunk data, the chunk store, generation and lighting
//! * `rendering` - Tesselation into CPU-side meshes for the renderer
//! * `persistence` - Save and load boundary keyed by chunk coordinate
//! * `task_management` - The job queue and the background worker
//!
//! ## Architecture
//!
//! The main thread owns a [`ChunkThreadWorker`](task_management::ChunkThreadWorker)
//! and shares a [`ChunkStore`](voxels::chunk_store::ChunkStore) with it.
//! Jobs flow one way into the worker; results come back as chunk status
//! changes, meshes in the chunk's mesh slot, and
//! [`JobOutcome`](task_management::JobOutcome)s.

pub mod persistence;
pub mod rendering;
pub mod task_management;
pub mod voxels;
