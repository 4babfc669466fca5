#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Chunk Worker
//!
//! Background chunk processing for a voxel world: terrain and decoration
//! generation, lighting, tesselation and persistence run on a dedicated
//! thread so the main loop never stalls on voxel work.
//!
//! ## Key Modules
//!
//! * `core` - Concurrency primitives shared by the main thread and the worker
//! * `engine_state` - Chunk data, the job queue and worker, meshing and persistence
//! * `config` - JSON-loadable worker settings
//! * `error` - The job error taxonomy
//!
//! ## Usage
//!
//! ```rust
//! // Native demo entry point
//! fn main() {
//!     chunk_worker::run();
//! }
//! ```
//!
//! ## Data Ownership
//!
//! * The [`ChunkStore`](engine_state::voxels::chunk_store::ChunkStore) owns
//!   all chunk memory; the worker borrows a chunk for one job at a time
//! * The main thread reads a chunk only after its status says it is ready
//! * Finished meshes wait in the chunk's mesh slot until the renderer takes them

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use cgmath::{Point2, Point3};
use log::{error, info, warn};
use web_time::Instant;

use config::WorkerConfig;
use engine_state::persistence::InMemoryPersistence;
use engine_state::task_management::{ChunkCommand, ChunkJob, ChunkThreadWorker, JobKind};
use engine_state::voxels::block::block_type::BlockType;
use engine_state::voxels::chunk::{chunk_origin, ChunkCoord, ChunkStatus};
use engine_state::voxels::chunk_store::ChunkStore;

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

/// Chunks generated around the origin by the demo, in each direction.
const DEMO_RADIUS: i32 = 2;

/// Longest the demo waits for a single job before giving up.
const DEMO_JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the demo: generates the chunks around the origin, edits a block and
/// saves the center chunk. The first argument, if present, is a JSON config
/// file.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    if let Err(e) = run_demo() {
        error!("Demo failed: {e}");
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => WorkerConfig::from_json_file(path)?,
        None => WorkerConfig::default(),
    };
    let store = Arc::new(ChunkStore::new(config.chunk_capacity));
    let persistence = Arc::new(InMemoryPersistence::new(config.save_cache_capacity));
    let worker = ChunkThreadWorker::new(config, store.clone(), persistence.clone())?;

    let origin: ChunkCoord = Point2::new(0, 0);
    worker.set_player_pos_chunk_coords(origin);

    let start = Instant::now();
    let mut expected = Vec::new();
    for z in -DEMO_RADIUS..=DEMO_RADIUS {
        for x in -DEMO_RADIUS..=DEMO_RADIUS {
            let coord = Point2::new(x, z);
            worker.queue_command(ChunkJob::new(coord, origin, ChunkCommand::GenerateTerrain))?;
            expected.push(coord);
        }
    }
    worker.begin_work(true);

    while !expected
        .iter()
        .all(|c| store.get_chunk(*c).is_some_and(|chunk| chunk.is_ready()))
    {
        if worker.wait_for_outcome(DEMO_JOB_TIMEOUT).is_none() {
            warn!("Timed out waiting for chunk jobs");
            break;
        }
    }
    let faces: usize = expected
        .iter()
        .filter_map(|c| store.get_chunk(*c)?.take_mesh())
        .map(|mesh| mesh.face_count())
        .sum();
    info!(
        "Generated {} chunks ({faces} faces) in {:?}, pool {:?}",
        expected.len(),
        start.elapsed(),
        store.pool_stats()
    );

    // Put a light on the surface of the center chunk.
    let center = store
        .get_chunk(origin)
        .ok_or("center chunk was not generated")?;
    let surface = center
        .try_read_voxels()
        .and_then(|voxels| voxels.highest_opaque(8, 8))
        .ok_or("center chunk has no surface")?;
    let lamp = chunk_origin(origin) + cgmath::Vector3::new(8, surface as i32 + 1, 8);
    store.set_block(lamp, BlockType::GLOWSTONE)?;
    worker.queue_command(ChunkJob::new(
        origin,
        origin,
        ChunkCommand::RecalculateLighting {
            block_that_updated: lamp,
            removed_light_source: false,
        },
    ))?;
    worker.queue_command(ChunkJob::new(origin, origin, ChunkCommand::SaveBlockData))?;
    worker.begin_work(false);

    while let Some(outcome) = worker.wait_for_outcome(DEMO_JOB_TIMEOUT) {
        if outcome.kind() == JobKind::TesselateVertices && outcome.coord() == origin {
            break;
        }
    }
    let beside = store.get_block(Point3::new(lamp.x + 1, lamp.y, lamp.z));
    info!(
        "Lamp at ({}, {}, {}), light beside it: {:?}, center chunk {:?}",
        lamp.x,
        lamp.y,
        lamp.z,
        beside.map(|b| b.block_light()),
        store.get_chunk(origin).map(|c| c.status()).unwrap_or(ChunkStatus::Unloaded)
    );
    info!("Saved chunks: {}", persistence.len());

    worker.free();
    Ok(())
}
