use std::io;
use std::sync::Arc;
use std::time::Duration;

use cgmath::{Point2, Point3, Vector3};

use chunk_worker::config::WorkerConfig;
use chunk_worker::engine_state::persistence::{encode_chunk, ChunkPersistence, InMemoryPersistence};
use chunk_worker::engine_state::task_management::{
    ChunkCommand, ChunkJob, ChunkThreadWorker, JobKind, JobOutcome, WorkerState,
};
use chunk_worker::engine_state::voxels::block::block_type::{BlockType, MAX_LIGHT_LEVEL};
use chunk_worker::engine_state::voxels::chunk::{chunk_origin, ChunkCoord, ChunkStatus, SUB_CHUNKS_PER_CHUNK};
use chunk_worker::engine_state::voxels::chunk_store::ChunkStore;
use chunk_worker::error::ChunkJobError;

const TIMEOUT: Duration = Duration::from_secs(30);

struct Harness {
    worker: ChunkThreadWorker,
    store: Arc<ChunkStore>,
    persistence: Arc<InMemoryPersistence>,
}

fn harness(store: ChunkStore, chain_follow_ups: bool) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = WorkerConfig {
        seed: 1234,
        chunk_capacity: store.chunk_capacity(),
        chain_follow_ups,
        ..WorkerConfig::default()
    };
    let store = Arc::new(store);
    let persistence = Arc::new(InMemoryPersistence::new(16));
    let worker = ChunkThreadWorker::new(config, store.clone(), persistence.clone()).unwrap();
    Harness {
        worker,
        store,
        persistence,
    }
}

fn job(coord: ChunkCoord, command: ChunkCommand) -> ChunkJob {
    ChunkJob::new(coord, Point2::new(0, 0), command)
}

/// Collects outcomes until one matches `kind` and `coord`.
fn run_until(worker: &ChunkThreadWorker, kind: JobKind, coord: ChunkCoord) -> Vec<JobOutcome> {
    let mut seen = Vec::new();
    loop {
        let outcome = worker
            .wait_for_outcome(TIMEOUT)
            .expect("worker stalled");
        let done = outcome.kind() == kind && outcome.coord() == coord;
        seen.push(outcome);
        if done {
            return seen;
        }
    }
}

fn submit(h: &Harness, coord: ChunkCoord, command: ChunkCommand) {
    h.worker.queue_command(job(coord, command)).unwrap();
    h.worker.begin_work(false);
}

#[test]
fn closer_chunks_are_processed_first_and_light_falls_off() {
    let h = harness(ChunkStore::new(8), false);
    let near = Point2::new(0, 0);
    let far = Point2::new(5, 5);
    h.worker.set_player_pos_chunk_coords(near);

    h.worker.queue_command(job(far, ChunkCommand::GenerateTerrain)).unwrap();
    h.worker.queue_command(job(near, ChunkCommand::GenerateTerrain)).unwrap();
    h.worker.begin_work(true);

    let first = h.worker.wait_for_outcome(TIMEOUT).unwrap();
    let second = h.worker.wait_for_outcome(TIMEOUT).unwrap();
    assert_eq!(first.coord(), near);
    assert_eq!(second.coord(), far);
    assert!(first.is_completed() && second.is_completed());

    // A light source high above the terrain, in open air.
    let source = chunk_origin(near) + Vector3::new(8, 200, 8);
    h.store.set_block(source, BlockType::GLOWSTONE).unwrap();
    submit(&h, near, ChunkCommand::CalculateLighting);
    assert!(run_until(&h.worker, JobKind::CalculateLighting, near)
        .last()
        .is_some_and(JobOutcome::is_completed));

    let light_at = |d: i32| {
        h.store
            .get_block(source + Vector3::new(d, 0, 0))
            .map(|b| b.block_light())
            .unwrap()
    };
    assert_eq!(light_at(0), MAX_LIGHT_LEVEL);
    let mut previous = light_at(0);
    for d in 1..8 {
        let level = light_at(d);
        assert_eq!(level, MAX_LIGHT_LEVEL - d as u8);
        assert!(level <= previous);
        previous = level;
    }
}

#[test]
fn reprioritizes_when_the_player_moves() {
    let h = harness(ChunkStore::new(8), false);
    h.worker.set_player_pos_chunk_coords(Point2::new(0, 0));
    for x in [0, 10, 20] {
        h.worker
            .queue_command(job(Point2::new(x, 0), ChunkCommand::GenerateTerrain))
            .unwrap();
    }
    h.worker.set_player_pos_chunk_coords(Point2::new(19, 0));
    h.worker.begin_work(true);

    let order: Vec<i32> = (0..3)
        .map(|_| h.worker.wait_for_outcome(TIMEOUT).unwrap().coord().x)
        .collect();
    assert_eq!(order, vec![20, 10, 0]);
}

#[test]
fn terrain_generation_is_idempotent() {
    let h = harness(ChunkStore::new(4), false);
    let coord = Point2::new(-3, 7);

    submit(&h, coord, ChunkCommand::GenerateTerrain);
    run_until(&h.worker, JobKind::GenerateTerrain, coord);
    let chunk = h.store.get_chunk(coord).unwrap();
    let first = encode_chunk(coord, &chunk.try_read_voxels().unwrap());

    submit(&h, coord, ChunkCommand::GenerateTerrain);
    run_until(&h.worker, JobKind::GenerateTerrain, coord);
    let second = encode_chunk(coord, &chunk.try_read_voxels().unwrap());

    assert_eq!(first, second);
    assert_eq!(h.store.pool_stats().in_use, SUB_CHUNKS_PER_CHUNK);
}

#[test]
fn stop_returns_without_begin() {
    let h = harness(ChunkStore::new(4), true);
    for x in 0..3 {
        h.worker
            .queue_command(job(Point2::new(x, 0), ChunkCommand::GenerateTerrain))
            .unwrap();
    }
    h.worker.stop();

    assert_eq!(h.worker.state(), WorkerState::Stopped);
    assert_eq!(h.worker.pending_jobs(), 0);
    assert!(h.worker.poll_outcomes().is_empty());
    assert!(matches!(
        h.worker.queue_command(job(Point2::new(0, 0), ChunkCommand::GenerateTerrain)),
        Err(ChunkJobError::ShutdownInProgress)
    ));
    // Second call is a no-op.
    h.worker.free();
}

#[test]
fn stop_right_after_construction() {
    let h = harness(ChunkStore::new(1), true);
    h.worker.free();
    assert_eq!(h.worker.state(), WorkerState::Stopped);
}

#[test]
fn pool_exhaustion_is_reported() {
    let h = harness(
        ChunkStore::with_pool_capacity(8, 2 * SUB_CHUNKS_PER_CHUNK),
        false,
    );
    h.worker.set_player_pos_chunk_coords(Point2::new(0, 0));
    for x in 0..4 {
        h.worker
            .queue_command(job(Point2::new(x, 0), ChunkCommand::GenerateTerrain))
            .unwrap();
    }
    h.worker.begin_work(true);

    let outcomes: Vec<JobOutcome> = (0..4)
        .map(|_| h.worker.wait_for_outcome(TIMEOUT).unwrap())
        .collect();
    let completed: Vec<i32> = outcomes
        .iter()
        .filter(|o| o.is_completed())
        .map(|o| o.coord().x)
        .collect();
    assert_eq!(completed, vec![0, 1]);
    for outcome in outcomes.iter().filter(|o| !o.is_completed()) {
        assert!(matches!(
            outcome.error(),
            Some(ChunkJobError::ResourceExhausted { .. })
        ));
        let chunk = h.store.get_chunk(outcome.coord()).unwrap();
        assert_eq!(chunk.status(), ChunkStatus::Unloaded);
    }
    assert_eq!(h.store.pool_stats().available, 0);

    // Freeing a chunk makes room for a retry.
    assert!(h.store.unload_chunk(Point2::new(0, 0)));
    submit(&h, Point2::new(3, 0), ChunkCommand::GenerateTerrain);
    let retry = run_until(&h.worker, JobKind::GenerateTerrain, Point2::new(3, 0));
    assert!(retry.last().is_some_and(JobOutcome::is_completed));
}

#[test]
fn removing_a_light_source_returns_to_baseline() {
    let h = harness(ChunkStore::new(4), false);
    let coord = Point2::new(0, 0);
    submit(&h, coord, ChunkCommand::GenerateTerrain);
    run_until(&h.worker, JobKind::GenerateTerrain, coord);

    let source = Point3::new(4, 220, 4);
    h.store.set_block(source, BlockType::TORCH).unwrap();
    submit(&h, coord, ChunkCommand::CalculateLighting);
    run_until(&h.worker, JobKind::CalculateLighting, coord);
    let light = |p: Point3<i32>| h.store.get_block(p).map(|b| b.block_light()).unwrap();
    assert_eq!(light(source), BlockType::TORCH.light_emission());
    assert!(light(source + Vector3::new(0, 0, 3)) > 0);

    h.store.set_block(source, BlockType::AIR).unwrap();
    submit(
        &h,
        coord,
        ChunkCommand::RecalculateLighting {
            block_that_updated: source,
            removed_light_source: true,
        },
    );
    let outcomes = run_until(&h.worker, JobKind::RecalculateLighting, coord);
    assert!(outcomes.last().is_some_and(JobOutcome::is_completed));

    assert_eq!(light(source), 0);
    for d in 1..6 {
        assert_eq!(light(source + Vector3::new(d, 0, 0)), 0);
        assert_eq!(light(source + Vector3::new(0, -d, 0)), 0);
    }
}

#[test]
fn full_pipeline_publishes_a_mesh() {
    let h = harness(ChunkStore::new(4), true);
    let coord = Point2::new(2, -1);
    h.worker.set_player_pos_chunk_coords(coord);
    submit(&h, coord, ChunkCommand::GenerateTerrain);

    let outcomes = run_until(&h.worker, JobKind::TesselateVertices, coord);
    let kinds: Vec<JobKind> = outcomes.iter().map(JobOutcome::kind).collect();
    assert_eq!(
        kinds,
        vec![
            JobKind::GenerateTerrain,
            JobKind::GenerateDecorations,
            JobKind::CalculateLighting,
            JobKind::TesselateVertices,
        ]
    );

    let chunk = h.store.get_chunk(coord).unwrap();
    assert!(chunk.is_ready());
    let mesh = chunk.take_mesh().unwrap();
    assert!(!mesh.is_empty());
    assert_eq!(mesh.vertex_bytes().len(), mesh.vertices.len() * 24);
    assert_eq!(mesh.index_bytes().len(), mesh.indices.len() * 4);
    assert!(chunk.take_mesh().is_none());
}

#[test]
fn saved_chunks_load_back_identically() {
    let h = harness(ChunkStore::new(4), true);
    let coord = Point2::new(1, 1);
    h.worker.set_player_pos_chunk_coords(coord);
    submit(&h, coord, ChunkCommand::GenerateTerrain);
    run_until(&h.worker, JobKind::TesselateVertices, coord);

    submit(&h, coord, ChunkCommand::SaveBlockData);
    run_until(&h.worker, JobKind::SaveBlockData, coord);
    let data = h.persistence.load(coord).unwrap().expect("chunk was saved");

    assert!(h.store.unload_chunk(coord));
    assert_eq!(h.store.pool_stats().in_use, 0);

    submit(&h, coord, ChunkCommand::ClientLoadChunk { data: data.clone() });
    let outcomes = run_until(&h.worker, JobKind::TesselateVertices, coord);
    assert_eq!(outcomes[0].kind(), JobKind::ClientLoadChunk);
    assert!(outcomes.iter().all(JobOutcome::is_completed));

    let chunk = h.store.get_chunk(coord).unwrap();
    assert!(chunk.is_ready());
    assert_eq!(encode_chunk(coord, &chunk.try_read_voxels().unwrap()), data);
}

#[test]
fn corrupt_loads_do_not_stop_the_worker() {
    let h = harness(ChunkStore::new(4), false);
    let coord = Point2::new(0, 0);
    submit(
        &h,
        coord,
        ChunkCommand::ClientLoadChunk {
            data: vec![0xFF; 64],
        },
    );
    let failed = h.worker.wait_for_outcome(TIMEOUT).unwrap();
    assert!(matches!(failed.error(), Some(ChunkJobError::CorruptJob(_))));

    submit(&h, coord, ChunkCommand::GenerateTerrain);
    let next = h.worker.wait_for_outcome(TIMEOUT).unwrap();
    assert!(next.is_completed());
}

/// Save backend whose writes blow up inside the handler.
struct ExplodingPersistence;

impl ChunkPersistence for ExplodingPersistence {
    fn save(&self, coord: ChunkCoord, _data: &[u8]) -> io::Result<()> {
        panic!("disk controller on fire while saving ({}, {})", coord.x, coord.y);
    }

    fn load(&self, _coord: ChunkCoord) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[test]
fn panicking_handler_does_not_stop_the_worker() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = WorkerConfig {
        chunk_capacity: 4,
        chain_follow_ups: false,
        ..WorkerConfig::default()
    };
    let store = Arc::new(ChunkStore::new(config.chunk_capacity));
    let worker = ChunkThreadWorker::new(config, store.clone(), Arc::new(ExplodingPersistence)).unwrap();
    let coord = Point2::new(0, 0);

    worker.queue_command(job(coord, ChunkCommand::GenerateTerrain)).unwrap();
    worker.begin_work(false);
    assert!(worker.wait_for_outcome(TIMEOUT).unwrap().is_completed());

    worker.queue_command(job(coord, ChunkCommand::SaveBlockData)).unwrap();
    worker.begin_work(false);
    let panicked = worker.wait_for_outcome(TIMEOUT).unwrap();
    assert_eq!(panicked.kind(), JobKind::SaveBlockData);
    assert!(matches!(
        panicked.error(),
        Some(ChunkJobError::HandlerPanicked(message)) if message.contains("on fire")
    ));
    let chunk = store.get_chunk(coord).unwrap();
    assert!(!chunk.status_cell().is_in_flight());
    assert_eq!(chunk.status(), ChunkStatus::TerrainGenerated);

    worker.queue_command(job(coord, ChunkCommand::CalculateLighting)).unwrap();
    worker.begin_work(false);
    let next = worker.wait_for_outcome(TIMEOUT).unwrap();
    assert_eq!(next.kind(), JobKind::CalculateLighting);
    assert!(next.is_completed());
    worker.free();
}

#[test]
fn chunks_outside_the_world_are_rejected() {
    let h = harness(ChunkStore::new(4), true);
    submit(&h, Point2::new(i32::MAX, 0), ChunkCommand::GenerateTerrain);
    let outcome = h.worker.wait_for_outcome(TIMEOUT).unwrap();
    assert!(matches!(outcome.error(), Some(ChunkJobError::CorruptJob(_))));
    assert!(h.store.loaded_chunks().is_empty());

    submit(&h, Point2::new(0, 0), ChunkCommand::GenerateTerrain);
    let next = run_until(&h.worker, JobKind::GenerateTerrain, Point2::new(0, 0));
    assert!(next.last().is_some_and(JobOutcome::is_completed));
}
