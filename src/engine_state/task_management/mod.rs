//! # Chunk Task Management
//!
//! A single background thread that executes prioritized chunk jobs off the
//! main thread.
//!
//! ## Architecture Overview
//!
//! - [`JobQueue`]: mutex-guarded priority queue ranked by distance to the
//!   live player position
//! - [`ChunkThreadWorker`]: owns the worker thread and is the main thread's
//!   only handle on it
//! - [`WorkerContext`]: generators, chunk store and persistence backend,
//!   moved into the worker thread at construction
//! - [`JobOutcome`]: per-job completion report sent back over a channel
//!
//! ## Job Lifecycle
//! 1. The main thread queues jobs with [`ChunkThreadWorker::queue_command`]
//! 2. [`ChunkThreadWorker::begin_work`] wakes the worker
//! 3. The worker pops the closest job, runs its handler and queues the
//!    handler's follow-up jobs
//! 4. The handler publishes the chunk's new [`ChunkStatus`](crate::engine_state::voxels::chunk::ChunkStatus);
//!    the worker reports a [`JobOutcome`]
//! 5. When the queue runs dry the worker sleeps until the next `begin_work`
//!
//! ## Failure Handling
//! A failing or panicking handler only loses its own job. The error is
//! logged, reported as [`JobOutcome::Failed`] and the loop carries on.
//!
//! ## Example Usage
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cgmath::Point2;
//! use chunk_worker::config::WorkerConfig;
//! use chunk_worker::engine_state::persistence::InMemoryPersistence;
//! use chunk_worker::engine_state::task_management::{ChunkThreadWorker, job::{ChunkCommand, ChunkJob}};
//! use chunk_worker::engine_state::voxels::chunk_store::ChunkStore;
//!
//! let config = WorkerConfig::default();
//! let store = Arc::new(ChunkStore::new(config.chunk_capacity));
//! let worker = ChunkThreadWorker::new(config, store.clone(), Arc::new(InMemoryPersistence::new(16))).unwrap();
//!
//! let origin = Point2::new(0, 0);
//! worker.set_player_pos_chunk_coords(origin);
//! worker.queue_command(ChunkJob::new(origin, origin, ChunkCommand::GenerateTerrain)).unwrap();
//! worker.begin_work(false);
//!
//! let outcome = worker.wait_for_outcome(Duration::from_secs(10)).unwrap();
//! assert!(outcome.is_completed());
//! worker.free();
//! ```

pub mod handlers;
pub mod job;
pub mod job_queue;
pub mod outcome;
pub mod priority_queue;

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use num_derive::FromPrimitive;
use web_time::Instant;

use crate::config::WorkerConfig;
use crate::core::PlayerPositionCell;
use crate::engine_state::persistence::ChunkPersistence;
use crate::engine_state::voxels::chunk::ChunkCoord;
use crate::engine_state::voxels::chunk_store::ChunkStore;
use crate::error::ChunkJobError;

pub use handlers::WorkerContext;
pub use job::{ChunkCommand, ChunkJob, JobKind};
pub use job_queue::JobQueue;
pub use outcome::JobOutcome;

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum WorkerState {
    /// Waiting for work.
    Idle,
    /// Running a job's handler.
    Executing,
    /// Stop was requested; the thread is finishing its current job.
    ShuttingDown,
    /// The thread has been joined.
    Stopped,
}

/// State shared between the worker handle and the worker thread.
struct Shared {
    queue: JobQueue,
    state: AtomicU8,
    dropped_outcomes: AtomicUsize,
}

impl Shared {
    fn state(&self) -> WorkerState {
        num::FromPrimitive::from_u8(self.state.load(Ordering::Acquire))
            .unwrap_or(WorkerState::Stopped)
    }

    /// Moves between Idle and Executing. Never leaves a shutdown state.
    fn set_running_state(&self, next: WorkerState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let stopping = current == WorkerState::ShuttingDown as u8
                    || current == WorkerState::Stopped as u8;
                (!stopping).then_some(next as u8)
            });
    }
}

/// Handle to the chunk worker thread.
///
/// Every method takes `&self` and is safe to call from any thread. Dropping
/// the handle stops the worker.
///
/// Outcomes wait in a channel of `outcome_capacity` entries until drained
/// with [`ChunkThreadWorker::poll_outcomes`] or
/// [`ChunkThreadWorker::wait_for_outcome`]. While it is full, new outcomes
/// are dropped and counted in [`ChunkThreadWorker::dropped_outcomes`]; the
/// chunk status stays authoritative either way.
pub struct ChunkThreadWorker {
    shared: Arc<Shared>,
    store: Arc<ChunkStore>,
    outcomes: Mutex<Receiver<JobOutcome>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ChunkThreadWorker {
    /// Spawns the worker thread.
    ///
    /// # Errors
    /// Fails only if the OS refuses to create the thread.
    pub fn new(
        config: WorkerConfig,
        store: Arc<ChunkStore>,
        persistence: Arc<dyn ChunkPersistence>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: JobQueue::new(Arc::new(PlayerPositionCell::new())),
            state: AtomicU8::new(WorkerState::Idle as u8),
            dropped_outcomes: AtomicUsize::new(0),
        });
        let context = WorkerContext::new(&config, store.clone(), persistence);
        let (outcome_tx, outcome_rx) = sync_channel(config.outcome_capacity.max(1));

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_loop(&thread_shared, &context, &outcome_tx))?;
        info!(
            "Started chunk worker '{}' (seed {}, {} chunks)",
            config.thread_name, config.seed, config.chunk_capacity
        );

        Ok(ChunkThreadWorker {
            shared,
            store,
            outcomes: Mutex::new(outcome_rx),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Queues a job without waking the worker. Never blocks on the worker.
    ///
    /// # Errors
    /// `ShutdownInProgress` once [`ChunkThreadWorker::stop`] has been called.
    pub fn queue_command(&self, job: ChunkJob) -> Result<(), ChunkJobError> {
        trace!(
            "Queueing {} for chunk ({}, {})",
            job.kind(),
            job.coord.x,
            job.coord.y
        );
        self.shared.queue.push(job)
    }

    /// Wakes the worker to drain the queue. Use `notify_all = false` after
    /// queueing a single job.
    pub fn begin_work(&self, notify_all: bool) {
        self.shared.queue.request_work(notify_all);
    }

    /// Publishes the player's chunk. O(1); queued jobs are re-ranked against
    /// it at the next pop.
    pub fn set_player_pos_chunk_coords(&self, coord: ChunkCoord) {
        self.shared.queue.set_player_position(coord);
    }

    /// The last published player chunk, if any.
    pub fn player_pos_chunk_coords(&self) -> Option<ChunkCoord> {
        self.shared.queue.player_position().load()
    }

    /// Outcomes reported since the last call, in execution order.
    pub fn poll_outcomes(&self) -> Vec<JobOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_iter()
            .collect()
    }

    /// Blocks until the next outcome or the timeout.
    pub fn wait_for_outcome(&self, timeout: Duration) -> Option<JobOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .ok()
    }

    /// Outcomes discarded because nobody drained the channel.
    pub fn dropped_outcomes(&self) -> usize {
        self.shared.dropped_outcomes.load(Ordering::Relaxed)
    }

    /// Jobs waiting in the queue, not counting the one being executed.
    pub fn pending_jobs(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// The chunk store the worker writes into.
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Stops the worker and joins its thread.
    ///
    /// The job being executed, if any, runs to completion; jobs still queued
    /// are discarded. Returns only once the thread has exited. Calling it
    /// again is a no-op.
    pub fn stop(&self) {
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = thread.take() else {
            return;
        };

        self.shared
            .state
            .store(WorkerState::ShuttingDown as u8, Ordering::Release);
        self.shared.queue.close();
        if handle.join().is_err() {
            error!("Chunk worker thread panicked outside a job");
        }

        let discarded = self.shared.queue.drain().len();
        if discarded > 0 {
            info!("Discarded {discarded} queued chunk jobs on shutdown");
        }
        self.shared
            .state
            .store(WorkerState::Stopped as u8, Ordering::Release);
        info!("Chunk worker stopped");
    }

    /// Same as [`ChunkThreadWorker::stop`].
    pub fn free(&self) {
        self.stop();
    }
}

impl Drop for ChunkThreadWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn worker_loop(shared: &Shared, context: &WorkerContext, outcomes: &SyncSender<JobOutcome>) {
    while let Some(job) = shared.queue.pop_highest_priority() {
        shared.set_running_state(WorkerState::Executing);
        let (kind, coord) = (job.kind(), job.coord);
        let start = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| context.execute(&job)))
            .unwrap_or_else(|payload| Err(ChunkJobError::HandlerPanicked(panic_message(payload))));

        let outcome = match result {
            Ok(follow_ups) => {
                debug!(
                    "{kind} for chunk ({}, {}) took {:?}",
                    coord.x,
                    coord.y,
                    start.elapsed()
                );
                for next in follow_ups {
                    if let Err(e) = shared.queue.push(next) {
                        debug!("Dropping follow-up for chunk ({}, {}): {e}", coord.x, coord.y);
                    }
                }
                JobOutcome::Completed { kind, coord }
            }
            Err(error) => {
                match &error {
                    ChunkJobError::HandlerPanicked(_) => {
                        error!("{kind} for chunk ({}, {}) panicked: {error}", coord.x, coord.y)
                    }
                    e if e.is_recoverable() => warn!(
                        "Dropping {kind} for chunk ({}, {}), retry later: {error}",
                        coord.x, coord.y
                    ),
                    _ => warn!("Dropping {kind} for chunk ({}, {}): {error}", coord.x, coord.y),
                }
                JobOutcome::Failed { kind, coord, error }
            }
        };
        match outcomes.try_send(outcome) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = shared.dropped_outcomes.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 {
                    warn!("Outcome channel is full; dropping outcomes until it is drained");
                }
                trace!("Dropped outcome of {kind} for chunk ({}, {})", coord.x, coord.y);
            }
            // The handle is gone while the thread winds down.
            Err(TrySendError::Disconnected(_)) => {}
        }
        shared.set_running_state(WorkerState::Idle);
    }
}
