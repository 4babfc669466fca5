//! # Job Queue
//!
//! Mutex-guarded priority queue shared by the main thread and the worker.
//! One condition variable serves both "work was requested" and "shut down",
//! so a single wait is interrupted by either.
//!
//! ## Ranking
//!
//! Jobs are ranked by squared chunk distance from the live player position
//! (closer first), then by [`JobKind`](super::job::JobKind) order, then by
//! submission order. The comparator reads the shared
//! [`PlayerPositionCell`] on every comparison; while the cell is unset each
//! job falls back to its own position snapshot.
//!
//! Moving the player does not touch the heap. Instead, every pop checks
//! whether the player cell was written since the heap was last ordered and
//! rebuilds it first (O(n)). Jobs pushed in between were sifted against
//! whatever position was live at the time, so any write counts, even one
//! that returns to an earlier chunk. The job popped is always a closest one
//! for the position read at the start of that pop; a move that lands while
//! a pop is in progress is picked up by the next pop.

use std::cmp::Ordering;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::core::PlayerPositionCell;
use crate::engine_state::voxels::chunk::{chunk_distance_squared, ChunkCoord};
use crate::error::ChunkJobError;

use super::job::ChunkJob;
use super::priority_queue::PriorityQueue;

/// A job plus its submission sequence number.
struct QueuedJob {
    job: ChunkJob,
    sequence: u64,
}

type JobComparator = Box<dyn Fn(&QueuedJob, &QueuedJob) -> Ordering + Send>;

/// Orders two jobs against a player position. `Greater` runs first.
fn rank(a: &QueuedJob, b: &QueuedJob, player: Option<ChunkCoord>) -> Ordering {
    let distance = |queued: &QueuedJob| {
        chunk_distance_squared(
            player.unwrap_or(queued.job.player_pos_snapshot),
            queued.job.coord,
        )
    };
    distance(b)
        .cmp(&distance(a))
        .then_with(|| b.job.kind().cmp(&a.job.kind()))
        .then_with(|| b.sequence.cmp(&a.sequence))
}

struct QueueState {
    heap: PriorityQueue<QueuedJob, JobComparator>,
    next_sequence: u64,
    /// Player cell epoch the heap was last ordered for.
    ordered_epoch: u64,
    work_requested: bool,
    closed: bool,
}

/// Blocking priority queue of [`ChunkJob`]s.
pub struct JobQueue {
    state: Mutex<QueueState>,
    signal: Condvar,
    player: Arc<PlayerPositionCell>,
}

impl JobQueue {
    /// Creates an empty queue ranking against `player`.
    pub fn new(player: Arc<PlayerPositionCell>) -> Self {
        let live = player.clone();
        let compare: JobComparator = Box::new(move |a, b| rank(a, b, live.load()));
        JobQueue {
            state: Mutex::new(QueueState {
                heap: PriorityQueue::new(compare),
                next_sequence: 0,
                ordered_epoch: player.epoch(),
                work_requested: false,
                closed: false,
            }),
            signal: Condvar::new(),
            player,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shared player position the queue ranks against.
    pub fn player_position(&self) -> &Arc<PlayerPositionCell> {
        &self.player
    }

    /// Publishes a new player chunk coordinate. O(1): the heap is reordered
    /// lazily by the next pop.
    pub fn set_player_position(&self, coord: ChunkCoord) {
        self.player.store(coord);
    }

    /// Adds a job. It is picked up the next time the worker looks at the
    /// queue; call [`JobQueue::request_work`] to wake an idle worker.
    ///
    /// # Errors
    /// `ShutdownInProgress` once the queue is closed.
    pub fn push(&self, job: ChunkJob) -> Result<(), ChunkJobError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChunkJobError::ShutdownInProgress);
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.heap.push(QueuedJob { job, sequence });
        Ok(())
    }

    /// Asks waiting consumers to drain the queue. `notify_all` wakes every
    /// waiter, otherwise only one.
    pub fn request_work(&self, notify_all: bool) {
        self.lock().work_requested = true;
        if notify_all {
            self.signal.notify_all();
        } else {
            self.signal.notify_one();
        }
    }

    /// Removes the highest ranked job, blocking until work is requested and
    /// a job is available.
    ///
    /// Finding the queue empty ends the current work request, so the caller
    /// sleeps until the next [`JobQueue::request_work`].
    ///
    /// # Returns
    /// `None` once the queue is closed, even if jobs remain.
    pub fn pop_highest_priority(&self) -> Option<ChunkJob> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if state.work_requested {
                if let Some(job) = self.pop_ranked(&mut state) {
                    return Some(job);
                }
                state.work_requested = false;
            }
            state = self
                .signal
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Non-blocking pop that ignores the work request flag.
    pub fn try_pop(&self) -> Option<ChunkJob> {
        let mut state = self.lock();
        self.pop_ranked(&mut state)
    }

    fn pop_ranked(&self, state: &mut QueueState) -> Option<ChunkJob> {
        let epoch = self.player.epoch();
        if epoch != state.ordered_epoch {
            state.heap.rebuild();
            state.ordered_epoch = epoch;
        }
        state.heap.pop().map(|queued| queued.job)
    }

    /// Closes the queue: pushes fail, waiters wake and every pop returns
    /// `None`. Queued jobs stay until [`JobQueue::drain`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.signal.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Removes every queued job.
    pub fn drain(&self) -> Vec<ChunkJob> {
        self.lock().heap.drain().map(|queued| queued.job).collect()
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::task_management::job::{ChunkCommand, JobKind};
    use cgmath::Point2;
    use std::thread;
    use std::time::Duration;

    fn terrain(x: i32, z: i32) -> ChunkJob {
        ChunkJob::new(Point2::new(x, z), Point2::new(0, 0), ChunkCommand::GenerateTerrain)
    }

    fn queue_at(x: i32, z: i32) -> JobQueue {
        JobQueue::new(Arc::new(PlayerPositionCell::with_position(Point2::new(x, z))))
    }

    #[test]
    fn closest_job_first() {
        let queue = queue_at(0, 0);
        queue.push(terrain(5, 5)).unwrap();
        queue.push(terrain(0, 0)).unwrap();
        queue.push(terrain(-2, 1)).unwrap();

        assert_eq!(queue.try_pop().map(|j| j.coord), Some(Point2::new(0, 0)));
        assert_eq!(queue.try_pop().map(|j| j.coord), Some(Point2::new(-2, 1)));
        assert_eq!(queue.try_pop().map(|j| j.coord), Some(Point2::new(5, 5)));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn ties_break_by_kind_then_submission() {
        let queue = queue_at(0, 0);
        let coord = Point2::new(1, 1);
        queue
            .push(ChunkJob::new(coord, coord, ChunkCommand::TesselateVertices))
            .unwrap();
        queue
            .push(ChunkJob::new(coord, coord, ChunkCommand::CalculateLighting))
            .unwrap();
        queue
            .push(ChunkJob::new(Point2::new(1, -1), coord, ChunkCommand::CalculateLighting))
            .unwrap();
        queue
            .push(ChunkJob::new(coord, coord, ChunkCommand::SaveBlockData))
            .unwrap();

        let order: Vec<_> = std::iter::from_fn(|| queue.try_pop())
            .map(|j| (j.kind(), j.coord))
            .collect();
        assert_eq!(
            order,
            vec![
                (JobKind::SaveBlockData, coord),
                (JobKind::CalculateLighting, coord),
                (JobKind::CalculateLighting, Point2::new(1, -1)),
                (JobKind::TesselateVertices, coord),
            ]
        );
    }

    #[test]
    fn ranking_follows_the_live_player_position() {
        let queue = queue_at(0, 0);
        for x in 0..8 {
            queue.push(terrain(x * 4, 0)).unwrap();
        }
        assert_eq!(queue.try_pop().map(|j| j.coord), Some(Point2::new(0, 0)));

        queue.set_player_position(Point2::new(20, 0));
        assert_eq!(queue.try_pop().map(|j| j.coord), Some(Point2::new(20, 0)));
        let next = queue.try_pop().map(|j| j.coord.x);
        assert!(next == Some(16) || next == Some(24));

        queue.set_player_position(Point2::new(-100, 0));
        assert_eq!(queue.try_pop().map(|j| j.coord), Some(Point2::new(4, 0)));
    }

    #[test]
    fn returning_to_an_earlier_chunk_reorders_jobs_pushed_elsewhere() {
        let queue = queue_at(0, 0);
        queue.push(terrain(0, 0)).unwrap();
        queue.set_player_position(Point2::new(50, 0));
        queue.push(terrain(50, 0)).unwrap();
        queue.push(terrain(1, 0)).unwrap();
        queue.set_player_position(Point2::new(0, 0));

        let order: Vec<i32> = std::iter::from_fn(|| queue.try_pop())
            .map(|j| j.coord.x)
            .collect();
        assert_eq!(order, vec![0, 1, 50]);
    }

    #[test]
    fn unknown_player_uses_snapshots() {
        let queue = JobQueue::new(Arc::new(PlayerPositionCell::new()));
        queue
            .push(ChunkJob::new(Point2::new(10, 10), Point2::new(0, 0), ChunkCommand::GenerateTerrain))
            .unwrap();
        queue
            .push(ChunkJob::new(Point2::new(10, 10), Point2::new(10, 9), ChunkCommand::GenerateDecorations))
            .unwrap();
        assert_eq!(queue.try_pop().map(|j| j.kind()), Some(JobKind::GenerateDecorations));
    }

    #[test]
    fn closed_queue_rejects_and_releases_waiters() {
        let queue = Arc::new(queue_at(0, 0));
        queue.push(terrain(0, 0)).unwrap();

        // Work was never requested, so this blocks until close.
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop_highest_priority())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(waiter.join().unwrap().is_none());

        assert!(matches!(
            queue.push(terrain(1, 1)),
            Err(ChunkJobError::ShutdownInProgress)
        ));
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn request_work_wakes_a_waiter() {
        let queue = Arc::new(queue_at(0, 0));
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop_highest_priority())
        };
        queue.push(terrain(3, 0)).unwrap();
        queue.request_work(false);
        assert_eq!(waiter.join().unwrap().map(|j| j.coord), Some(Point2::new(3, 0)));
    }
}
