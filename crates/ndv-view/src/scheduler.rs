//! Coalescing task scheduler.
//!
//! One worker thread per task kind ("lane"), started on first submit. Each
//! lane holds at most one queued task and at most one running task:
//!
//! ```text
//! submit(t) ──► lane[kind]
//!               ┌──────────────┬───────────────────────────────────────┐
//!               │ lane state   │ effect                                │
//!               ├──────────────┼───────────────────────────────────────┤
//!               │ idle         │ queue t, wake worker                  │
//!               │ queued q     │ queue q.merge(t)                      │
//!               │ running r    │ cancel r (if t cancels), queue t      │
//!               └──────────────┴───────────────────────────────────────┘
//! ```
//!
//! Under a steady stream of submissions the worker therefore finishes only
//! the newest payload (or, for accumulating kinds, every payload exactly
//! once). Cancellation is cooperative: handlers poll the [`CancelFlag`] they
//! are given.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//! use ndv_view::{Coalesce, CoalescingScheduler};
//!
//! struct Redraw(u32);
//!
//! impl Coalesce for Redraw {
//!     type Kind = ();
//!     fn kind(&self) {}
//!     fn merge(self, newer: Self) -> Self { newer }
//! }
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let scheduler = CoalescingScheduler::new("redraw", Duration::from_secs(1), move |task: Redraw, _cancel| {
//!     sink.lock().unwrap().push(task.0);
//! });
//! scheduler.submit(Redraw(1)).unwrap();
//! assert!(scheduler.wait_idle(Duration::from_secs(5)));
//! assert_eq!(*seen.lock().unwrap(), vec![1]);
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use ndv_core::CancelFlag;

use crate::{ViewError, ViewResult};

// ============================================================================
// Task contract
// ============================================================================

/// A unit of work that can be folded into a newer one of the same kind.
pub trait Coalesce: Send + 'static {
    /// Equivalence class. Tasks of one kind share a worker and coalesce.
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// This task's kind.
    fn kind(&self) -> Self::Kind;

    /// Combines a queued task with a newer submission of the same kind.
    fn merge(self, newer: Self) -> Self;

    /// Whether submitting this task cancels the running one of its kind.
    ///
    /// Kinds whose payloads accumulate return `false`: the running payload is
    /// already owned by the worker and must still be applied.
    fn cancels_running(&self) -> bool {
        true
    }
}

/// What a lane is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStatus {
    /// Nothing queued or running.
    Idle,
    /// A task waits for the worker.
    Queued,
    /// The worker is executing a task (another may be queued behind it).
    Running,
}

type Handler<T> = Arc<dyn Fn(T, &CancelFlag) + Send + Sync>;

// ============================================================================
// Lanes
// ============================================================================

struct LaneState<T> {
    pending: Option<T>,
    running: Option<CancelFlag>,
    closed: bool,
}

struct Lane<T> {
    state: Mutex<LaneState<T>>,
    changed: Condvar,
}

impl<T> Lane<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(LaneState {
                pending: None,
                running: None,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LaneState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> LaneStatus {
        let state = self.lock();
        if state.running.is_some() {
            LaneStatus::Running
        } else if state.pending.is_some() {
            LaneStatus::Queued
        } else {
            LaneStatus::Idle
        }
    }
}

struct LaneHandle<T> {
    lane: Arc<Lane<T>>,
    worker: Option<JoinHandle<()>>,
    done: Receiver<()>,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Per-kind single-worker queue with replace-if-superseded coalescing.
pub struct CoalescingScheduler<T: Coalesce> {
    name: String,
    grace: Duration,
    handler: Handler<T>,
    lanes: Mutex<HashMap<T::Kind, LaneHandle<T>>>,
    closed: AtomicBool,
}

impl<T: Coalesce> CoalescingScheduler<T> {
    /// Creates a scheduler. No threads start until the first submit.
    ///
    /// `grace` bounds how long [`shutdown`](Self::shutdown) waits for each
    /// worker.
    pub fn new<F>(name: &str, grace: Duration, handler: F) -> Self
    where
        F: Fn(T, &CancelFlag) + Send + Sync + 'static,
    {
        Self {
            name: name.to_owned(),
            grace,
            handler: Arc::new(handler),
            lanes: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Queues `task`, coalescing with queued work of the same kind.
    ///
    /// Never waits for task execution.
    pub fn submit(&self, task: T) -> ViewResult<()> {
        let kind = task.kind();
        let lane = self.lane(kind)?;
        let mut state = lane.lock();
        if state.closed {
            return Err(ViewError::SchedulerClosed);
        }
        if task.cancels_running() {
            if let Some(running) = &state.running {
                trace!(?kind, "superseding running task");
                running.cancel();
            }
        }
        state.pending = Some(match state.pending.take() {
            Some(queued) => queued.merge(task),
            None => task,
        });
        lane.changed.notify_all();
        Ok(())
    }

    /// Current activity of one kind.
    pub fn lane_status(&self, kind: T::Kind) -> LaneStatus {
        let lane = self
            .lock_lanes()
            .get(&kind)
            .map(|handle| Arc::clone(&handle.lane));
        lane.map_or(LaneStatus::Idle, |lane| lane.status())
    }

    /// Blocks until every lane is idle, or `timeout` passes.
    ///
    /// Work submitted by a handler to another lane is waited for as well.
    /// Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let lanes: Vec<_> = self
                .lock_lanes()
                .values()
                .map(|handle| Arc::clone(&handle.lane))
                .collect();
            let mut waited = false;
            for lane in lanes {
                let mut state = lane.lock();
                while !state.closed && (state.pending.is_some() || state.running.is_some()) {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    waited = true;
                    state = lane
                        .changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
            if !waited {
                return true;
            }
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Cancels running work, drops queued work and stops every worker.
    ///
    /// Idempotent and callable from any thread. Each worker gets the grace
    /// period to observe cancellation; a worker that overruns it is detached.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let lanes: Vec<_> = self.lock_lanes().drain().collect();
        debug!(scheduler = %self.name, lanes = lanes.len(), "shutting down");

        for handle in lanes.iter().map(|(_, h)| h) {
            let mut state = handle.lane.lock();
            state.closed = true;
            state.pending = None;
            if let Some(running) = &state.running {
                running.cancel();
            }
            handle.lane.changed.notify_all();
        }

        let deadline = Instant::now() + self.grace;
        for (kind, mut handle) in lanes {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match handle.done.recv_timeout(remaining) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if let Some(worker) = handle.worker.take() {
                        if worker.join().is_err() {
                            error!(scheduler = %self.name, ?kind, "worker panicked");
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        scheduler = %self.name,
                        ?kind,
                        grace_ms = self.grace.as_millis() as u64,
                        "worker did not stop in time, detaching"
                    );
                }
            }
        }
    }

    fn lock_lanes(&self) -> MutexGuard<'_, HashMap<T::Kind, LaneHandle<T>>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lane(&self, kind: T::Kind) -> ViewResult<Arc<Lane<T>>> {
        let mut lanes = self.lock_lanes();
        // Checked under the map lock: shutdown flips the flag before draining.
        if self.is_closed() {
            return Err(ViewError::SchedulerClosed);
        }
        if let Some(handle) = lanes.get(&kind) {
            return Ok(Arc::clone(&handle.lane));
        }

        let lane = Arc::new(Lane::new());
        let (done_tx, done_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("{}-{kind:?}", self.name).to_lowercase())
            .spawn({
                let lane = Arc::clone(&lane);
                let handler = Arc::clone(&self.handler);
                move || run_lane(&lane, &handler, &done_tx)
            })?;
        debug!(scheduler = %self.name, ?kind, "lane started");

        lanes.insert(
            kind,
            LaneHandle {
                lane: Arc::clone(&lane),
                worker: Some(worker),
                done: done_rx,
            },
        );
        Ok(lane)
    }
}

impl<T: Coalesce> Drop for CoalescingScheduler<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Coalesce> Debug for CoalescingScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingScheduler")
            .field("name", &self.name)
            .field("grace", &self.grace)
            .field("lanes", &self.lock_lanes().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn run_lane<T: Coalesce>(lane: &Lane<T>, handler: &Handler<T>, done: &Sender<()>) {
    loop {
        let (task, cancel) = {
            let mut state = lane.lock();
            loop {
                if state.closed {
                    let _ = done.send(());
                    return;
                }
                if let Some(task) = state.pending.take() {
                    let cancel = CancelFlag::new();
                    state.running = Some(cancel.clone());
                    break (task, cancel);
                }
                state = lane.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let kind = task.kind();
        trace!(?kind, "task started");
        if catch_unwind(AssertUnwindSafe(|| handler(task, &cancel))).is_err() {
            error!(?kind, "task panicked");
        } else {
            trace!(?kind, cancelled = cancel.is_cancelled(), "task finished");
        }

        lane.lock().running = None;
        lane.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Latest,
        Batch,
    }

    #[derive(Debug)]
    enum Job {
        Latest(u32),
        Batch(Vec<u32>),
    }

    impl Coalesce for Job {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            match self {
                Job::Latest(_) => Kind::Latest,
                Job::Batch(_) => Kind::Batch,
            }
        }

        fn merge(self, newer: Self) -> Self {
            match (self, newer) {
                (Job::Batch(mut a), Job::Batch(b)) => {
                    a.extend(b);
                    Job::Batch(a)
                }
                (_, newer) => newer,
            }
        }

        fn cancels_running(&self) -> bool {
            matches!(self, Job::Latest(_))
        }
    }

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn idle_until_first_submit() {
        let scheduler = CoalescingScheduler::new("t", WAIT, |_: Job, _| {});
        assert_eq!(scheduler.lane_status(Kind::Latest), LaneStatus::Idle);
        assert!(scheduler.wait_idle(Duration::ZERO));
    }

    #[test]
    fn rapid_submissions_collapse_to_newest() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completed);
        let scheduler = CoalescingScheduler::new("t", WAIT, move |job: Job, cancel: &CancelFlag| {
            let Job::Latest(v) = job else { return };
            for _ in 0..20 {
                if cancel.is_cancelled() {
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
            if !cancel.is_cancelled() {
                sink.lock().unwrap().push(v);
            }
        });

        for v in 0..1000 {
            scheduler.submit(Job::Latest(v)).unwrap();
        }
        assert!(scheduler.wait_idle(WAIT));
        assert_eq!(*completed.lock().unwrap(), vec![999]);
    }

    #[test]
    fn accumulating_kind_sees_every_payload_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let scheduler = CoalescingScheduler::new("t", WAIT, move |job: Job, cancel: &CancelFlag| {
            let Job::Batch(items) = job else { return };
            thread::sleep(Duration::from_millis(2));
            assert!(!cancel.is_cancelled());
            sink.lock().unwrap().extend(items);
        });

        for v in 0..200 {
            scheduler.submit(Job::Batch(vec![v])).unwrap();
        }
        assert!(scheduler.wait_idle(WAIT));
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn one_execution_in_flight_per_kind() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let scheduler = CoalescingScheduler::new("t", WAIT, move |_: Job, _: &CancelFlag| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            a.fetch_sub(1, Ordering::SeqCst);
        });
        for v in 0..100 {
            scheduler.submit(Job::Latest(v)).unwrap();
            if v % 10 == 0 {
                thread::sleep(Duration::from_millis(2));
            }
        }
        assert!(scheduler.wait_idle(WAIT));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lanes_run_independently() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let batches = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&batches);
        let scheduler = CoalescingScheduler::new("t", WAIT, move |job: Job, _: &CancelFlag| match job {
            Job::Latest(_) => {
                let _ = release_rx.lock().unwrap().recv_timeout(WAIT);
            }
            Job::Batch(_) => {
                b.fetch_add(1, Ordering::SeqCst);
            }
        });

        scheduler.submit(Job::Latest(0)).unwrap();
        scheduler.submit(Job::Batch(vec![1])).unwrap();
        let start = Instant::now();
        while batches.load(Ordering::SeqCst) == 0 && start.elapsed() < WAIT {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(batches.load(Ordering::SeqCst), 1);
        assert_ne!(scheduler.lane_status(Kind::Latest), LaneStatus::Idle);

        release_tx.send(()).unwrap();
        assert!(scheduler.wait_idle(WAIT));
        assert_eq!(scheduler.lane_status(Kind::Latest), LaneStatus::Idle);
    }

    #[test]
    fn panicking_task_does_not_kill_lane() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let scheduler = CoalescingScheduler::new("t", WAIT, move |job: Job, _: &CancelFlag| {
            r.fetch_add(1, Ordering::SeqCst);
            if let Job::Latest(0) = job {
                panic!("boom");
            }
        });
        scheduler.submit(Job::Latest(0)).unwrap();
        assert!(scheduler.wait_idle(WAIT));
        scheduler.submit(Job::Latest(1)).unwrap();
        assert!(scheduler.wait_idle(WAIT));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shutdown_refuses_work_and_is_idempotent() {
        let scheduler = CoalescingScheduler::new("t", WAIT, |_: Job, _: &CancelFlag| {});
        scheduler.submit(Job::Latest(1)).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        assert!(scheduler.is_closed());
        assert!(matches!(
            scheduler.submit(Job::Latest(2)),
            Err(ViewError::SchedulerClosed)
        ));
        assert_eq!(scheduler.lane_status(Kind::Latest), LaneStatus::Idle);
    }

    #[test]
    fn shutdown_cancels_running_task() {
        let observed = Arc::new(AtomicBool::new(false));
        let o = Arc::clone(&observed);
        let scheduler = CoalescingScheduler::new("t", WAIT, move |_: Job, cancel: &CancelFlag| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            o.store(true, Ordering::SeqCst);
        });
        scheduler.submit(Job::Latest(0)).unwrap();
        while scheduler.lane_status(Kind::Latest) != LaneStatus::Running {
            thread::sleep(Duration::from_millis(1));
        }
        scheduler.shutdown();
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn stuck_worker_is_detached_after_grace() {
        let scheduler = CoalescingScheduler::new(
            "t",
            Duration::from_millis(50),
            |_: Job, _: &CancelFlag| thread::sleep(Duration::from_millis(1500)),
        );
        scheduler.submit(Job::Latest(0)).unwrap();
        while scheduler.lane_status(Kind::Latest) != LaneStatus::Running {
            thread::sleep(Duration::from_millis(1));
        }
        let start = Instant::now();
        scheduler.shutdown();
        assert!(start.elapsed() < Duration::from_millis(1000));
    }
}
