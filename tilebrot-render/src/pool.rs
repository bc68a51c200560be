//! Fixed-size pool of tile workers.
//!
//! Each worker is a named thread with its own job channel. Work items are
//! moved in and results moved out; nothing mutable is shared with the
//! kernel. The bookkeeping (idle stack, backlog, outstanding map) lives
//! behind one mutex that is only held for O(1) updates, never while a
//! kernel runs.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace, warn};

use tilebrot_core::{EscapeTime, Tile, TileKernel, WorkItem, WorkResult};

use crate::error::RenderError;

/// Smallest pool size handed out by [`default_worker_count`].
pub const MIN_WORKERS: usize = 2;

/// One worker per logical CPU, but never fewer than [`MIN_WORKERS`].
pub fn default_worker_count() -> usize {
    num_cpus::get().max(MIN_WORKERS)
}

/// What a worker eventually reports for one submission.
pub type TaskOutcome = Result<WorkResult, RenderError>;

type Resolver = SyncSender<TaskOutcome>;

// ---------------------------------------------------------------------------
// Futures
// ---------------------------------------------------------------------------

/// Handle to the eventual outcome of a submitted [`WorkItem`].
///
/// If the pool is disposed before the item completes, the handle resolves
/// to [`RenderError::Disposed`].
#[derive(Debug)]
pub struct TaskFuture {
    tile: Tile,
    rx: Receiver<TaskOutcome>,
}

impl TaskFuture {
    /// The tile this submission was for.
    pub fn tile(&self) -> Tile {
        self.tile
    }

    /// Block until the worker reports back.
    pub fn wait(self) -> TaskOutcome {
        self.rx.recv().unwrap_or(Err(RenderError::Disposed))
    }

    /// Take the outcome if it is already available.
    pub fn try_wait(&self) -> Option<TaskOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RenderError::Disposed)),
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(RenderError::Disposed)),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared bookkeeping
// ---------------------------------------------------------------------------

struct PoolState {
    /// Job channel per worker, indexed by worker id. Emptied on dispose.
    jobs: Vec<Sender<WorkItem>>,
    /// Idle workers; the most recently freed worker is reused first.
    idle: Vec<usize>,
    /// Items waiting for a worker, oldest first.
    backlog: VecDeque<(WorkItem, Resolver)>,
    /// Resolver bound to each busy worker.
    outstanding: HashMap<usize, Resolver>,
    disposed: bool,
}

impl PoolState {
    /// Bind `resolver` to `worker` and hand it the item.
    fn dispatch(&mut self, worker: usize, item: WorkItem, resolver: Resolver) {
        debug_assert!(!self.outstanding.contains_key(&worker));
        match self.jobs.get(worker).map(|tx| tx.send(item)) {
            Some(Ok(())) => {
                trace!(worker, frame = item.frame, y = item.tile.y, "Dispatched tile");
                self.outstanding.insert(worker, resolver);
            }
            _ => {
                warn!(worker, "Worker channel closed; rejecting tile");
                let _ = resolver.try_send(Err(RenderError::WorkerUnavailable {
                    worker,
                    tile: item.tile,
                }));
            }
        }
    }
}

type Shared = Arc<Mutex<PoolState>>;

fn lock(shared: &Shared) -> MutexGuard<'_, PoolState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Completion path, run on the worker thread that just finished.
fn worker_done(shared: &Shared, worker: usize, outcome: TaskOutcome) {
    let resolver = {
        let mut state = lock(shared);
        if state.disposed {
            trace!(worker, "Dropping result after dispose");
            return;
        }
        let resolver = state.outstanding.remove(&worker);
        match state.backlog.pop_front() {
            Some((item, next)) => state.dispatch(worker, item, next),
            None => state.idle.push(worker),
        }
        resolver
    };

    if let Some(resolver) = resolver {
        // The receiver may have been dropped by a superseded frame.
        let _ = resolver.try_send(outcome);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_worker<K: TileKernel>(worker: usize, kernel: Arc<K>, jobs: Receiver<WorkItem>, shared: Shared) {
    debug!(worker, "Tile worker started");
    while let Ok(item) = jobs.recv() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| kernel.compute(&item))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(source)) => Err(RenderError::Kernel {
                tile: item.tile,
                source,
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(worker, y = item.tile.y, %message, "Kernel panicked");
                Err(RenderError::WorkerPanicked {
                    tile: item.tile,
                    message,
                })
            }
        };
        worker_done(&shared, worker, outcome);
    }
    debug!(worker, "Tile worker exiting");
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A fixed set of worker threads fed from a FIFO backlog.
///
/// A worker is either idle or bound to exactly one outstanding item; the
/// pool never hands a second item to a busy worker.
pub struct WorkerPool {
    shared: Shared,
    size: usize,
}

impl WorkerPool {
    /// Pool of `workers` threads running the escape-time kernel.
    pub fn new(workers: usize) -> Self {
        Self::with_kernel(workers, EscapeTime)
    }

    /// Pool of `workers` threads (at least one) running `kernel`.
    pub fn with_kernel<K: TileKernel>(workers: usize, kernel: K) -> Self {
        let size = workers.max(1);
        let kernel = Arc::new(kernel);
        let shared: Shared = Arc::new(Mutex::new(PoolState {
            jobs: Vec::with_capacity(size),
            idle: Vec::with_capacity(size),
            backlog: VecDeque::new(),
            outstanding: HashMap::with_capacity(size),
            disposed: false,
        }));

        for worker in 0..size {
            let (tx, rx) = mpsc::channel::<WorkItem>();
            let kernel = Arc::clone(&kernel);
            let thread_shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name(format!("tile-worker-{worker}"))
                .spawn(move || run_worker(worker, kernel, rx, thread_shared))
                .expect("Failed to spawn tile worker thread");

            let mut state = lock(&shared);
            state.jobs.push(tx);
            state.idle.push(worker);
        }

        debug!(workers = size, "Worker pool ready");
        Self { shared, size }
    }

    /// Queue an item for computation.
    ///
    /// Runs immediately on the most recently idled worker if one is free,
    /// otherwise waits in the backlog behind earlier submissions.
    pub fn submit(&self, item: WorkItem) -> TaskFuture {
        let (resolver, rx) = mpsc::sync_channel(1);
        let mut state = lock(&self.shared);
        if state.disposed {
            drop(resolver);
        } else if let Some(worker) = state.idle.pop() {
            state.dispatch(worker, item, resolver);
        } else {
            state.backlog.push_back((item, resolver));
        }
        TaskFuture { tile: item.tile, rx }
    }

    /// Stop all workers.
    ///
    /// Queued items are discarded, outstanding futures resolve to
    /// [`RenderError::Disposed`] and results that arrive later are dropped.
    /// Workers busy with a tile exit once that tile finishes.
    pub fn dispose(&self) {
        let mut state = lock(&self.shared);
        if state.disposed {
            return;
        }
        state.disposed = true;
        let abandoned = state.outstanding.len() + state.backlog.len();
        state.jobs.clear();
        state.idle.clear();
        state.backlog.clear();
        state.outstanding.clear();
        debug!(abandoned, "Worker pool disposed");
    }

    /// Number of workers fixed at creation.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        lock(&self.shared).idle.len()
    }

    /// Workers currently bound to an outstanding item.
    pub fn busy_count(&self) -> usize {
        lock(&self.shared).outstanding.len()
    }

    /// Items waiting for a free worker.
    pub fn queued_count(&self) -> usize {
        lock(&self.shared).backlog.len()
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.shared).disposed
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared);
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("idle", &state.idle.len())
            .field("busy", &state.outstanding.len())
            .field("queued", &state.backlog.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Condvar;
    use std::time::Instant;

    use tilebrot_core::{Complex, CoreError};

    fn item(y: u32) -> WorkItem {
        WorkItem {
            frame: 1,
            tile: Tile::new(0, y, 8, 1),
            origin: Complex::new(-2.0, -1.0 + y as f64 * 0.05),
            step: 0.05,
            max_iterations: 64,
        }
    }

    /// Blocks every computation until opened; tracks concurrency.
    #[derive(Default)]
    struct Gated {
        open: Mutex<bool>,
        cv: Condvar,
        active: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
    }

    impl Gated {
        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.cv.notify_all();
        }
    }

    impl TileKernel for Gated {
        fn compute(&self, item: &WorkItem) -> tilebrot_core::Result<WorkResult> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.fetch_add(1, Ordering::SeqCst);
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
            drop(open);
            self.active.fetch_sub(1, Ordering::SeqCst);
            tilebrot_core::compute_tile(item)
        }
    }

    /// Fails on odd rows, panics on row 13.
    struct Flaky;

    impl TileKernel for Flaky {
        fn compute(&self, item: &WorkItem) -> tilebrot_core::Result<WorkResult> {
            if item.tile.y == 13 {
                panic!("boom on row 13");
            }
            if item.tile.y % 2 == 1 {
                return Err(CoreError::InvalidStepSize(-1.0));
            }
            tilebrot_core::compute_tile(item)
        }
    }

    /// Records which thread ran each item.
    #[derive(Default)]
    struct ThreadLog(Mutex<Vec<String>>);

    impl TileKernel for ThreadLog {
        fn compute(&self, item: &WorkItem) -> tilebrot_core::Result<WorkResult> {
            let name = std::thread::current().name().unwrap_or_default().to_string();
            self.0.lock().unwrap().push(name);
            tilebrot_core::compute_tile(item)
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn default_worker_count_has_floor() {
        assert!(default_worker_count() >= MIN_WORKERS);
    }

    #[test]
    fn results_match_direct_computation() {
        let pool = WorkerPool::new(3);
        let futures: Vec<_> = (0..20).map(|y| pool.submit(item(y))).collect();
        for (y, fut) in futures.into_iter().enumerate() {
            let expected = tilebrot_core::compute_tile(&item(y as u32)).unwrap();
            assert_eq!(fut.wait().unwrap(), expected);
        }
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.busy_count(), 0);
    }

    #[test]
    fn backlog_bounded_by_pool_size() {
        let gate = Arc::new(Gated::default());
        let pool = WorkerPool::with_kernel(3, Arc::clone(&gate));
        let futures: Vec<_> = (0..10).map(|y| pool.submit(item(y))).collect();

        // Bookkeeping is updated synchronously by `submit`.
        assert_eq!(pool.busy_count(), 3);
        assert_eq!(pool.queued_count(), 7);
        assert_eq!(pool.idle_count(), 0);

        wait_until(|| gate.started.load(Ordering::SeqCst) == 3);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(gate.started.load(Ordering::SeqCst), 3, "no fourth item may start");

        gate.release();
        let mut seen = HashSet::new();
        for fut in futures {
            let tile = fut.tile();
            let result = fut.wait().unwrap();
            assert_eq!(result.tile, tile, "result must match its submission");
            assert!(seen.insert(tile.y));
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(gate.started.load(Ordering::SeqCst), 10);
        assert!(gate.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.idle_count(), 3);
    }

    #[test]
    fn failures_are_per_task() {
        let pool = WorkerPool::with_kernel(1, Flaky);
        let outcomes: Vec<_> = (0..4).map(|y| pool.submit(item(y))).map(TaskFuture::wait).collect();

        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1],
            Err(RenderError::Kernel { tile, .. }) if tile.y == 1
        ));
        assert!(outcomes[2].is_ok());
        assert!(outcomes[3].is_err());
        assert_eq!(pool.idle_count(), 1, "the single worker must survive");
    }

    #[test]
    fn panicking_kernel_does_not_kill_worker() {
        let pool = WorkerPool::with_kernel(1, Flaky);
        let panicked = pool.submit(item(13)).wait();
        assert!(matches!(
            panicked,
            Err(RenderError::WorkerPanicked { ref message, .. }) if message.contains("boom")
        ));
        assert_eq!(panicked.unwrap_err().tile().map(|t| t.y), Some(13));
        assert!(pool.submit(item(2)).wait().is_ok());
    }

    #[test]
    fn most_recently_idle_worker_is_reused() {
        let log = Arc::new(ThreadLog::default());
        let pool = WorkerPool::with_kernel(4, Arc::clone(&log));
        for y in 0..5 {
            pool.submit(item(y)).wait().unwrap();
        }
        let names = log.0.lock().unwrap().clone();
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n == &names[0]), "{names:?}");
        assert!(names[0].starts_with("tile-worker-"));
    }

    #[test]
    fn dispose_abandons_outstanding_work() {
        let gate = Arc::new(Gated::default());
        let pool = WorkerPool::with_kernel(2, Arc::clone(&gate));
        let futures: Vec<_> = (0..5).map(|y| pool.submit(item(y))).collect();
        wait_until(|| gate.started.load(Ordering::SeqCst) == 2);

        pool.dispose();
        assert!(pool.is_disposed());
        gate.release();

        for fut in futures {
            assert!(matches!(fut.wait(), Err(RenderError::Disposed)));
        }
        assert!(matches!(pool.submit(item(9)).wait(), Err(RenderError::Disposed)));
        // Queued items were discarded, so only the two in flight ever ran.
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(gate.started.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn try_wait_is_non_blocking() {
        let gate = Arc::new(Gated::default());
        let pool = WorkerPool::with_kernel(1, Arc::clone(&gate));
        let fut = pool.submit(item(0));
        assert!(fut.try_wait().is_none());
        assert!(fut.wait_timeout(Duration::from_millis(5)).is_none());
        gate.release();
        assert!(fut.wait_timeout(Duration::from_secs(10)).is_some());
    }
}
