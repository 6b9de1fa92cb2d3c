//! The `ThreadPool` launch strategy: a fixed-size worker pool plus a
//! manager thread that hands queued tasks to whichever worker most
//! recently reported itself idle, per spec.md §4.4. Grounded in the same
//! channel-per-worker shape `futures-cpupool`'s `CpuPool` uses for its
//! `Run`/`Close` messages (see DESIGN.md), generalized to many workers
//! instead of one queue shared by all of them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, OnceLock};
use std::thread;

pub(crate) type Runnable = Box<dyn FnOnce() + Send>;

/// Raised when a task is assigned directly to a worker that already has
/// one running. The manager's own bookkeeping (an idle-worker list it only
/// ever pops from) makes this unreachable in ordinary use; it exists so a
/// logic error surfaces loudly instead of silently dropping a task, per
/// spec.md §4.4's "worker rejects a second task with a logic error".
#[derive(Debug, thiserror::Error)]
#[error("thread pool worker already has a task assigned")]
pub struct WorkerBusy;

struct Worker {
    tx: mpsc::Sender<Runnable>,
    busy: AtomicBool,
}

impl Worker {
    fn try_assign(&self, task: Runnable) -> Result<(), WorkerBusy> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(WorkerBusy);
        }
        self.tx
            .send(task)
            .expect("thread pool worker thread exited while still registered idle");
        Ok(())
    }
}

struct Dispatch {
    queue: VecDeque<Runnable>,
    idle: Vec<usize>,
}

/// A fixed-size worker pool backing [`crate::Launch::THREAD_POOL`]: `W`
/// worker threads (`W` defaults to [`std::thread::available_parallelism`])
/// plus one manager thread that waits for "an idle worker and a queued
/// task both exist" and then pairs them up.
pub struct ThreadPoolExecutor {
    workers: Vec<Arc<Worker>>,
    dispatch: Arc<(Mutex<Dispatch>, Condvar)>,
}

impl ThreadPoolExecutor {
    /// Spawns a pool of `size` workers plus one manager thread.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "a thread pool needs at least one worker");
        let dispatch = Arc::new((
            Mutex::new(Dispatch {
                queue: VecDeque::new(),
                idle: (0..size).collect(),
            }),
            Condvar::new(),
        ));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let (tx, rx) = mpsc::channel::<Runnable>();
            let worker = Arc::new(Worker {
                tx,
                busy: AtomicBool::new(false),
            });
            let dispatch_for_worker = dispatch.clone();
            thread::Builder::new()
                .name(format!("promissory-pool-{id}"))
                .spawn(move || {
                    for task in rx {
                        task();
                        let (lock, cv) = &*dispatch_for_worker;
                        let mut guard = lock.lock().unwrap();
                        guard.idle.push(id);
                        drop(guard);
                        cv.notify_one();
                    }
                    log::trace!("thread pool worker {id} exiting");
                })
                .expect("failed to spawn a thread pool worker");
            workers.push(worker);
        }

        let pool = ThreadPoolExecutor { workers, dispatch };
        pool.spawn_manager();
        pool
    }

    fn spawn_manager(&self) {
        let dispatch = self.dispatch.clone();
        let workers = self.workers.clone();
        thread::Builder::new()
            .name("promissory-pool-manager".into())
            .spawn(move || {
                let (lock, cv) = &*dispatch;
                loop {
                    let mut guard = lock.lock().unwrap();
                    while guard.idle.is_empty() || guard.queue.is_empty() {
                        guard = cv.wait(guard).unwrap();
                    }
                    let worker_id = guard.idle.pop().expect("checked non-empty above");
                    let task = guard.queue.pop_front().expect("checked non-empty above");
                    drop(guard);
                    // The worker's own busy flag was cleared before it
                    // pushed itself onto `idle`, so this should never race.
                    if workers[worker_id].try_assign(task).is_err() {
                        log::error!("thread pool manager handed a task to a busy worker");
                    }
                }
            })
            .expect("failed to spawn the thread pool's manager thread");
    }

    /// Queues `task` for the manager to hand to the next idle worker.
    pub(crate) fn submit(&self, task: Runnable) {
        let (lock, cv) = &*self.dispatch;
        let mut guard = lock.lock().unwrap();
        guard.queue.push_back(task);
        drop(guard);
        cv.notify_one();
    }
}

static GLOBAL: OnceLock<ThreadPoolExecutor> = OnceLock::new();

/// The process-wide thread pool backing every `Launch::THREAD_POOL` task,
/// sized to [`std::thread::available_parallelism`] (falling back to one
/// worker if the host can't report it).
pub(crate) fn global() -> &'static ThreadPoolExecutor {
    GLOBAL.get_or_init(|| {
        let size = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ThreadPoolExecutor::new(size)
    })
}
