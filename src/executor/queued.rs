//! The `Queued` launch strategy: a single background worker draining a
//! FIFO queue of tasks, one at a time. Modeled on `futures-cpupool`'s
//! channel-driven worker (`Message::{Run,Close}` over an `mpsc` channel) —
//! see DESIGN.md.

use std::sync::{mpsc, Mutex, OnceLock};
use std::thread;

pub(crate) type Runnable = Box<dyn FnOnce() + Send>;

enum Message {
    Run(Runnable),
    Close,
}

/// A single worker thread draining a FIFO queue of tasks, one at a time.
/// Backs [`crate::Launch::QUEUED`]; the process-wide instance is reached
/// through [`global`].
pub struct QueuedExecutor {
    tx: Mutex<mpsc::Sender<Message>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl QueuedExecutor {
    /// Spawns the worker thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Message>();
        let worker = thread::Builder::new()
            .name("promissory-queued".into())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        Message::Run(task) => task(),
                        Message::Close => break,
                    }
                }
                log::trace!("queued executor worker exiting");
            })
            .expect("failed to spawn the queued executor's worker thread");
        QueuedExecutor {
            tx: Mutex::new(tx),
            worker: Some(worker),
        }
    }

    /// Appends `task` to the FIFO queue. Tasks already queued always run
    /// first; this executor never reorders or parallelizes.
    pub(crate) fn submit(&self, task: Runnable) {
        let _ = self.tx.lock().unwrap().send(Message::Run(task));
    }
}

impl Default for QueuedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for QueuedExecutor {
    /// Asks the worker to stop after draining what's queued, then joins it:
    /// the "worker stops cleanly on teardown" guarantee from spec.md §4.4.
    fn drop(&mut self) {
        let _ = self.tx.lock().unwrap().send(Message::Close);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

static GLOBAL: OnceLock<QueuedExecutor> = OnceLock::new();

/// The process-wide queued executor backing every `Launch::QUEUED` task.
/// Lazily started on first use and kept alive for the life of the process.
pub(crate) fn global() -> &'static QueuedExecutor {
    GLOBAL.get_or_init(QueuedExecutor::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn tasks_run_in_submission_order() {
        let executor = QueuedExecutor::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            executor.submit(Box::new(move || order.lock().unwrap().push(i)));
        }
        drop(executor); // flushes and joins the worker
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
