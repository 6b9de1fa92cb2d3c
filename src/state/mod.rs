//! The shared state every `Promise`/`Future`/`SharedFuture`/`PackagedTask`
//! handle is a reference to.
//!
//! This is the heart of the crate: a mutex/condvar-guarded status word, an
//! optional value, an optional exception, and an at-most-one-shot list of
//! continuations, all reached through an `Arc` so that retain/release is
//! just `Clone`/`Drop` rather than a hand-rolled atomic counter (see
//! DESIGN.md for why this supersedes the C++ original's intrusive refcount).

pub(crate) mod at_thread_exit;

use crate::error::{Exception, FutureErrc, FutureResult};
use crate::launch::FutureStatus;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};

mod status {
    pub const CONSTRUCTED: u8 = 1 << 0;
    pub const FUTURE_ATTACHED: u8 = 1 << 1;
    pub const READY: u8 = 1 << 2;
    pub const DEFERRED: u8 = 1 << 3;
    pub const QUEUED: u8 = 1 << 4;
    pub const THREAD_POOL: u8 = 1 << 5;
    pub const CONTINUATION_ATTACHED: u8 = 1 << 6;
}

/// A shared state reached through a task bound to one of the four launch
/// strategies: stores the callable until an executor (or the first waiter,
/// for `Deferred`) invokes it via [`StateInner::execute`].
pub(crate) type Task<T> = Box<dyn FnOnce() -> Result<T, Exception> + Send>;

/// Runs once, outside the state's mutex, when the state becomes ready.
/// Receives the exception slot by reference (`None` on success), mirroring
/// the original's "resume with the stored exception_ptr, or null" callback.
pub(crate) type Continuation = Box<dyn FnOnce(Option<&Exception>) + Send>;

struct Core<T> {
    status: u8,
    value: Option<T>,
    exception: Option<Arc<Exception>>,
    continuations: Vec<Continuation>,
    task: Option<Task<T>>,
}

impl<T> Default for Core<T> {
    fn default() -> Self {
        Core {
            status: 0,
            value: None,
            exception: None,
            continuations: Vec::new(),
            task: None,
        }
    }
}

/// A value settled once and read many times without re-acquiring the
/// state's mutex: backs [`StateInner::copy_value`] so that `SharedFuture`
/// clones on other threads never block on the producer's lock after the
/// first read has populated the cache.
enum Settled<T> {
    Value(T),
    Exception(Arc<Exception>),
}

/// The shared state itself. Always reached through `Arc<StateInner<T>>`;
/// that `Arc` *is* the reference count described in the data model, and its
/// `Drop` impl is the "last release" hook.
pub(crate) struct StateInner<T> {
    core: Mutex<Core<T>>,
    cv: Condvar,
    shared: OnceLock<Settled<T>>,
}

/// A handle to a shared state. An alias, not a newtype: `Arc::clone`,
/// `Arc::strong_count` and `Arc`'s `Drop` already implement this data
/// model's retain/release/use_count/on-last-release.
pub(crate) type SharedState<T> = Arc<StateInner<T>>;

pub(crate) fn new_state<T>() -> SharedState<T> {
    Arc::new(StateInner {
        core: Mutex::new(Core::default()),
        cv: Condvar::new(),
        shared: OnceLock::new(),
    })
}

/// Builds a state pre-bound to a task and marks it with the launch-policy
/// bit the caller names; `execute` later runs `task` and settles the state
/// with its outcome.
pub(crate) fn new_bound_state<T>(task: Task<T>, policy_bit: PolicyBit) -> SharedState<T> {
    let mut core = Core::default();
    core.task = Some(task);
    core.status |= policy_bit.0;
    Arc::new(StateInner {
        core: Mutex::new(core),
        cv: Condvar::new(),
        shared: OnceLock::new(),
    })
}

/// One of the three status bits a bound state can carry to mark which
/// executor owns it (`Deferred`, `Queued`, `ThreadPool` — `Async` tasks run
/// immediately on their own detached thread and need no bit, since nothing
/// ever has to ask "has this been picked up yet").
#[derive(Copy, Clone)]
pub(crate) struct PolicyBit(u8);

impl PolicyBit {
    pub(crate) const DEFERRED: PolicyBit = PolicyBit(status::DEFERRED);
    pub(crate) const QUEUED: PolicyBit = PolicyBit(status::QUEUED);
    pub(crate) const THREAD_POOL: PolicyBit = PolicyBit(status::THREAD_POOL);
    pub(crate) const NONE: PolicyBit = PolicyBit(0);
}

pub(crate) fn panic_to_exception(payload: Box<dyn std::any::Any + Send>) -> Exception {
    if let Some(s) = payload.downcast_ref::<&str>() {
        anyhow::anyhow!("task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        anyhow::anyhow!("task panicked: {}", s)
    } else {
        anyhow::anyhow!("task panicked")
    }
}

impl<T> StateInner<T> {
    /// Marks an `Async`-launched state as `Deferred` after the fact: used
    /// when `std::thread::spawn` itself fails, so the already-bound task
    /// falls back to running on the first waiter instead of being lost.
    pub(crate) fn mark_deferred(&self) {
        self.core.lock().unwrap().status |= status::DEFERRED;
    }

    /// `status & future_attached`, raised exactly once by `get_future`.
    pub(crate) fn mark_future_attached(&self) -> FutureResult<()> {
        let mut core = self.core.lock().unwrap();
        if core.status & status::FUTURE_ATTACHED != 0 {
            return Err(FutureErrc::FutureAlreadyRetrieved.into());
        }
        core.status |= status::FUTURE_ATTACHED;
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.core.lock().unwrap().status & status::READY != 0
    }

    /// True once a value or exception has been stored, even if `Ready` has
    /// not been raised yet (the `set_value_at_thread_exit` window).
    pub(crate) fn has_value(&self) -> bool {
        let core = self.core.lock().unwrap();
        core.value.is_some() || core.exception.is_some()
    }

    fn already_satisfied(core: &Core<T>) -> bool {
        core.value.is_some() || core.exception.is_some()
    }

    fn fulfill(&self, value: Option<T>, exception: Option<Arc<Exception>>) -> FutureResult<()> {
        let continuations;
        let stored_exception;
        {
            let mut core = self.core.lock().unwrap();
            if Self::already_satisfied(&core) {
                return Err(FutureErrc::PromiseAlreadySatisfied.into());
            }
            if value.is_some() {
                core.value = value;
                core.status |= status::CONSTRUCTED;
            } else {
                core.exception = exception;
            }
            core.status |= status::READY;
            continuations = std::mem::take(&mut core.continuations);
            stored_exception = core.exception.clone();
        }
        self.cv.notify_all();
        for cont in continuations {
            cont(stored_exception.as_deref());
        }
        Ok(())
    }

    pub(crate) fn set_value(&self, value: T) -> FutureResult<()> {
        self.fulfill(Some(value), None)
    }

    pub(crate) fn set_exception(&self, exception: Exception) -> FutureResult<()> {
        self.fulfill(None, Some(Arc::new(exception)))
    }

    /// Stores the value but does not raise `Ready`: per the resolved open
    /// question in DESIGN.md, `has_value()` becomes true immediately while
    /// `is_ready()`/`wait_for` stay false until the owning thread exits and
    /// `at_thread_exit::register`'s callback runs `make_ready`.
    pub(crate) fn set_value_at_thread_exit(self: &Arc<Self>, value: T) -> FutureResult<()>
    where
        T: Send + 'static,
    {
        {
            let mut core = self.core.lock().unwrap();
            if Self::already_satisfied(&core) {
                return Err(FutureErrc::PromiseAlreadySatisfied.into());
            }
            core.value = Some(value);
            core.status |= status::CONSTRUCTED;
        }
        at_thread_exit::register(self.clone());
        Ok(())
    }

    pub(crate) fn set_exception_at_thread_exit(self: &Arc<Self>, exception: Exception) -> FutureResult<()>
    where
        T: Send + 'static,
    {
        {
            let mut core = self.core.lock().unwrap();
            if Self::already_satisfied(&core) {
                return Err(FutureErrc::PromiseAlreadySatisfied.into());
            }
            core.exception = Some(Arc::new(exception));
        }
        at_thread_exit::register(self.clone());
        Ok(())
    }

    /// Raises `Ready` on a state whose value/exception is already stored,
    /// runs any attached continuations outside the mutex, and broadcasts the
    /// condvar. Called directly by the thread-exit hook; `fulfill` inlines
    /// the same sequence for the ordinary `set_value`/`set_exception` path.
    pub(crate) fn make_ready(&self) {
        let continuations;
        let stored_exception;
        {
            let mut core = self.core.lock().unwrap();
            if core.status & status::READY != 0 {
                return;
            }
            core.status |= status::READY;
            continuations = std::mem::take(&mut core.continuations);
            stored_exception = core.exception.clone();
        }
        self.cv.notify_all();
        for cont in continuations {
            cont(stored_exception.as_deref());
        }
    }

    /// Attaches `cont`. Runs it immediately (still outside the mutex) if the
    /// state is already ready; otherwise queues it to run from whichever of
    /// `fulfill`/`make_ready` settles the state. The slot is a `Vec`, not a
    /// single cell: `SharedFuture` clones may each attach their own
    /// continuation (the generalization recorded in DESIGN.md).
    pub(crate) fn attach_continuation(&self, cont: Continuation) {
        let mut core = self.core.lock().unwrap();
        core.status |= status::CONTINUATION_ATTACHED;
        if core.status & status::READY != 0 {
            let exception = core.exception.clone();
            drop(core);
            cont(exception.as_deref());
        } else {
            core.continuations.push(cont);
        }
    }

    /// Runs the bound task (if any), captures its outcome (including a
    /// panic, converted to an `Exception`), and settles the state with it.
    /// A state with no bound task reaching `execute` is a caller error: it
    /// can only happen if an executor queued a plain (unbound) state.
    pub(crate) fn execute(&self) {
        let task = {
            let mut core = self.core.lock().unwrap();
            core.task.take()
        };
        match task {
            Some(f) => match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(Ok(value)) => {
                    let _ = self.set_value(value);
                }
                Ok(Err(exception)) => {
                    let _ = self.set_exception(exception);
                }
                Err(payload) => {
                    let _ = self.set_exception(panic_to_exception(payload));
                }
            },
            None => log::error!("execute() invoked on a shared state with no bound task"),
        }
    }

    /// Blocks until `Ready`. A `Deferred` state instead runs its task inline
    /// on the calling thread the first time anyone waits on it.
    pub(crate) fn wait(&self) {
        let mut core = self.core.lock().unwrap();
        if core.status & status::DEFERRED != 0 {
            core.status &= !status::DEFERRED;
            drop(core);
            self.execute();
            return;
        }
        while core.status & status::READY == 0 {
            core = self.cv.wait(core).unwrap();
        }
    }

    /// A `Deferred` state reports `FutureStatus::Deferred` without running
    /// its task: only `wait`/`get` force deferred execution.
    pub(crate) fn wait_until(&self, deadline: Instant) -> FutureStatus {
        let mut core = self.core.lock().unwrap();
        if core.status & status::DEFERRED != 0 {
            return FutureStatus::Deferred;
        }
        loop {
            if core.status & status::READY != 0 {
                return FutureStatus::Ready;
            }
            let now = Instant::now();
            if now >= deadline {
                return FutureStatus::Timeout;
            }
            let (guard, timeout) = self.cv.wait_timeout(core, deadline - now).unwrap();
            core = guard;
            if timeout.timed_out() && core.status & status::READY == 0 {
                return FutureStatus::Timeout;
            }
        }
    }

    pub(crate) fn wait_for(&self, timeout: Duration) -> FutureStatus {
        self.wait_until(Instant::now() + timeout)
    }

    /// Consumes the value or exception by move. Only called through
    /// `Future::get`, which owns the only handle able to call it (a
    /// `SharedFuture` reads through [`StateInner::copy_value`] instead).
    pub(crate) fn take_value(&self) -> Result<T, Exception> {
        self.wait();
        let mut core = self.core.lock().unwrap();
        if let Some(exception) = core.exception.take() {
            return Err(Arc::try_unwrap(exception).unwrap_or_else(|shared| anyhow::anyhow!("{}", shared)));
        }
        Ok(core
            .value
            .take()
            .expect("ready state carries neither a value nor an exception"))
    }

    /// Reads the value or exception by reference, for `SharedFuture::get`.
    /// The first call migrates the value out of the mutex-guarded slot into
    /// a `OnceLock`, so every later call (from this or any other clone, on
    /// any thread) is a lock-free read.
    pub(crate) fn copy_value(&self) -> Result<&T, Exception> {
        self.wait();
        let settled = self.shared.get_or_init(|| {
            let mut core = self.core.lock().unwrap();
            if let Some(exception) = core.exception.take() {
                Settled::Exception(exception)
            } else {
                Settled::Value(
                    core.value
                        .take()
                        .expect("ready state carries neither a value nor an exception"),
                )
            }
        });
        match settled {
            Settled::Value(v) => Ok(v),
            Settled::Exception(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }
}

impl<T: Send + 'static> at_thread_exit::ReadyOnExit for StateInner<T> {
    fn fire(&self) {
        self.make_ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_not_ready() {
        let s: SharedState<i32> = new_state();
        assert!(!s.is_ready());
        assert!(!s.has_value());
    }

    #[test]
    fn set_value_wakes_a_waiter() {
        let s: SharedState<i32> = new_state();
        s.set_value(7).unwrap();
        assert!(s.is_ready());
        assert_eq!(s.take_value().unwrap(), 7);
    }

    #[test]
    fn double_set_value_is_promise_already_satisfied() {
        let s: SharedState<i32> = new_state();
        s.set_value(1).unwrap();
        let err = s.set_value(2).unwrap_err();
        assert_eq!(err.errc(), FutureErrc::PromiseAlreadySatisfied);
    }

    #[test]
    fn set_exception_is_rethrown_from_take_value() {
        let s: SharedState<i32> = new_state();
        s.set_exception(anyhow::anyhow!("boom")).unwrap();
        let err = s.take_value().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn continuation_attached_after_ready_runs_immediately() {
        let s: SharedState<i32> = new_state();
        s.set_value(3).unwrap();
        let ran = Arc::new(Mutex::new(false));
        let ran2 = ran.clone();
        s.attach_continuation(Box::new(move |exc| {
            assert!(exc.is_none());
            *ran2.lock().unwrap() = true;
        }));
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn continuation_attached_before_ready_runs_on_fulfill() {
        let s: SharedState<i32> = new_state();
        let ran = Arc::new(Mutex::new(false));
        let ran2 = ran.clone();
        s.attach_continuation(Box::new(move |_| {
            *ran2.lock().unwrap() = true;
        }));
        assert!(!*ran.lock().unwrap());
        s.set_value(1).unwrap();
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn deferred_state_runs_on_first_wait() {
        let ran = Arc::new(Mutex::new(false));
        let ran2 = ran.clone();
        let task: Task<i32> = Box::new(move || {
            *ran2.lock().unwrap() = true;
            Ok(42)
        });
        let s = new_bound_state(task, PolicyBit::DEFERRED);
        assert_eq!(
            s.wait_for(Duration::from_millis(10)),
            FutureStatus::Deferred
        );
        assert!(!*ran.lock().unwrap());
        assert_eq!(s.take_value().unwrap(), 42);
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn set_value_at_thread_exit_delays_readiness() {
        let s: SharedState<i32> = new_state();
        let s2 = s.clone();
        std::thread::spawn(move || {
            s2.set_value_at_thread_exit(5).unwrap();
            assert!(s2.has_value());
            assert!(!s2.is_ready());
        })
        .join()
        .unwrap();
        assert!(s.is_ready());
        assert_eq!(s.take_value().unwrap(), 5);
    }

    #[test]
    fn copy_value_is_readable_from_multiple_threads() {
        let s: SharedState<String> = new_state();
        s.set_value("hi".to_string()).unwrap();
        let a = s.clone();
        let b = s.clone();
        let ta = std::thread::spawn(move || a.copy_value().unwrap() as *const String as usize);
        let tb = std::thread::spawn(move || b.copy_value().unwrap() as *const String as usize);
        assert_eq!(ta.join().unwrap(), tb.join().unwrap());
        assert_eq!(s.copy_value().unwrap(), "hi");
    }
}
