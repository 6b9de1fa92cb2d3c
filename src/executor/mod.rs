//! `spawn_async`'s policy resolution, and the shared state each launch
//! strategy binds its task to.
//!
//! Resolution order, from spec.md §4.4: a caller may request any
//! combination of [`Launch`] bits. This module checks them from most to
//! least specific — `Queued` and `ThreadPool` name a concrete, always-on
//! executor; `Async` degrades to `Deferred` if no thread can be spawned;
//! bare `Deferred` always succeeds; an empty mask is a caller error.

mod deferred;
mod pool;
mod queued;
mod thread;

pub use pool::ThreadPoolExecutor;
pub use queued::QueuedExecutor;

use crate::error::{Exception, FutureError, FutureErrc};
use crate::future::Future;
use crate::launch::Launch;
use crate::state::{self, PolicyBit, SharedState, Task};

/// Spawns `f` under the default policy (`Launch::ANY`: async-with-fallback,
/// then deferred).
pub fn spawn_async<F, T>(f: F) -> Future<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_async_with(Launch::ANY, f)
}

/// Spawns `f` under the policy named by `policy`. A panic inside `f`
/// becomes the future's exception, exactly like a value `f` returns
/// normally would not; there is no separate fallible form, since a
/// fallible `f` can simply return a `Result` as its `T`.
pub fn spawn_async_with<F, T>(policy: Launch, f: F) -> Future<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let task: Task<T> = Box::new(move || Ok(f()));
    match resolve(task, policy) {
        Some(state) => Future::from_state(state),
        None => Future::invalid(),
    }
}

/// Binds `task` to a state under the first executor `policy` names that
/// can actually accept it. A policy mask this module cannot satisfy at all
/// (an empty mask, per spec.md §4.4's resolution step 5) returns `None`, so
/// the caller hands back a genuinely stateless `Future` — the C++ original's
/// `return future<R>{};` — rather than a state that exists only to carry a
/// `NoState` exception. `Async` rejected with no `Deferred` fallback is a
/// different case (the state exists, a thread was attempted and failed) and
/// still reports through the state's exception slot.
fn resolve<T: Send + 'static>(task: Task<T>, policy: Launch) -> Option<SharedState<T>> {
    if policy.contains(Launch::QUEUED) {
        let state = state::new_bound_state(task, PolicyBit::QUEUED);
        let to_run = state.clone();
        queued::global().submit(Box::new(move || to_run.execute()));
        return Some(state);
    }
    if policy.contains(Launch::THREAD_POOL) {
        let state = state::new_bound_state(task, PolicyBit::THREAD_POOL);
        let to_run = state.clone();
        pool::global().submit(Box::new(move || to_run.execute()));
        return Some(state);
    }
    if policy.contains(Launch::ASYNC) {
        let state = state::new_bound_state(task, PolicyBit::NONE);
        match thread::spawn_detached(&state) {
            Ok(()) => return Some(state),
            Err(e) if policy.contains(Launch::DEFERRED) => {
                log::warn!(
                    "spawn_async: std::thread::spawn failed ({}), falling back to Launch::DEFERRED",
                    e
                );
                state.mark_deferred();
                return Some(state);
            }
            Err(e) => {
                log::error!("spawn_async: std::thread::spawn failed and no fallback was requested: {}", e);
                let _ = state.set_exception(errc(FutureErrc::NoState));
                return Some(state);
            }
        }
    }
    if policy.contains(Launch::DEFERRED) {
        return Some(deferred::bind(task));
    }
    debug_assert!(
        policy.is_empty(),
        "a non-empty Launch must contain one of the four bits checked above"
    );
    log::warn!("spawn_async_with: empty Launch policy; returning an invalid future");
    None
}

fn errc(e: FutureErrc) -> Exception {
    Exception::new(FutureError::from(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn spawn_async_runs_on_the_default_policy() {
        let f = spawn_async(|| 2 + 2);
        assert_eq!(f.get().unwrap(), 4);
    }

    #[test]
    fn spawn_async_with_deferred_runs_on_first_wait() {
        let f = spawn_async_with(Launch::DEFERRED, || 5);
        assert_eq!(
            f.wait_for(Duration::from_millis(5)).unwrap(),
            crate::launch::FutureStatus::Deferred
        );
        assert_eq!(f.get().unwrap(), 5);
    }

    #[test]
    fn spawn_async_with_queued_runs_off_thread() {
        let f = spawn_async_with(Launch::QUEUED, || std::thread::current().id());
        let here = std::thread::current().id();
        assert_ne!(f.get().unwrap(), here);
    }

    #[test]
    fn spawn_async_with_thread_pool_runs_off_thread() {
        let f = spawn_async_with(Launch::THREAD_POOL, || std::thread::current().id());
        let here = std::thread::current().id();
        assert_ne!(f.get().unwrap(), here);
    }

    #[test]
    fn spawn_async_panic_becomes_the_exception() {
        let f = spawn_async_with(Launch::ASYNC, || -> i32 { panic!("async boom") });
        let err = f.get().unwrap_err();
        assert!(err.to_string().contains("async boom"));
    }

    #[test]
    fn an_empty_policy_returns_a_genuinely_invalid_future() {
        let f = spawn_async_with(Launch::EMPTY, || 1);
        assert!(!f.is_valid());
        let err = f.get().unwrap_err();
        assert_eq!(
            err.to_string(),
            crate::error::FutureErrc::NoState.message()
        );
    }
}
