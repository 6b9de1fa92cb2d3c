//! A futures/promises concurrency primitive with blocking and
//! continuation-based observation.
//!
//! [`Promise<T>`] is the single producer handle for a value (or failure)
//! that is eventually delivered to one or more consumers: a one-shot
//! [`Future<T>`] obtained with `get_future()`, or, after calling
//! [`Future::share`], any number of [`SharedFuture<T>`] clones. Consumers
//! may block on `get`/`wait`, poll a deadline with `wait_for`, or register
//! a continuation with `then`. [`PackagedTask`] adapts a plain callable into
//! a promise, and [`spawn_async`]/[`spawn_async_with`] run a callable under
//! one of four [`Launch`] strategies (a dedicated thread, synchronously on
//! the first waiter, a single FIFO worker, or a fixed worker pool). The
//! [`when_all`]/[`when_any`] combinators fan a batch of futures into one.
//!
//! This is a blocking primitive, not an implementation of
//! `std::future::Future`: there is no `poll`, and no executor drives
//! progress except the four strategies named above.

mod error;
mod executor;
mod future;
mod launch;
mod packaged_task;
mod promise;
mod shared_future;
mod state;

pub mod combinators;

pub use error::{Exception, FutureErrc, FutureError, FutureResult};
pub use executor::{spawn_async, spawn_async_with, QueuedExecutor, ThreadPoolExecutor};
pub use future::Future;
pub use launch::{FutureStatus, Launch};
pub use packaged_task::PackagedTask;
pub use promise::Promise;
pub use shared_future::SharedFuture;

pub use combinators::{
    when_all, when_all2, when_all3, when_any, when_any2, when_any3, WhenAnyResult,
};

/// Builds an already-`Ready` future carrying `value`, with no promise or
/// executor involved.
pub fn make_ready_future<T: Send + 'static>(value: T) -> Future<T> {
    let promise = Promise::new();
    let future = promise
        .get_future()
        .expect("fresh promise has no attached future yet");
    let _ = promise.set_value(value);
    future
}

/// Builds an already-`Ready` future carrying no value, for `T = ()`.
pub fn make_ready_void_future() -> Future<()> {
    make_ready_future(())
}

/// Builds an already-`Ready` future carrying `exception` as its failure.
pub fn make_exceptional_future<T: Send + 'static>(exception: impl Into<Exception>) -> Future<T> {
    let promise = Promise::<T>::new();
    let future = promise
        .get_future()
        .expect("fresh promise has no attached future yet");
    let _ = promise.set_exception(exception);
    future
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn make_ready_future_is_immediately_ready() {
        let f = make_ready_future(5);
        assert_eq!(f.wait_for(Duration::ZERO).unwrap(), FutureStatus::Ready);
        assert_eq!(f.get().unwrap(), 5);
    }

    #[test]
    fn make_exceptional_future_rethrows_on_get() {
        let f: Future<i32> = make_exceptional_future(anyhow::anyhow!("precomputed failure"));
        assert_eq!(f.get().unwrap_err().to_string(), "precomputed failure");
    }

    #[test]
    fn s1_ready_value() {
        let p = Promise::<i32>::new();
        let f = p.get_future().unwrap();
        p.set_value(7).unwrap();
        assert_eq!(f.get().unwrap(), 7);
    }

    #[test]
    fn s2_broken_promise() {
        let p = Promise::<i32>::new();
        let f = p.get_future().unwrap();
        drop(p);
        let err = f.get().unwrap_err();
        assert_eq!(err.to_string(), FutureErrc::BrokenPromise.message());
    }

    #[test]
    fn s3_then_chain() {
        let f = make_ready_future(2)
            .then(|x| x.map(|v| v + 3))
            .then(|x| x.map(|v| v * 10));
        assert_eq!(f.get().unwrap(), 50);
    }

    #[test]
    fn s4_async_with_deferred() {
        use std::sync::{Arc, Mutex};

        let n = Arc::new(Mutex::new(0));
        let n2 = n.clone();
        let f = spawn_async_with(Launch::DEFERRED, move || {
            *n2.lock().unwrap() = 1;
            42
        });
        assert_eq!(*n.lock().unwrap(), 0);
        assert_eq!(f.wait_for(Duration::ZERO).unwrap(), FutureStatus::Deferred);
        assert_eq!(f.get().unwrap(), 42);
        assert_eq!(*n.lock().unwrap(), 1);
    }

    #[test]
    fn s5_when_all_vector() {
        let futures = vec![
            make_ready_future(1),
            make_ready_future(2),
            make_ready_future(3),
        ];
        let mut settled = when_all(futures).get().unwrap().into_iter();
        assert_eq!(settled.next().unwrap().get().unwrap(), 1);
        assert_eq!(settled.next().unwrap().get().unwrap(), 2);
        assert_eq!(settled.next().unwrap().get().unwrap(), 3);
    }

    #[test]
    fn s6_when_any_failure_then_success() {
        let pa = Promise::<i32>::new();
        let pb = Promise::<i32>::new();
        let fa = pa.get_future().unwrap();
        let fb = pb.get_future().unwrap();
        let w = when_any(vec![fa, fb]);
        pa.set_exception(anyhow::anyhow!("a failed")).unwrap();
        pb.set_value(9).unwrap();
        let mut result = w.get().unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.futures.remove(1).get().unwrap(), 9);
    }
}
