//! The single-consumer observer side of a shared state.

use crate::error::{Exception, FutureErrc, FutureResult};
use crate::launch::FutureStatus;
use crate::promise::Promise;
use crate::shared_future::SharedFuture;
use crate::state::SharedState;
use std::time::{Duration, Instant};

/// A one-shot, single-consumer observer of a shared state. `get`/`wait`
/// block the calling thread (there is no `poll`; this is not
/// `std::future::Future`). Once consumed by `get`, `then`, or `share`, the
/// handle is spent; a default-constructed or already-consumed `Future` has
/// no state and every operation on it fails with
/// [`FutureErrc::NoState`].
pub struct Future<T> {
    state: Option<SharedState<T>>,
}

impl<T> Future<T> {
    pub(crate) fn from_state(state: SharedState<T>) -> Self {
        Future { state: Some(state) }
    }

    /// A genuinely stateless future: `is_valid()` is `false` and every
    /// operation fails with [`FutureErrc::NoState`] without ever becoming
    /// `Ready`. Used where a policy resolution has no executor to hand the
    /// task to at all (`examples/original_source/future/future.hpp`'s
    /// `return future<R>{};`), as opposed to a future whose state exists but
    /// has already settled with an error.
    pub(crate) fn invalid() -> Self {
        Future { state: None }
    }

    fn state(&self) -> FutureResult<&SharedState<T>> {
        self.state.as_ref().ok_or_else(|| FutureErrc::NoState.into())
    }

    /// Whether this handle still refers to a shared state.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// Blocks until ready, then returns the value or propagates whatever
    /// was stored on the exception slot (a user failure, a captured panic,
    /// or [`FutureErrc::BrokenPromise`]).
    pub fn get(mut self) -> Result<T, Exception> {
        match self.state.take() {
            Some(state) => state.take_value(),
            None => Err(Exception::new(crate::error::FutureError::from(
                FutureErrc::NoState,
            ))),
        }
    }

    /// Blocks until ready without consuming the value.
    pub fn wait(&self) -> FutureResult<()> {
        self.state()?.wait();
        Ok(())
    }

    /// Blocks until ready or `timeout` elapses, whichever comes first.
    pub fn wait_for(&self, timeout: Duration) -> FutureResult<FutureStatus> {
        Ok(self.state()?.wait_for(timeout))
    }

    /// Blocks until ready or `deadline` passes, whichever comes first. The
    /// absolute-deadline sibling of [`Future::wait_for`]'s relative timeout.
    pub fn wait_until(&self, deadline: Instant) -> FutureResult<FutureStatus> {
        Ok(self.state()?.wait_until(deadline))
    }

    /// Attaches a continuation that runs once this future becomes ready,
    /// producing a new future chained to its outcome. If the upstream future
    /// failed, its exception propagates straight to the result and `f` is
    /// never invoked; only on success is `f` called with `Ok(value)`. `f`
    /// must return either a plain `Result<R, Exception>` (wrapped as an
    /// immediately-settled future) or another [`Future<R>`] (flattened into
    /// the result, so a `then` chain never produces `Future<Future<R>>`) —
    /// mirroring `futures` 0.1's `IntoFuture`, which this crate's
    /// [`IntoThenFuture`] plays the same role as.
    pub fn then<F, R>(self, f: F) -> Future<R::Value>
    where
        T: Send + 'static,
        F: FnOnce(Result<T, Exception>) -> R + Send + 'static,
        R: IntoThenFuture,
    {
        let promise = Promise::<R::Value>::new();
        let future = promise
            .get_future()
            .expect("fresh promise has no attached future yet");
        self.subscribe(move |outcome| match outcome {
            Ok(value) => {
                let inner = f(Ok(value)).into_then_future();
                inner.subscribe(move |r| match r {
                    Ok(v) => {
                        let _ = promise.set_value(v);
                    }
                    Err(e) => {
                        let _ = promise.set_exception(e);
                    }
                });
            }
            Err(e) => {
                let _ = promise.set_exception(e);
            }
        });
        future
    }

    /// Runs `f` with the eventual outcome, without producing a further
    /// chained future. The primitive `then` itself is built on.
    pub(crate) fn subscribe<F>(mut self, f: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, Exception>) + Send + 'static,
    {
        let state = match self.state.take() {
            Some(s) => s,
            None => {
                f(Err(Exception::new(crate::error::FutureError::from(
                    FutureErrc::NoState,
                ))));
                return;
            }
        };
        state.attach_continuation(Box::new(move |_exception| {
            let outcome = state.take_value();
            f(outcome);
        }));
    }

    /// Attaches a continuation that only observes success/failure — it
    /// receives the exception slot exactly like
    /// [`crate::state::StateInner::attach_continuation`], but unlike
    /// `subscribe`/`then` it does not consume `self` or take the stored
    /// value. [`crate::combinators`] builds `when_all`/`when_any` on this:
    /// the fan-in continuation only needs to know *that* an input settled,
    /// while the value stays untouched for the caller to `get()` later from
    /// the same `Future` handle.
    pub(crate) fn observe_ready<F>(&self, f: F) -> FutureResult<()>
    where
        F: FnOnce(Option<&Exception>) + Send + 'static,
    {
        let state = self.state()?.clone();
        state.attach_continuation(Box::new(f));
        Ok(())
    }

    /// Converts this future into a [`SharedFuture<T>`], which may be cloned
    /// and observed from multiple places. The original `Future` is
    /// consumed; it is not left pointing at the (still shared) state.
    pub fn share(mut self) -> FutureResult<SharedFuture<T>>
    where
        T: Send + 'static,
    {
        let state = self.state.take().ok_or(FutureErrc::NoState)?;
        Ok(SharedFuture::from_state(state))
    }
}

/// Types a `then` callback may return: either a plain `Result`, wrapped as
/// an already-settled future, or another `Future`, which is flattened into
/// the chain. There is deliberately no blanket impl for every `R`: Rust has
/// no stable way to special-case `Future<U>` inside such a blanket (no
/// negative impls), so — exactly like `futures` 0.1's `IntoFuture` in the
/// pack — only these two concrete shapes opt in.
pub trait IntoThenFuture: Send + 'static {
    type Value: Send + 'static;
    fn into_then_future(self) -> Future<Self::Value>;
}

impl<U: Send + 'static> IntoThenFuture for Future<U> {
    type Value = U;
    fn into_then_future(self) -> Future<U> {
        self
    }
}

impl<U: Send + 'static> IntoThenFuture for Result<U, Exception> {
    type Value = U;
    fn into_then_future(self) -> Future<U> {
        match self {
            Ok(v) => crate::make_ready_future(v),
            Err(e) => crate::make_exceptional_future(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::Promise;

    #[test]
    fn get_on_broken_promise_is_an_error() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        drop(p);
        assert!(f.get().is_err());
    }

    #[test]
    fn wait_for_before_ready_times_out() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        assert_eq!(
            f.wait_for(Duration::from_millis(5)).unwrap(),
            FutureStatus::Timeout
        );
        p.set_value(1).unwrap();
        assert_eq!(f.get().unwrap(), 1);
    }

    #[test]
    fn wait_until_a_past_deadline_times_out_without_blocking() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        assert_eq!(
            f.wait_until(std::time::Instant::now()).unwrap(),
            FutureStatus::Timeout
        );
        p.set_value(1).unwrap();
        assert_eq!(f.get().unwrap(), 1);
    }

    #[test]
    fn then_maps_a_plain_result() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let chained = f.then(|r| r.map(|v| v + 1));
        p.set_value(41).unwrap();
        assert_eq!(chained.get().unwrap(), 42);
    }

    #[test]
    fn then_flattens_a_returned_future() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let chained = f.then(|r| {
            let v = r.unwrap();
            crate::make_ready_future(v * 2)
        });
        p.set_value(5).unwrap();
        assert_eq!(chained.get().unwrap(), 10);
    }

    #[test]
    fn then_propagates_upstream_exception() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let chained = f.then(|r: Result<i32, Exception>| r);
        p.set_exception(anyhow::anyhow!("nope")).unwrap();
        let err = chained.get().unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn then_never_invokes_f_when_upstream_failed() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let ran = std::sync::Arc::new(std::sync::Mutex::new(false));
        let ran2 = ran.clone();
        let chained = f.then(move |r: Result<i32, Exception>| {
            *ran2.lock().unwrap() = true;
            r
        });
        p.set_exception(anyhow::anyhow!("nope")).unwrap();
        let err = chained.get().unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(!*ran.lock().unwrap());
    }
}
