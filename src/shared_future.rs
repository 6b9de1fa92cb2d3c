//! The multi-consumer observer side of a shared state.

use crate::error::{Exception, FutureErrc, FutureResult};
use crate::future::{Future, IntoThenFuture};
use crate::launch::FutureStatus;
use crate::promise::Promise;
use crate::state::SharedState;
use std::time::{Duration, Instant};

/// A cloneable observer of a shared state. Unlike [`Future<T>`], any number
/// of `SharedFuture` clones may read the same state, each attaching its own
/// continuation; `get` borrows rather than moves, so the underlying value
/// or exception stays put for the next clone to read.
pub struct SharedFuture<T> {
    state: Option<SharedState<T>>,
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        SharedFuture {
            state: self.state.clone(),
        }
    }
}

impl<T> SharedFuture<T> {
    pub(crate) fn from_state(state: SharedState<T>) -> Self {
        SharedFuture { state: Some(state) }
    }

    fn state(&self) -> FutureResult<&SharedState<T>> {
        self.state.as_ref().ok_or_else(|| FutureErrc::NoState.into())
    }

    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// Blocks until ready, then returns a reference to the settled value or
    /// a clone of the stored exception. Any number of clones, on any
    /// number of threads, may call this repeatedly.
    pub fn get(&self) -> Result<&T, Exception> {
        match &self.state {
            Some(state) => state.copy_value(),
            None => Err(Exception::new(crate::error::FutureError::from(
                FutureErrc::NoState,
            ))),
        }
    }

    pub fn wait(&self) -> FutureResult<()> {
        self.state()?.wait();
        Ok(())
    }

    pub fn wait_for(&self, timeout: Duration) -> FutureResult<FutureStatus> {
        Ok(self.state()?.wait_for(timeout))
    }

    /// Blocks until ready or `deadline` passes, whichever comes first. The
    /// absolute-deadline sibling of [`SharedFuture::wait_for`]'s relative
    /// timeout.
    pub fn wait_until(&self, deadline: Instant) -> FutureResult<FutureStatus> {
        Ok(self.state()?.wait_until(deadline))
    }

    /// Attaches a continuation to this clone's view of the state. Because a
    /// `SharedFuture::get` only ever borrows, chaining requires `T: Clone`:
    /// there is no way to hand a continuation ownership of a value every
    /// other clone still needs to read. If the upstream state failed, its
    /// exception propagates straight to the result and `f` is never invoked;
    /// only on success is `f` called with `Ok(value)`.
    pub fn then<F, R>(&self, f: F) -> Future<R::Value>
    where
        T: Clone + Send + 'static,
        F: FnOnce(Result<T, Exception>) -> R + Send + 'static,
        R: IntoThenFuture,
    {
        let promise = Promise::<R::Value>::new();
        let future = promise
            .get_future()
            .expect("fresh promise has no attached future yet");

        let state = match &self.state {
            Some(s) => s.clone(),
            None => {
                let _ = promise.set_exception(crate::error::FutureError::from(FutureErrc::NoState));
                return future;
            }
        };

        state.attach_continuation(Box::new(move |_exception| {
            match state.copy_value() {
                Ok(value) => {
                    let inner = f(Ok(value.clone())).into_then_future();
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
            }
        }));
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::Promise;

    #[test]
    fn share_then_get_from_two_clones() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let shared = f.share().unwrap();
        let other = shared.clone();
        p.set_value(9).unwrap();
        assert_eq!(*shared.get().unwrap(), 9);
        assert_eq!(*other.get().unwrap(), 9);
    }

    #[test]
    fn both_clones_observe_the_same_exception() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let shared = f.share().unwrap();
        let other = shared.clone();
        p.set_exception(anyhow::anyhow!("shared failure")).unwrap();
        assert_eq!(shared.get().unwrap_err().to_string(), "shared failure");
        assert_eq!(other.get().unwrap_err().to_string(), "shared failure");
    }

    #[test]
    fn each_clone_can_attach_its_own_continuation() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let shared = f.share().unwrap();
        let other = shared.clone();
        let a = shared.then(|r| r.map(|v| v + 1));
        let b = other.then(|r| r.map(|v| v * 10));
        p.set_value(4).unwrap();
        assert_eq!(a.get().unwrap(), 5);
        assert_eq!(b.get().unwrap(), 40);
    }

    #[test]
    fn then_never_invokes_f_when_upstream_failed() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        let shared = f.share().unwrap();
        let ran = std::sync::Arc::new(std::sync::Mutex::new(false));
        let ran2 = ran.clone();
        let chained = shared.then(move |r: Result<i32, Exception>| {
            *ran2.lock().unwrap() = true;
            r
        });
        p.set_exception(anyhow::anyhow!("shared nope")).unwrap();
        let err = chained.get().unwrap_err();
        assert_eq!(err.to_string(), "shared nope");
        assert!(!*ran.lock().unwrap());
    }
}
