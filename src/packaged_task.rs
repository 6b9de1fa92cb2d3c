//! Adapts an arbitrary callable into a promise: invoking it settles its own
//! shared state instead of returning a plain value.
//!
//! The C++ original is `packaged_task<R(Args...)>`, generic over an
//! argument list via variadic templates. Rust has no stable equivalent of
//! that, so (as with `std::thread::spawn` elsewhere in the standard
//! library) a `PackagedTask` wraps a zero-argument `FnMut() -> R`; callers
//! curry any arguments into the closure themselves. Small-buffer storage
//! for the callable is likewise not modeled — see DESIGN.md.

use crate::error::FutureResult;
use crate::future::Future;
use crate::promise::Promise;
use crate::state::panic_to_exception;
use std::panic::{self, AssertUnwindSafe};

/// A movable, non-copyable callable-to-promise adapter. `call` invokes the
/// wrapped callable and settles this task's promise with its outcome (or a
/// captured panic); `reset` rearms it with a fresh shared state so the same
/// callable can be invoked again.
pub struct PackagedTask<F, R> {
    callable: F,
    promise: Promise<R>,
}

impl<F, R> PackagedTask<F, R>
where
    F: FnMut() -> R + Send + 'static,
    R: Send + 'static,
{
    /// Wraps `callable` with a fresh promise.
    pub fn new(callable: F) -> Self {
        PackagedTask {
            callable,
            promise: Promise::new(),
        }
    }

    /// Retrieves the future observing this task's current shared state.
    /// As with `Promise::get_future`, this may only succeed once per
    /// `new`/`reset` cycle.
    pub fn get_future(&self) -> FutureResult<Future<R>> {
        self.promise.get_future()
    }

    /// Invokes the callable and settles the promise with its return value,
    /// or with a captured panic. Fails with `PromiseAlreadySatisfied` if
    /// already invoked since the last `new`/`reset`.
    pub fn call(&mut self) -> FutureResult<()> {
        let callable = &mut self.callable;
        match panic::catch_unwind(AssertUnwindSafe(|| callable())) {
            Ok(value) => self.promise.set_value(value),
            Err(payload) => self.promise.set_exception(panic_to_exception(payload)),
        }
    }

    /// Invokes the callable like [`PackagedTask::call`], but defers raising
    /// `Ready` on the promise's state until the calling thread exits
    /// (`Promise::set_value_at_thread_exit`/`set_exception_at_thread_exit`),
    /// mirroring the C++ original's `make_ready_at_thread_exit`.
    pub fn call_at_thread_exit(&mut self) -> FutureResult<()> {
        let callable = &mut self.callable;
        match panic::catch_unwind(AssertUnwindSafe(|| callable())) {
            Ok(value) => self.promise.set_value_at_thread_exit(value),
            Err(payload) => self
                .promise
                .set_exception_at_thread_exit(panic_to_exception(payload)),
        }
    }

    /// Rearms this task with a fresh shared state, so the same callable can
    /// be invoked again.
    pub fn reset(&mut self) {
        self.promise = Promise::new();
    }
}
