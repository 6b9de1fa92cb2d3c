//! The producer side of a shared state.

use crate::error::{Exception, FutureErrc, FutureResult};
use crate::future::Future;
use crate::state::{self, SharedState};

/// The single producer handle for a shared state. Exactly one [`Future`] can
/// be retrieved from a given `Promise` (a second `get_future` call fails
/// with [`FutureErrc::FutureAlreadyRetrieved`]); fulfilling it is a one-shot
/// operation enforced by [`FutureErrc::PromiseAlreadySatisfied`].
///
/// Dropping a `Promise` that never set a value or exception, while a
/// `Future`/`SharedFuture` still observes the state, stores
/// [`FutureErrc::BrokenPromise`] as the state's exception so the waiting
/// side doesn't block forever.
pub struct Promise<T> {
    state: SharedState<T>,
}

impl<T> Promise<T> {
    /// Creates a promise with a fresh, unattached shared state.
    pub fn new() -> Self {
        Promise {
            state: state::new_state(),
        }
    }

    /// Retrieves the single [`Future`] observing this promise's state.
    /// Fails if called more than once.
    pub fn get_future(&self) -> FutureResult<Future<T>>
    where
        T: Send + 'static,
    {
        self.state.mark_future_attached()?;
        Ok(Future::from_state(self.state.clone()))
    }

    /// Fulfills the state with a value. Fails if already satisfied.
    pub fn set_value(&self, value: T) -> FutureResult<()> {
        self.state.set_value(value)
    }

    /// Fulfills the state with an exception. Fails if already satisfied.
    pub fn set_exception(&self, exception: impl Into<Exception>) -> FutureResult<()> {
        self.state.set_exception(exception.into())
    }

    /// Stores a value but defers raising `Ready` until the calling thread
    /// exits, per [`crate::state::at_thread_exit`].
    pub fn set_value_at_thread_exit(&self, value: T) -> FutureResult<()>
    where
        T: Send + 'static,
    {
        self.state.set_value_at_thread_exit(value)
    }

    /// Stores an exception but defers raising `Ready` until the calling
    /// thread exits.
    pub fn set_exception_at_thread_exit(&self, exception: impl Into<Exception>) -> FutureResult<()>
    where
        T: Send + 'static,
    {
        self.state.set_exception_at_thread_exit(exception.into())
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // If some other handle (a Future, a SharedFuture clone, or an
        // in-flight continuation) still shares this state and nobody ever
        // fulfilled it, the waiting side would block forever without this.
        if std::sync::Arc::strong_count(&self.state) > 1 && !self.state.has_value() {
            let broken: crate::error::FutureError = FutureErrc::BrokenPromise.into();
            let _ = self.state.set_exception(Exception::new(broken));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_then_get_future_roundtrips() {
        let p = Promise::new();
        p.set_value(10).unwrap();
        let f = p.get_future().unwrap();
        assert_eq!(f.get().unwrap(), 10);
    }

    #[test]
    fn second_get_future_fails() {
        let p: Promise<i32> = Promise::new();
        let _f = p.get_future().unwrap();
        let err = p.get_future().unwrap_err();
        assert_eq!(err.errc(), FutureErrc::FutureAlreadyRetrieved);
    }

    #[test]
    fn double_set_value_fails() {
        let p = Promise::new();
        p.set_value(1).unwrap();
        let err = p.set_value(2).unwrap_err();
        assert_eq!(err.errc(), FutureErrc::PromiseAlreadySatisfied);
    }

    #[test]
    fn dropping_unfulfilled_promise_breaks_its_future() {
        let p: Promise<i32> = Promise::new();
        let f = p.get_future().unwrap();
        drop(p);
        let err = f.get().unwrap_err();
        assert_eq!(err.to_string(), "broken promise");
    }

    #[test]
    fn dropping_unfulfilled_promise_with_no_future_is_silent() {
        let p: Promise<i32> = Promise::new();
        drop(p);
    }
}
