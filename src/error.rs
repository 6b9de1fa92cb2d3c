//! The library's closed error taxonomy.
//!
//! Every fallible operation on a [`Promise`](crate::Promise),
//! [`Future`](crate::Future), [`SharedFuture`](crate::SharedFuture) or
//! [`PackagedTask`](crate::PackagedTask) fails with one of the four kinds in
//! [`FutureErrc`], wrapped in a [`FutureError`]. This mirrors the fixed,
//! closed taxonomy of `std::future_errc` in the C++ original; a user-supplied
//! computation's own failure is carried separately, as an
//! [`Exception`](crate::Exception).

use thiserror::Error;

/// The kind of protocol violation a [`FutureError`] reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FutureErrc {
    /// A second `get_future()` was requested from the same promise.
    FutureAlreadyRetrieved,
    /// A second `set_value`/`set_exception` landed on an already-satisfied state.
    PromiseAlreadySatisfied,
    /// The handle has no associated shared state (default-constructed, moved
    /// from, or already consumed).
    NoState,
    /// The promise was destroyed without being fulfilled while a future still
    /// observed its state.
    BrokenPromise,
}

impl FutureErrc {
    /// The fixed message associated with this error kind.
    pub fn message(self) -> &'static str {
        match self {
            FutureErrc::FutureAlreadyRetrieved => "future already retrieved",
            FutureErrc::PromiseAlreadySatisfied => "promise already satisfied",
            FutureErrc::NoState => "no associated state",
            FutureErrc::BrokenPromise => "broken promise",
        }
    }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[error("{}", .errc.message())]
pub struct FutureError {
    errc: FutureErrc,
}

impl FutureError {
    /// Constructs a new [`FutureError`] from its [`FutureErrc`] kind.
    pub fn new(errc: FutureErrc) -> Self {
        Self { errc }
    }

    /// Returns the error kind carried by this error.
    pub fn errc(&self) -> FutureErrc {
        self.errc
    }
}

impl From<FutureErrc> for FutureError {
    fn from(errc: FutureErrc) -> Self {
        Self::new(errc)
    }
}

/// A type-erased failure produced by user code running on a shared state:
/// a panic caught from an executor-run closure, or a failure explicitly
/// reported through [`Promise::set_exception`](crate::Promise::set_exception).
///
/// This plays the role of C++'s `std::exception_ptr`: the shared state does
/// not know or care what concrete error type a continuation or task throws,
/// only that it can be displayed and propagated.
pub type Exception = anyhow::Error;

/// Result alias used throughout the crate for library-protocol-fallible
/// operations (as opposed to user computations, which fail via
/// [`Exception`]).
pub type FutureResult<T> = Result<T, FutureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_spec() {
        assert_eq!(
            FutureErrc::FutureAlreadyRetrieved.message(),
            "future already retrieved"
        );
        assert_eq!(
            FutureErrc::PromiseAlreadySatisfied.message(),
            "promise already satisfied"
        );
        assert_eq!(FutureErrc::NoState.message(), "no associated state");
        assert_eq!(FutureErrc::BrokenPromise.message(), "broken promise");
    }

    #[test]
    fn error_displays_its_message() {
        let e: FutureError = FutureErrc::BrokenPromise.into();
        assert_eq!(e.to_string(), "broken promise");
        assert_eq!(e.errc(), FutureErrc::BrokenPromise);
    }
}
