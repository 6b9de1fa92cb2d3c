//! Launch policy bitmask and the status values a `wait_for`/`wait_until`
//! can report.

use std::ops::{BitOr, BitOrAssign};

/// A bitmask of execution strategies a task may be launched with.
///
/// Mirrors `std::launch` from the C++ original: a bitset rather than an
/// enum, so a caller can express "either of these is fine"
/// (`Launch::ASYNC | Launch::DEFERRED`, i.e. [`Launch::ANY`]) and let the
/// executor pick per the resolution order in [`crate::executor::resolve`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Launch(u8);

impl Launch {
    const ASYNC_BIT: u8 = 1 << 0;
    const DEFERRED_BIT: u8 = 1 << 1;
    const QUEUED_BIT: u8 = 1 << 2;
    const THREAD_POOL_BIT: u8 = 1 << 3;

    /// Run on a dedicated, detached `std::thread`.
    pub const ASYNC: Launch = Launch(Self::ASYNC_BIT);
    /// Run synchronously on the first waiter.
    pub const DEFERRED: Launch = Launch(Self::DEFERRED_BIT);
    /// Run on a single-worker FIFO queue.
    pub const QUEUED: Launch = Launch(Self::QUEUED_BIT);
    /// Run on a fixed-size worker pool.
    pub const THREAD_POOL: Launch = Launch(Self::THREAD_POOL_BIT);
    /// `ASYNC | DEFERRED`: the default policy for `spawn_async`.
    pub const ANY: Launch = Launch(Self::ASYNC_BIT | Self::DEFERRED_BIT);
    /// No strategy at all. Not constructible outside the crate (every
    /// public constant sets at least one bit); used by
    /// [`crate::executor::resolve`]'s tests to exercise spec.md §4.4's
    /// resolution step 5 ("return an invalid future").
    pub(crate) const EMPTY: Launch = Launch(0);

    /// Returns whether `self` contains every bit set in `other`.
    pub fn contains(self, other: Launch) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Whether `self` names no strategy at all. [`crate::executor::resolve`]
    /// reaches its final branch only when this holds, since every other
    /// reachable `Launch` value contains at least one of the four bits
    /// checked earlier in its `if` chain.
    pub(crate) fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for Launch {
    /// Defaults to [`Launch::ANY`], matching `spawn_async(f, args...)`'s
    /// unqualified form in spec.md §6.
    fn default() -> Self {
        Launch::ANY
    }
}

impl BitOr for Launch {
    type Output = Launch;
    fn bitor(self, rhs: Launch) -> Launch {
        Launch(self.0 | rhs.0)
    }
}

impl BitOrAssign for Launch {
    fn bitor_assign(&mut self, rhs: Launch) {
        self.0 |= rhs.0;
    }
}

/// The outcome of `wait_for`/`wait_until` on a [`Future`](crate::Future) or
/// [`SharedFuture`](crate::SharedFuture).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FutureStatus {
    /// The state became ready before the deadline.
    Ready,
    /// The deadline elapsed with no value or exception set.
    Timeout,
    /// The state is bound to [`Launch::DEFERRED`] and has not yet been
    /// executed by a waiter; no work has happened.
    Deferred,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_contains_async_and_deferred_only() {
        assert!(Launch::ANY.contains(Launch::ASYNC));
        assert!(Launch::ANY.contains(Launch::DEFERRED));
        assert!(!Launch::ANY.contains(Launch::QUEUED));
        assert!(!Launch::ANY.contains(Launch::THREAD_POOL));
    }

    #[test]
    fn bitor_combines_policies() {
        let p = Launch::QUEUED | Launch::THREAD_POOL;
        assert!(p.contains(Launch::QUEUED));
        assert!(p.contains(Launch::THREAD_POOL));
        assert!(!p.contains(Launch::ASYNC));
    }

    #[test]
    fn default_is_any() {
        assert_eq!(Launch::default(), Launch::ANY);
    }
}
