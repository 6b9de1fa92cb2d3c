//! Fan-in combinators over [`crate::Future`]: [`when_all`] waits for every
//! input to settle, [`when_any`] waits for the first success (or, failing
//! that, for every input to fail). Both come in a vector-shaped form (any
//! number of futures of one type) and fixed-arity tuple forms (futures of
//! different types) — see `when_all.rs`/`when_any.rs` and DESIGN.md for why
//! the tuple forms stop at three elements instead of the spec's "arbitrary
//! arity parameter pack": Rust has no variadic generics.

mod when_all;
mod when_any;

pub use when_all::{when_all, when_all2, when_all3};
pub use when_any::{when_any, when_any2, when_any3, WhenAnyResult};
