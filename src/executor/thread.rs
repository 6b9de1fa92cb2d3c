//! The `Async` launch strategy: a dedicated, detached `std::thread` per
//! task.

use crate::state::SharedState;
use std::io;
use std::thread;

/// Spawns a detached thread that runs `state`'s bound task to completion.
/// Returns the `std::thread::Builder::spawn` error verbatim so the caller
/// can decide whether to fall back to [`crate::Launch::DEFERRED`].
pub(crate) fn spawn_detached<T>(state: &SharedState<T>) -> io::Result<()>
where
    T: Send + 'static,
{
    let state = state.clone();
    thread::Builder::new()
        .name("promissory-async".into())
        .spawn(move || state.execute())
        // The handle is dropped, not joined: the state itself, not this
        // handle, is what a waiter synchronizes on.
        .map(drop)
}
