//! The `Deferred` launch strategy: a task is bound to a state but never
//! scheduled anywhere. [`crate::state::StateInner::wait`]/`wait_for` run it
//! inline, on whichever thread first waits.

use crate::state::{self, PolicyBit, SharedState, Task};

/// Binds `task` to a fresh state marked `Deferred`.
pub(crate) fn bind<T: Send + 'static>(task: Task<T>) -> SharedState<T> {
    state::new_bound_state(task, PolicyBit::DEFERRED)
}
