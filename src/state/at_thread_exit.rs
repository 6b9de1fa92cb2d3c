//! Thread-local registry backing `set_value_at_thread_exit`/
//! `set_exception_at_thread_exit`: marks registered states ready when the
//! thread that bound them tears down, the way the original's TLS
//! destructor walks its own registered list on thread exit.

use std::cell::RefCell;
use std::sync::Arc;

/// A shared state that can be forced ready from outside, without knowing
/// its value type. Implemented for every `StateInner<T>` in `state::mod`.
pub(crate) trait ReadyOnExit: Send + Sync {
    fn fire(&self);
}

#[derive(Default)]
struct Registry {
    pending: Vec<Arc<dyn ReadyOnExit>>,
}

impl Drop for Registry {
    fn drop(&mut self) {
        for state in self.pending.drain(..) {
            log::trace!("thread exiting: releasing a state deferred until thread exit");
            state.fire();
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// Registers `state` to be marked ready when the current thread exits.
pub(crate) fn register<T: Send + 'static>(state: Arc<T>)
where
    T: ReadyOnExit,
{
    REGISTRY.with(|r| r.borrow_mut().pending.push(state));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Flag(Arc<Mutex<bool>>);
    impl ReadyOnExit for Flag {
        fn fire(&self) {
            *self.0.lock().unwrap() = true;
        }
    }

    #[test]
    fn registered_state_fires_on_thread_exit() {
        let flag = Arc::new(Mutex::new(false));
        let flag2 = flag.clone();
        std::thread::spawn(move || {
            register(Arc::new(Flag(flag2)));
        })
        .join()
        .unwrap();
        assert!(*flag.lock().unwrap());
    }
}
