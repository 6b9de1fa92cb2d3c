//! Runs a handful of tasks through each launch strategy and logs their
//! outcomes. `RUST_LOG=promissory=trace cargo run --example pool_demo` shows
//! the thread pool manager handing off work to idle workers.

use promissory::{spawn_async_with, when_all, Launch};

fn main() {
    env_logger::init();

    let futures: Vec<_> = (0..4)
        .map(|i| spawn_async_with(Launch::THREAD_POOL, move || i * i))
        .collect();

    let settled = when_all(futures).get().expect("when_all never fails here");
    for f in settled {
        log::info!("task settled with {}", f.get().unwrap());
    }
}
