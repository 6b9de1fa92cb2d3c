//! `when_all`: settles only once every input future has settled, reporting
//! the first exception observed in arrival order if any input failed.

use crate::error::Exception;
use crate::future::Future;
use crate::promise::Promise;
use std::sync::{Arc, Mutex};

/// Waits for every future in `futures` to settle, then resolves to the same
/// futures (now all ready — each still carries its own value or exception,
/// readable with a further `get()`) in their original input order.
///
/// Settles with the *first* exception observed in arrival order if any
/// input failed (spec.md §4.5's when_all tie-break rule); otherwise with
/// the full vector.
pub fn when_all<T>(futures: Vec<Future<T>>) -> Future<Vec<Future<T>>>
where
    T: Send + 'static,
{
    let total = futures.len();
    let promise = Promise::<Vec<Future<T>>>::new();
    let result = promise
        .get_future()
        .expect("fresh promise has no attached future yet");
    if total == 0 {
        let _ = promise.set_value(Vec::new());
        return result;
    }

    let ctx = Arc::new(Mutex::new(AllContext {
        remaining: total,
        exception: None,
        futures: None,
        delivered: false,
    }));
    let promise = Arc::new(Mutex::new(Some(promise)));

    // Attach every continuation first, while the futures are still owned
    // locally: a future that is already ready fires its continuation
    // synchronously from inside `observe_ready`, and that continuation must
    // never find `ctx.futures` half-populated.
    for future in &futures {
        let ctx = ctx.clone();
        let promise = promise.clone();
        let _ = future.observe_ready(move |exception| {
            {
                let mut guard = ctx.lock().unwrap();
                if let Some(e) = exception {
                    if guard.exception.is_none() {
                        guard.exception = Some(anyhow::anyhow!("{}", e));
                    }
                }
                guard.remaining -= 1;
            }
            maybe_finish(&ctx, &promise);
        });
    }

    ctx.lock().unwrap().futures = Some(futures);
    maybe_finish(&ctx, &promise);

    result
}

struct AllContext<T> {
    remaining: usize,
    exception: Option<Exception>,
    futures: Option<Vec<Future<T>>>,
    delivered: bool,
}

fn maybe_finish<T: Send + 'static>(
    ctx: &Arc<Mutex<AllContext<T>>>,
    promise: &Arc<Mutex<Option<Promise<Vec<Future<T>>>>>>,
) {
    let mut guard = ctx.lock().unwrap();
    if guard.delivered || guard.remaining != 0 || guard.futures.is_none() {
        return;
    }
    guard.delivered = true;
    let exception = guard.exception.take();
    let futures = guard.futures.take().unwrap();
    drop(guard);

    if let Some(p) = promise.lock().unwrap().take() {
        match exception {
            Some(e) => {
                let _ = p.set_exception(e);
            }
            None => {
                let _ = p.set_value(futures);
            }
        }
    }
}

/// Tuple-shaped `when_all` for two futures of possibly different types.
/// Settles with `(a, b)` once both are ready, or with the first-observed
/// exception if either failed.
pub fn when_all2<A, B>(a: Future<A>, b: Future<B>) -> Future<(Future<A>, Future<B>)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let promise = Promise::<(Future<A>, Future<B>)>::new();
    let result = promise
        .get_future()
        .expect("fresh promise has no attached future yet");

    let ctx = Arc::new(Mutex::new(Tuple2Context {
        remaining: 2,
        exception: None,
        slots: None,
        delivered: false,
    }));
    let promise = Arc::new(Mutex::new(Some(promise)));

    attach(&a, ctx.clone(), promise.clone());
    attach(&b, ctx.clone(), promise.clone());

    ctx.lock().unwrap().slots = Some((a, b));
    maybe_finish2(&ctx, &promise);

    result
}

struct Tuple2Context<A, B> {
    remaining: u8,
    exception: Option<Exception>,
    slots: Option<(Future<A>, Future<B>)>,
    delivered: bool,
}

fn attach<T, A, B>(
    future: &Future<T>,
    ctx: Arc<Mutex<Tuple2Context<A, B>>>,
    promise: Arc<Mutex<Option<Promise<(Future<A>, Future<B>)>>>>,
) where
    T: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
{
    let _ = future.observe_ready(move |exception| {
        {
            let mut guard = ctx.lock().unwrap();
            if let Some(e) = exception {
                if guard.exception.is_none() {
                    guard.exception = Some(anyhow::anyhow!("{}", e));
                }
            }
            guard.remaining -= 1;
        }
        maybe_finish2(&ctx, &promise);
    });
}

fn maybe_finish2<A: Send + 'static, B: Send + 'static>(
    ctx: &Arc<Mutex<Tuple2Context<A, B>>>,
    promise: &Arc<Mutex<Option<Promise<(Future<A>, Future<B>)>>>>,
) {
    let mut guard = ctx.lock().unwrap();
    if guard.delivered || guard.remaining != 0 || guard.slots.is_none() {
        return;
    }
    guard.delivered = true;
    let exception = guard.exception.take();
    let slots = guard.slots.take().unwrap();
    drop(guard);

    if let Some(p) = promise.lock().unwrap().take() {
        match exception {
            Some(e) => {
                let _ = p.set_exception(e);
            }
            None => {
                let _ = p.set_value(slots);
            }
        }
    }
}

/// Tuple-shaped `when_all` for three futures of possibly different types.
/// Same semantics as [`when_all2`], generalized to arity three.
pub fn when_all3<A, B, C>(
    a: Future<A>,
    b: Future<B>,
    c: Future<C>,
) -> Future<(Future<A>, Future<B>, Future<C>)>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
{
    let promise = Promise::<(Future<A>, Future<B>, Future<C>)>::new();
    let result = promise
        .get_future()
        .expect("fresh promise has no attached future yet");

    let ctx = Arc::new(Mutex::new(Tuple3Context {
        remaining: 3,
        exception: None,
        slots: None,
        delivered: false,
    }));
    let promise = Arc::new(Mutex::new(Some(promise)));

    attach3(&a, ctx.clone(), promise.clone());
    attach3(&b, ctx.clone(), promise.clone());
    attach3(&c, ctx.clone(), promise.clone());

    ctx.lock().unwrap().slots = Some((a, b, c));
    maybe_finish3(&ctx, &promise);

    result
}

struct Tuple3Context<A, B, C> {
    remaining: u8,
    exception: Option<Exception>,
    slots: Option<(Future<A>, Future<B>, Future<C>)>,
    delivered: bool,
}

fn attach3<T, A, B, C>(
    future: &Future<T>,
    ctx: Arc<Mutex<Tuple3Context<A, B, C>>>,
    promise: Arc<Mutex<Option<Promise<(Future<A>, Future<B>, Future<C>)>>>>,
) where
    T: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
{
    let _ = future.observe_ready(move |exception| {
        {
            let mut guard = ctx.lock().unwrap();
            if let Some(e) = exception {
                if guard.exception.is_none() {
                    guard.exception = Some(anyhow::anyhow!("{}", e));
                }
            }
            guard.remaining -= 1;
        }
        maybe_finish3(&ctx, &promise);
    });
}

fn maybe_finish3<A: Send + 'static, B: Send + 'static, C: Send + 'static>(
    ctx: &Arc<Mutex<Tuple3Context<A, B, C>>>,
    promise: &Arc<Mutex<Option<Promise<(Future<A>, Future<B>, Future<C>)>>>>,
) {
    let mut guard = ctx.lock().unwrap();
    if guard.delivered || guard.remaining != 0 || guard.slots.is_none() {
        return;
    }
    guard.delivered = true;
    let exception = guard.exception.take();
    let slots = guard.slots.take().unwrap();
    drop(guard);

    if let Some(p) = promise.lock().unwrap().take() {
        match exception {
            Some(e) => {
                let _ = p.set_exception(e);
            }
            None => {
                let _ = p.set_value(slots);
            }
        }
    }
}
