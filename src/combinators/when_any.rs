//! `when_any`: settles as soon as the first input succeeds (or, failing
//! that, once every input has failed).

use crate::error::Exception;
use crate::future::Future;
use crate::promise::Promise;
use std::sync::{Arc, Mutex};

/// The outcome of [`when_any`]: `index` names the first input future (in
/// input order) whose continuation fired with no exception, and `futures`
/// is every input, now all settled, in original input order — `get()` on
/// `futures[index]` yields the winning value; the others may still be
/// pending (a loser doesn't have to have failed, it may simply not have
/// been first).
pub struct WhenAnyResult<T> {
    pub index: usize,
    pub futures: Vec<Future<T>>,
}

struct AnyContext<T> {
    total: usize,
    failed_count: usize,
    success_index: Option<usize>,
    exception: Option<Exception>,
    futures: Option<Vec<Future<T>>>,
    delivered: bool,
}

fn maybe_finish<T: Send + 'static>(
    ctx: &Arc<Mutex<AnyContext<T>>>,
    promise: &Arc<Mutex<Option<Promise<WhenAnyResult<T>>>>>,
) {
    let mut guard = ctx.lock().unwrap();
    if guard.delivered || guard.futures.is_none() {
        return;
    }
    let can_fire = guard.success_index.is_some() || guard.failed_count == guard.total;
    if !can_fire {
        return;
    }
    guard.delivered = true;
    let success_index = guard.success_index;
    let exception = guard.exception.take();
    let futures = guard.futures.take().unwrap();
    drop(guard);

    if let Some(p) = promise.lock().unwrap().take() {
        match success_index {
            Some(index) => {
                let _ = p.set_value(WhenAnyResult { index, futures });
            }
            None => {
                let e = exception.unwrap_or_else(|| anyhow::anyhow!("when_any: all inputs failed"));
                let _ = p.set_exception(e);
            }
        }
    }
}

/// Waits for the first of `futures` to succeed, or for all of them to fail.
///
/// Settles with `{index, futures}` where `index` is the first input (in
/// input order) whose continuation reported success — per spec.md §4.5,
/// "success dominates": a later failure never overrides an earlier success,
/// and only the *first* success is ever recorded. If every input fails, the
/// *last*-observed exception is reported (the opposite tie-break from
/// `when_all`, per spec.md's explicit "last captured exception" rule).
pub fn when_any<T>(futures: Vec<Future<T>>) -> Future<WhenAnyResult<T>>
where
    T: Send + 'static,
{
    let total = futures.len();
    let promise = Promise::<WhenAnyResult<T>>::new();
    let result = promise
        .get_future()
        .expect("fresh promise has no attached future yet");
    if total == 0 {
        let _ = promise.set_exception(anyhow::anyhow!("when_any: no futures were given"));
        return result;
    }

    let ctx = Arc::new(Mutex::new(AnyContext {
        total,
        failed_count: 0,
        success_index: None,
        exception: None,
        futures: None,
        delivered: false,
    }));
    let promise = Arc::new(Mutex::new(Some(promise)));

    for (index, future) in futures.iter().enumerate() {
        let ctx = ctx.clone();
        let promise = promise.clone();
        let _ = future.observe_ready(move |exception| {
            {
                let mut guard = ctx.lock().unwrap();
                match exception {
                    Some(e) => {
                        guard.failed_count += 1;
                        guard.exception = Some(anyhow::anyhow!("{}", e));
                    }
                    None => {
                        if guard.success_index.is_none() {
                            guard.success_index = Some(index);
                        }
                    }
                }
            }
            maybe_finish(&ctx, &promise);
        });
    }

    ctx.lock().unwrap().futures = Some(futures);
    maybe_finish(&ctx, &promise);

    result
}

struct Tuple2Context<A, B> {
    a_done: bool,
    b_done: bool,
    success_index: Option<usize>,
    exception: Option<Exception>,
    slots: Option<(Future<A>, Future<B>)>,
    delivered: bool,
}

fn maybe_finish2<A: Send + 'static, B: Send + 'static>(
    ctx: &Arc<Mutex<Tuple2Context<A, B>>>,
    promise: &Arc<Mutex<Option<Promise<WhenAnyResult2<A, B>>>>>,
) {
    let mut guard = ctx.lock().unwrap();
    if guard.delivered || guard.slots.is_none() {
        return;
    }
    let all_failed = guard.a_done && guard.b_done && guard.success_index.is_none();
    let can_fire = guard.success_index.is_some() || all_failed;
    if !can_fire {
        return;
    }
    guard.delivered = true;
    let success_index = guard.success_index;
    let exception = guard.exception.take();
    let slots = guard.slots.take().unwrap();
    drop(guard);

    if let Some(p) = promise.lock().unwrap().take() {
        match success_index {
            Some(index) => {
                let _ = p.set_value(WhenAnyResult2 {
                    index,
                    futures: slots,
                });
            }
            None => {
                let e = exception.unwrap_or_else(|| anyhow::anyhow!("when_any: all inputs failed"));
                let _ = p.set_exception(e);
            }
        }
    }
}

/// The outcome of [`when_any2`]: `index` is `0` or `1`.
pub struct WhenAnyResult2<A, B> {
    pub index: usize,
    pub futures: (Future<A>, Future<B>),
}

/// Tuple-shaped `when_any` for two futures of possibly different types.
pub fn when_any2<A, B>(a: Future<A>, b: Future<B>) -> Future<WhenAnyResult2<A, B>>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let promise = Promise::<WhenAnyResult2<A, B>>::new();
    let result = promise
        .get_future()
        .expect("fresh promise has no attached future yet");

    let ctx = Arc::new(Mutex::new(Tuple2Context {
        a_done: false,
        b_done: false,
        success_index: None,
        exception: None,
        slots: None,
        delivered: false,
    }));
    let promise_for_a = Arc::new(Mutex::new(Some(promise)));
    let promise_for_b = promise_for_a.clone();

    {
        let ctx = ctx.clone();
        let promise = promise_for_a.clone();
        let _ = a.observe_ready(move |exception| {
            {
                let mut guard = ctx.lock().unwrap();
                guard.a_done = true;
                match exception {
                    Some(e) => guard.exception = Some(anyhow::anyhow!("{}", e)),
                    None => {
                        if guard.success_index.is_none() {
                            guard.success_index = Some(0);
                        }
                    }
                }
            }
            maybe_finish2(&ctx, &promise);
        });
    }
    {
        let ctx = ctx.clone();
        let promise = promise_for_b.clone();
        let _ = b.observe_ready(move |exception| {
            {
                let mut guard = ctx.lock().unwrap();
                guard.b_done = true;
                match exception {
                    Some(e) => guard.exception = Some(anyhow::anyhow!("{}", e)),
                    None => {
                        if guard.success_index.is_none() {
                            guard.success_index = Some(1);
                        }
                    }
                }
            }
            maybe_finish2(&ctx, &promise);
        });
    }

    ctx.lock().unwrap().slots = Some((a, b));
    maybe_finish2(&ctx, &promise_for_a);

    result
}

struct Tuple3Context<A, B, C> {
    done: [bool; 3],
    success_index: Option<usize>,
    exception: Option<Exception>,
    slots: Option<(Future<A>, Future<B>, Future<C>)>,
    delivered: bool,
}

/// The outcome of [`when_any3`]: `index` is `0`, `1`, or `2`.
pub struct WhenAnyResult3<A, B, C> {
    pub index: usize,
    pub futures: (Future<A>, Future<B>, Future<C>),
}

fn maybe_finish3<A: Send + 'static, B: Send + 'static, C: Send + 'static>(
    ctx: &Arc<Mutex<Tuple3Context<A, B, C>>>,
    promise: &Arc<Mutex<Option<Promise<WhenAnyResult3<A, B, C>>>>>,
) {
    let mut guard = ctx.lock().unwrap();
    if guard.delivered || guard.slots.is_none() {
        return;
    }
    let all_failed = guard.done.iter().all(|&d| d) && guard.success_index.is_none();
    let can_fire = guard.success_index.is_some() || all_failed;
    if !can_fire {
        return;
    }
    guard.delivered = true;
    let success_index = guard.success_index;
    let exception = guard.exception.take();
    let slots = guard.slots.take().unwrap();
    drop(guard);

    if let Some(p) = promise.lock().unwrap().take() {
        match success_index {
            Some(index) => {
                let _ = p.set_value(WhenAnyResult3 {
                    index,
                    futures: slots,
                });
            }
            None => {
                let e = exception.unwrap_or_else(|| anyhow::anyhow!("when_any: all inputs failed"));
                let _ = p.set_exception(e);
            }
        }
    }
}

/// Tuple-shaped `when_any` for three futures of possibly different types.
pub fn when_any3<A, B, C>(
    a: Future<A>,
    b: Future<B>,
    c: Future<C>,
) -> Future<WhenAnyResult3<A, B, C>>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
{
    let promise = Promise::<WhenAnyResult3<A, B, C>>::new();
    let result = promise
        .get_future()
        .expect("fresh promise has no attached future yet");

    let ctx = Arc::new(Mutex::new(Tuple3Context {
        done: [false; 3],
        success_index: None,
        exception: None,
        slots: None,
        delivered: false,
    }));
    let promise = Arc::new(Mutex::new(Some(promise)));

    for (index, future) in [&a, &b, &c].into_iter().enumerate() {
        let ctx = ctx.clone();
        let promise = promise.clone();
        let _ = future.observe_ready(move |exception| {
            {
                let mut guard = ctx.lock().unwrap();
                guard.done[index] = true;
                match exception {
                    Some(e) => guard.exception = Some(anyhow::anyhow!("{}", e)),
                    None => {
                        if guard.success_index.is_none() {
                            guard.success_index = Some(index);
                        }
                    }
                }
            }
            maybe_finish3(&ctx, &promise);
        });
    }

    ctx.lock().unwrap().slots = Some((a, b, c));
    maybe_finish3(&ctx, &promise);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_ready_future;
    use crate::promise::Promise;

    #[test]
    fn first_success_wins_even_if_a_later_input_fails() {
        let pa: Promise<i32> = Promise::new();
        let pb: Promise<i32> = Promise::new();
        let fa = pa.get_future().unwrap();
        let fb = pb.get_future().unwrap();
        let w = when_any(vec![fa, fb]);
        pa.set_exception(anyhow::anyhow!("a failed")).unwrap();
        pb.set_value(9).unwrap();
        let mut result = w.get().unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.futures.remove(1).get().unwrap(), 9);
    }

    #[test]
    fn all_inputs_already_ready_picks_the_first_by_input_order() {
        let w = when_any(vec![make_ready_future(1), make_ready_future(2)]);
        let result = w.get().unwrap();
        assert_eq!(result.index, 0);
    }

    #[test]
    fn all_failures_report_the_last_captured_exception() {
        let pa: Promise<i32> = Promise::new();
        let pb: Promise<i32> = Promise::new();
        let fa = pa.get_future().unwrap();
        let fb = pb.get_future().unwrap();
        let w = when_any(vec![fa, fb]);
        pa.set_exception(anyhow::anyhow!("first failure")).unwrap();
        pb.set_exception(anyhow::anyhow!("second failure")).unwrap();
        let err = w.get().unwrap_err();
        assert_eq!(err.to_string(), "second failure");
    }

    #[test]
    fn when_any2_tuple_picks_the_winner() {
        let w = when_any2(make_ready_future(1), make_ready_future("two"));
        let result = w.get().unwrap();
        assert_eq!(result.index, 0);
    }

    #[test]
    fn when_any3_tuple_picks_the_winner() {
        let pa: Promise<i32> = Promise::new();
        let fa = pa.get_future().unwrap();
        let w = when_any3(fa, make_ready_future("two"), make_ready_future(3.0));
        pa.set_value(1).unwrap();
        let result = w.get().unwrap();
        // "two" and 3.0 were ready before `a`; the first-ready input wins.
        assert!(result.index == 1 || result.index == 2);
    }
}
