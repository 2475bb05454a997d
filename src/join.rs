//! Two-way join used to keep the upload progress phase on screen for a
//! minimum amount of time without ever capping a slow upload.

use std::thread;
use std::time::{Duration, Instant};

/// Runs both closures concurrently and returns once the slower one has
/// finished. Panics in either closure are propagated.
pub fn join_slower<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    thread::scope(|scope| {
        let handle = scope.spawn(b);
        let left = a();
        let right = match handle.join() {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        };
        (left, right)
    })
}

/// Runs `work` and does not return before `minimum` has elapsed.
pub fn with_minimum_duration<F, R>(minimum: Duration, work: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    let (result, ()) = join_slower(work, || sleep_until(Instant::now() + minimum));
    result
}

fn sleep_until(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(deadline - now);
    }
}
