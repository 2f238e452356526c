//! Bounded wait-on-predicate helper shared by the producer and subscriber
//! blocking protocols.
//!
//! The source disruptor allocates a one-shot signal per awaited sequence.
//! This port instead gives the whole [`crate::disruptor::Disruptor`] exactly
//! two condition variables — one producers wait on, one subscribers wait on
//! — and has every waiter recheck its own predicate on each wakeup. A
//! handful of spurious wakeups across unrelated subscribers costs a
//! predicate check, not a correctness hazard, and this is what a production
//! disruptor crate in this lineage does with its own wait strategies
//! (busy-spin / blocking / sleeping, all ultimately "recheck the predicate").

use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};

/// Outcome of [`wait_while_with_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// The predicate became true.
    Ready,
    /// `timeout` elapsed before the predicate became true.
    TimedOut,
}

/// Converts a caller-supplied relative `timeout` into an absolute deadline,
/// anchored once at the start of a (possibly multi-call) wait. Threading the
/// resulting `Option<Instant>` through repeated [`wait_while_with_timeout`]
/// calls — rather than re-deriving a deadline from the same `Duration` each
/// time — is what keeps a multi-step wait (e.g. re-scanning for the next
/// laggard in `wait_for_subscribers_past`) bounded by one `timeout`, instead
/// of one `timeout` per iteration.
pub(crate) fn deadline_from(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|d| Instant::now() + d)
}

/// Blocks on `condvar` until `predicate(&*guard)` is true, re-checking after
/// every wakeup, until `deadline` (if any) passes.
///
/// `deadline = None` waits indefinitely. `deadline = Some(instant)` in the
/// past checks the predicate once without blocking, matching the spec's
/// "timeout=0 means don't block" scenarios (S2/S3). Callers that may need to
/// call this more than once for a single logical wait (e.g. re-scanning for
/// the next laggard) must compute `deadline` once via [`deadline_from`] and
/// reuse it across calls, rather than recomputing it from the original
/// `Duration` each time — otherwise each call gets its own fresh budget and
/// the overall wait is no longer bounded by the caller's timeout.
pub(crate) fn wait_while_with_timeout<'a, T, F>(
    condvar: &Condvar,
    mut guard: MutexGuard<'a, T>,
    deadline: Option<Instant>,
    mut predicate: F,
) -> (MutexGuard<'a, T>, WaitOutcome)
where
    F: FnMut(&T) -> bool,
{
    if predicate(&guard) {
        return (guard, WaitOutcome::Ready);
    }

    loop {
        match deadline {
            None => {
                condvar.wait(&mut guard);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return (guard, WaitOutcome::TimedOut);
                }
                let remaining = deadline - now;
                let timed_out = condvar.wait_for(&mut guard, remaining).timed_out();
                if predicate(&guard) {
                    return (guard, WaitOutcome::Ready);
                }
                if timed_out {
                    return (guard, WaitOutcome::TimedOut);
                }
                continue;
            }
        }

        if predicate(&guard) {
            return (guard, WaitOutcome::Ready);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn returns_immediately_if_already_true() {
        let mutex = Mutex::new(5);
        let condvar = Condvar::new();
        let guard = mutex.lock();
        let (_, outcome) = wait_while_with_timeout(&condvar, guard, None, |v| *v == 5);
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[test]
    fn zero_timeout_does_not_block_when_false() {
        let mutex = Mutex::new(0);
        let condvar = Condvar::new();
        let guard = mutex.lock();
        let (_, outcome) = wait_while_with_timeout(
            &condvar,
            guard,
            deadline_from(Some(Duration::ZERO)),
            |v| *v == 1,
        );
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn wakes_on_notify() {
        let pair = Arc::new((Mutex::new(0), Condvar::new()));
        let pair2 = pair.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let (mutex, condvar) = &*pair2;
            *mutex.lock() = 1;
            condvar.notify_all();
        });

        let (mutex, condvar) = &*pair;
        let guard = mutex.lock();
        let (_, outcome) = wait_while_with_timeout(
            condvar,
            guard,
            deadline_from(Some(Duration::from_secs(5))),
            |v| *v == 1,
        );
        assert_eq!(outcome, WaitOutcome::Ready);
        handle.join().unwrap();
    }

    #[test]
    fn reused_deadline_does_not_reset_across_calls() {
        let mutex = Mutex::new(0);
        let condvar = Condvar::new();
        let deadline = deadline_from(Some(Duration::from_millis(30)));

        thread::sleep(Duration::from_millis(40));

        let guard = mutex.lock();
        let (_, outcome) = wait_while_with_timeout(&condvar, guard, deadline, |v| *v == 1);
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }
}
