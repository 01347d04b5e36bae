//! One-shot, blockable result cells for request replies.
//!
//! A [`Promise`] is the sender's view of a request's eventual reply. It is a
//! single-writer, multi-reader cell: resolved at most once, readable any
//! number of times, never reset. Waiting is condition-based — a blocked
//! `get()` sleeps on a condvar that `resolve()` signals, it never polls.
//!
//! # Example
//!
//! ```rust,ignore
//! let promise: Promise<u32> = Promise::new();
//! let reader = promise.clone();
//!
//! std::thread::spawn(move || reader.get());
//! promise.resolve(42);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A one-shot result cell with blocking and timed waits.
///
/// Cloning a `Promise` clones the *handle*; all clones observe the same cell.
/// The first `resolve` wins, wakes every waiter, and later calls are no-ops.
///
/// # Blocking inside handlers
///
/// `get()` blocks the calling thread indefinitely. A worker handler that
/// blocks on a promise stalls its own mailbox until the reply arrives; that
/// is an accepted trade-off, not a bug — workers that must stay responsive
/// should use [`Promise::get_timeout`] or defer the wait.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    slot: Mutex<Option<T>>,
    resolved: Condvar,
}

impl<T> Promise<T> {
    /// Create a new, unresolved promise.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Resolve the promise with `value`.
    ///
    /// The first resolution wins and wakes all waiters. Subsequent calls are
    /// silent no-ops; a promise is never reset.
    pub fn resolve(&self, value: T) {
        let mut slot = self.shared.slot.lock();
        if slot.is_some() {
            return;
        }
        *slot = Some(value);
        self.shared.resolved.notify_all();
    }

    /// Whether the promise has been resolved. Non-blocking.
    pub fn is_done(&self) -> bool {
        self.shared.slot.lock().is_some()
    }
}

impl<T: Clone> Promise<T> {
    /// Block the calling thread until the promise is resolved, then return
    /// the value.
    pub fn get(&self) -> T {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.shared.resolved.wait(&mut slot);
        }
    }

    /// Block up to `timeout` for the promise to be resolved.
    ///
    /// Returns `Some(value)` if resolution happened before the deadline, and
    /// `None` otherwise. A timeout is a normal outcome, never a panic or an
    /// error. The deadline is computed from a monotonic clock.
    pub fn get_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while slot.is_none() {
            if self
                .shared
                .resolved
                .wait_until(&mut slot, deadline)
                .timed_out()
            {
                break;
            }
        }
        slot.clone()
    }

    /// Non-blocking peek: the value if resolved, `None` otherwise.
    pub fn try_get(&self) -> Option<T> {
        self.shared.slot.lock().clone()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("resolved", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_promise_is_unresolved() {
        let promise: Promise<u32> = Promise::new();
        assert!(!promise.is_done());
        assert_eq!(promise.try_get(), None);
    }

    #[test]
    fn test_resolve_makes_value_observable() {
        let promise = Promise::new();
        promise.resolve(7u32);

        assert!(promise.is_done());
        assert_eq!(promise.try_get(), Some(7));
        assert_eq!(promise.get(), 7);
        assert_eq!(promise.get_timeout(Duration::from_millis(1)), Some(7));
    }

    #[test]
    fn test_first_resolution_wins() {
        let promise = Promise::new();
        promise.resolve("first");
        promise.resolve("second");

        assert_eq!(promise.get(), "first");
    }

    #[test]
    fn test_resolve_wakes_blocked_get() {
        let promise: Promise<u32> = Promise::new();
        let reader = promise.clone();

        let waiter = thread::spawn(move || reader.get());
        thread::sleep(Duration::from_millis(20));
        promise.resolve(99);

        assert_eq!(waiter.join().unwrap(), 99);
    }

    #[test]
    fn test_resolve_wakes_all_waiters() {
        let promise: Promise<u32> = Promise::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let reader = promise.clone();
                thread::spawn(move || reader.get())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        promise.resolve(5);

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), 5);
        }
    }

    #[test]
    fn test_get_timeout_waits_at_least_timeout() {
        let promise: Promise<u32> = Promise::new();
        let timeout = Duration::from_millis(50);

        let start = Instant::now();
        let result = promise.get_timeout(timeout);

        assert_eq!(result, None);
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn test_get_timeout_returns_early_when_resolved() {
        let promise: Promise<u32> = Promise::new();
        let writer = promise.clone();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.resolve(3);
        });

        let result = promise.get_timeout(Duration::from_secs(5));
        assert_eq!(result, Some(3));
    }

    #[test]
    fn test_clone_shares_the_same_cell() {
        let promise = Promise::new();
        let other = promise.clone();
        other.resolve(1u32);

        assert!(promise.is_done());
        assert_eq!(promise.get(), 1);
    }
}
