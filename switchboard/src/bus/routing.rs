//! Subscription table entries with round-robin selection.

use crate::worker::WorkerId;

/// The ordered subscriber sequence for one message type, plus the rotation
/// cursor used to pick request targets.
///
/// Policy: subscribing the same worker twice appends a second rotation slot;
/// `remove` strips all occurrences.
pub(crate) struct Route {
    subscribers: Vec<WorkerId>,
    cursor: usize,
}

impl Route {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn subscribe(&mut self, worker: WorkerId) {
        self.subscribers.push(worker);
    }

    pub(crate) fn remove(&mut self, worker: &WorkerId) {
        self.subscribers.retain(|w| w != worker);
    }

    /// Pick the next round-robin target and advance the cursor exactly once.
    ///
    /// The cursor is taken modulo the *current* sequence length, so a route
    /// that shrank since the last send stays in bounds and one that grew is
    /// eventually reached.
    pub(crate) fn select_next(&mut self) -> Option<WorkerId> {
        if self.subscribers.is_empty() {
            return None;
        }
        let index = self.cursor % self.subscribers.len();
        self.cursor = (index + 1) % self.subscribers.len();
        Some(self.subscribers[index].clone())
    }

    /// Current subscribers, in subscription order.
    pub(crate) fn subscribers(&self) -> &[WorkerId] {
        &self.subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(name: &str) -> WorkerId {
        WorkerId::new(name)
    }

    #[test]
    fn test_select_rotates_in_subscription_order() {
        let mut route = Route::new();
        let (a, b, c) = (worker("a"), worker("b"), worker("c"));
        route.subscribe(a.clone());
        route.subscribe(b.clone());
        route.subscribe(c.clone());

        assert_eq!(route.select_next(), Some(a.clone()));
        assert_eq!(route.select_next(), Some(b));
        assert_eq!(route.select_next(), Some(c));
        assert_eq!(route.select_next(), Some(a));
    }

    #[test]
    fn test_empty_route_selects_nothing() {
        let mut route = Route::new();
        assert_eq!(route.select_next(), None);
    }

    #[test]
    fn test_duplicate_subscription_gets_two_slots() {
        let mut route = Route::new();
        let (a, b) = (worker("a"), worker("b"));
        route.subscribe(a.clone());
        route.subscribe(b.clone());
        route.subscribe(a.clone());

        assert_eq!(route.select_next(), Some(a.clone()));
        assert_eq!(route.select_next(), Some(b));
        assert_eq!(route.select_next(), Some(a.clone()));
        assert_eq!(route.select_next(), Some(a));
    }

    #[test]
    fn test_remove_strips_all_occurrences() {
        let mut route = Route::new();
        let (a, b) = (worker("a"), worker("b"));
        route.subscribe(a.clone());
        route.subscribe(b.clone());
        route.subscribe(a.clone());

        route.remove(&a);
        assert_eq!(route.subscribers(), &[b.clone()]);
        assert_eq!(route.select_next(), Some(b));
    }

    #[test]
    fn test_cursor_stays_in_bounds_after_shrink() {
        let mut route = Route::new();
        let (a, b, c) = (worker("a"), worker("b"), worker("c"));
        route.subscribe(a.clone());
        route.subscribe(b.clone());
        route.subscribe(c.clone());

        // Advance the cursor past the future length.
        assert_eq!(route.select_next(), Some(a.clone()));
        assert_eq!(route.select_next(), Some(b.clone()));

        route.remove(&c);
        route.remove(&b);

        // Only `a` is left; selection must not go out of bounds.
        assert_eq!(route.select_next(), Some(a.clone()));
        assert_eq!(route.select_next(), Some(a));
    }

    #[test]
    fn test_growing_route_is_eventually_reached() {
        let mut route = Route::new();
        let (a, b) = (worker("a"), worker("b"));
        route.subscribe(a.clone());

        // With one subscriber the cursor wraps back to slot 0.
        assert_eq!(route.select_next(), Some(a.clone()));
        route.subscribe(b.clone());

        assert_eq!(route.select_next(), Some(a));
        assert_eq!(route.select_next(), Some(b));
    }
}
