//! Per-worker blocking FIFO mailbox.
//!
//! A mailbox is owned by exactly one worker identity: any thread may enqueue,
//! only the owning worker thread dequeues. Messages come out in the exact
//! order they were enqueued into *this* mailbox; cross-mailbox ordering is
//! unspecified.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::message::Envelope;

pub(crate) struct Mailbox {
    state: Mutex<State>,
    available: Condvar,
}

struct State {
    queue: VecDeque<Envelope>,
    closed: bool,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a message. Returns `false` if the mailbox was already closed,
    /// in which case the message is dropped (a send racing an unregister may
    /// land here; either outcome is acceptable).
    pub(crate) fn push(&self, envelope: Envelope) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.queue.push_back(envelope);
        self.available.notify_one();
        true
    }

    /// Block until a message is available and pop the oldest one.
    ///
    /// Returns `None` once the mailbox is closed; any messages still queued
    /// at close time are discarded, never delivered.
    pub(crate) fn pop_blocking(&self) -> Option<Envelope> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(envelope) = state.queue.pop_front() {
                return Some(envelope);
            }
            self.available.wait(&mut state);
        }
    }

    /// Close the mailbox, discarding queued messages and waking any blocked
    /// consumer.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.queue.clear();
        self.available.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Notification, RequestId};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Note(u32);

    impl Notification for Note {}

    #[derive(Debug, Clone)]
    struct Ask;

    impl crate::message::Request for Ask {
        type Reply = ();
    }

    #[test]
    fn test_fifo_order_is_preserved() {
        let mailbox = Mailbox::new();
        for n in 0..5 {
            assert!(mailbox.push(Envelope::notification(Note(n))));
        }

        for n in 0..5 {
            let envelope = mailbox.pop_blocking().unwrap();
            assert_eq!(envelope.payload_ref::<Note>().unwrap().0, n);
        }
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer_box = Arc::clone(&mailbox);

        let consumer = thread::spawn(move || consumer_box.pop_blocking());
        thread::sleep(Duration::from_millis(20));
        mailbox.push(Envelope::request(RequestId::new(1), Ask));

        let envelope = consumer.join().unwrap().unwrap();
        assert!(envelope.is::<Ask>());
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer_box = Arc::clone(&mailbox);

        let consumer = thread::spawn(move || consumer_box.pop_blocking());
        thread::sleep(Duration::from_millis(20));
        mailbox.close();

        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_close_discards_queued_messages() {
        let mailbox = Mailbox::new();
        mailbox.push(Envelope::notification(Note(1)));
        mailbox.close();

        assert!(mailbox.pop_blocking().is_none());
        assert!(!mailbox.push(Envelope::notification(Note(2))));
        assert_eq!(mailbox.len(), 0);
    }
}
