//! The message bus: routing tables, mailboxes, and pending replies.
//!
//! The [`MessageBus`] is the only shared mutable state in a switchboard
//! system. Worker threads register, subscribe, send, and block on it
//! concurrently; every public operation is independently atomic.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ MessageBus                                │
//! │                                           │
//! │  ┌─────────────────────────────────────┐  │
//! │  │ mailboxes: WorkerId → Mailbox       │  │
//! │  ├─────────────────────────────────────┤  │
//! │  │ requests: TypeId → Route (+ cursor) │  │
//! │  ├─────────────────────────────────────┤  │
//! │  │ notifications: TypeId → Route       │  │
//! │  ├─────────────────────────────────────┤  │
//! │  │ pending: RequestId → Promise        │  │
//! │  └─────────────────────────────────────┘  │
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Locking
//!
//! One mutex guards the four tables; each mailbox carries its own lock and
//! condvar. Lock order is always bus state → mailbox, and the blocking pop
//! in [`MessageBus::await_next`] never touches the bus lock, so consumers
//! blocked on empty mailboxes cannot stall senders.
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = Arc::new(MessageBus::new());
//! let worker = WorkerId::new("camera");
//!
//! bus.register(&worker);
//! bus.subscribe_request::<DetectObjects>(&worker)?;
//!
//! // From any thread:
//! if let Some(promise) = bus.send_request(DetectObjects { frame: 7 }) {
//!     let detected = promise.get();
//! }
//! ```

mod mailbox;
mod routing;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BusError;
use crate::message::{short_type_name, Envelope, Notification, ReplyToken, Request, RequestId};
use crate::promise::Promise;
use crate::worker::WorkerId;

use mailbox::Mailbox;
use routing::Route;

struct BusState {
    mailboxes: HashMap<WorkerId, Arc<Mailbox>>,
    requests: HashMap<TypeId, Route>,
    notifications: HashMap<TypeId, Route>,
    pending: HashMap<RequestId, Box<dyn Any + Send>>,
}

impl BusState {
    fn unsubscribe_everywhere(&mut self, worker: &WorkerId) {
        for route in self.requests.values_mut() {
            route.remove(worker);
        }
        for route in self.notifications.values_mut() {
            route.remove(worker);
        }
    }
}

/// The central broker every worker communicates through.
///
/// Construct exactly one per running system and hand it to each worker as an
/// `Arc<MessageBus>`; there is no hidden global instance.
///
/// # Guarantees
///
/// - Per-mailbox FIFO: a worker dequeues messages in the order they were
///   enqueued into its mailbox.
/// - Round-robin fairness per request type, in send order: the rotation
///   cursor advances exactly once per successful send.
/// - Exactly-once delivery of each request to one subscriber, and one copy
///   of each notification to every subscriber present at send time.
///
/// No ordering is guaranteed across different message types or different
/// mailboxes.
pub struct MessageBus {
    state: Mutex<BusState>,
    next_request_id: AtomicU64,
}

impl MessageBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState {
                mailboxes: HashMap::new(),
                requests: HashMap::new(),
                notifications: HashMap::new(),
                pending: HashMap::new(),
            }),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Create a mailbox for `worker`.
    ///
    /// Idempotent: registering an already-registered identity is a no-op, so
    /// a concurrent duplicate registration can never discard queued messages.
    pub fn register(&self, worker: &WorkerId) {
        let mut state = self.state.lock();
        if state.mailboxes.contains_key(worker) {
            tracing::debug!(worker = %worker, "register: already registered, keeping mailbox");
            return;
        }
        state.mailboxes.insert(worker.clone(), Arc::new(Mailbox::new()));
        tracing::debug!(worker = %worker, "registered");
    }

    /// Destroy `worker`'s mailbox and drop it from every subscription route.
    ///
    /// Queued, undelivered messages are discarded. A thread blocked in
    /// [`MessageBus::await_next`] for this worker observes
    /// [`BusError::MailboxClosed`]. Unregistering an identity that was never
    /// registered is a no-op.
    ///
    /// Promises for requests this worker received but never resolved stay
    /// unresolved; senders that must not wait forever should use
    /// [`Promise::get_timeout`].
    pub fn unregister(&self, worker: &WorkerId) {
        let mut state = self.state.lock();
        state.unsubscribe_everywhere(worker);
        if let Some(mailbox) = state.mailboxes.remove(worker) {
            mailbox.close();
            tracing::debug!(worker = %worker, "unregistered");
        }
    }

    /// Append `worker` to the subscriber sequence for request type `R`.
    ///
    /// Subscribing the same worker twice appends a second round-robin slot.
    ///
    /// # Errors
    ///
    /// [`BusError::NotRegistered`] if the worker has no live mailbox; routes
    /// only ever contain registered identities.
    pub fn subscribe_request<R: Request>(&self, worker: &WorkerId) -> Result<(), BusError> {
        self.subscribe(TypeId::of::<R>(), short_type_name::<R>(), worker, true)
    }

    /// Append `worker` to the subscriber sequence for notification type `N`.
    ///
    /// Same policy and errors as [`MessageBus::subscribe_request`].
    pub fn subscribe_notification<N: Notification>(&self, worker: &WorkerId) -> Result<(), BusError> {
        self.subscribe(TypeId::of::<N>(), short_type_name::<N>(), worker, false)
    }

    fn subscribe(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        worker: &WorkerId,
        request: bool,
    ) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if !state.mailboxes.contains_key(worker) {
            return Err(BusError::NotRegistered(worker.clone()));
        }
        let table = if request {
            &mut state.requests
        } else {
            &mut state.notifications
        };
        table
            .entry(type_id)
            .or_insert_with(Route::new)
            .subscribe(worker.clone());
        tracing::debug!(worker = %worker, message = type_name, "subscribed");
        Ok(())
    }

    /// Dispatch a request to the next round-robin subscriber of its type.
    ///
    /// Returns the [`Promise`] that the handling worker resolves, or `None`
    /// when no subscriber exists — "unhandled" is a normal outcome the caller
    /// must check, not a fault.
    ///
    /// Subscriber selection, cursor advance, promise registration, and the
    /// mailbox enqueue happen atomically with respect to concurrent
    /// subscribe/unregister on the same type.
    pub fn send_request<R: Request>(&self, request: R) -> Option<Promise<R::Reply>> {
        let mut state = self.state.lock();
        let target = state
            .requests
            .get_mut(&TypeId::of::<R>())?
            .select_next()?;
        let Some(mailbox) = state.mailboxes.get(&target).cloned() else {
            tracing::warn!(
                target = %target,
                message = short_type_name::<R>(),
                "request route pointed at a worker without a mailbox"
            );
            return None;
        };

        let id = RequestId::new(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let promise: Promise<R::Reply> = Promise::new();
        state.pending.insert(id, Box::new(promise.clone()));

        if !mailbox.push(Envelope::request(id, request)) {
            // Closed mailboxes are removed under the same lock, so this
            // cannot happen for a target picked from a live route.
            state.pending.remove(&id);
            return None;
        }
        tracing::debug!(
            request_id = %id,
            target = %target,
            message = short_type_name::<R>(),
            "request dispatched"
        );
        Some(promise)
    }

    /// Enqueue one copy of a notification into every current subscriber's
    /// mailbox, in subscription order.
    ///
    /// The subscriber snapshot is taken atomically at send time: workers
    /// subscribing afterwards do not receive this instance, and a worker
    /// unregistered concurrently may or may not — both outcomes are
    /// acceptable.
    pub fn send_notification<N: Notification>(&self, notification: N) {
        let state = self.state.lock();
        let Some(route) = state.notifications.get(&TypeId::of::<N>()) else {
            tracing::debug!(
                message = short_type_name::<N>(),
                "notification has no subscribers"
            );
            return;
        };
        for worker in route.subscribers() {
            if let Some(mailbox) = state.mailboxes.get(worker) {
                mailbox.push(Envelope::notification(notification.clone()));
            }
        }
        tracing::debug!(
            message = short_type_name::<N>(),
            subscribers = route.subscribers().len(),
            "notification fanned out"
        );
    }

    /// Resolve the promise created for one request instance.
    ///
    /// Called by the handler that finished processing the request. Removes
    /// the pending entry and wakes every waiter. When no entry exists — the
    /// sender never went through `send_request`, or the instance was already
    /// resolved — this is a silent no-op.
    pub fn resolve<R: Request>(&self, token: ReplyToken<R>, reply: R::Reply) {
        let id = token.request_id();
        let entry = self.state.lock().pending.remove(&id);
        match entry {
            Some(boxed) => match boxed.downcast::<Promise<R::Reply>>() {
                Ok(promise) => {
                    promise.resolve(reply);
                    tracing::debug!(request_id = %id, "request resolved");
                }
                Err(_) => {
                    tracing::warn!(request_id = %id, "pending promise had an unexpected reply type");
                }
            },
            None => {
                tracing::warn!(request_id = %id, "resolve for unknown request instance ignored");
            }
        }
    }

    /// Block until `worker`'s mailbox holds at least one message, then pop
    /// the oldest one.
    ///
    /// Only the owning worker thread should consume from a mailbox.
    ///
    /// # Errors
    ///
    /// - [`BusError::NotRegistered`] if the identity has no live mailbox.
    /// - [`BusError::MailboxClosed`] if the worker is unregistered while the
    ///   caller is blocked; the mailbox is left uncorrupted.
    pub fn await_next(&self, worker: &WorkerId) -> Result<Envelope, BusError> {
        let mailbox = self
            .state
            .lock()
            .mailboxes
            .get(worker)
            .cloned()
            .ok_or_else(|| BusError::NotRegistered(worker.clone()))?;
        mailbox
            .pop_blocking()
            .ok_or_else(|| BusError::MailboxClosed(worker.clone()))
    }

    /// Whether `worker` currently has a live mailbox.
    pub fn is_registered(&self, worker: &WorkerId) -> bool {
        self.state.lock().mailboxes.contains_key(worker)
    }

    /// Number of requests dispatched but not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
