//! Dynamic message dispatch via handler registry.
//!
//! This module provides the [`HandlerRegistry`] which maps message type ids
//! to type-erased handler closures, so a worker's run loop can dispatch a
//! popped [`Envelope`] to the matching strongly-typed handler with a single
//! lookup instead of a downcast chain.
//!
//! ```text
//! Envelope { type_id: TypeId(DetectObjects), payload: [...] }
//!   ↓
//! registry.dispatch(worker, ctx, envelope)
//!   ↓
//! handler closure:
//!   1. Downcast payload → DetectObjects
//!   2. Build Responder from the envelope's RequestId
//!   3. Call the registered FnMut(&mut W, &ctx, req, responder)
//! ```
//!
//! Handlers are installed during [`Worker::init`](crate::worker::Worker::init)
//! through [`SetupContext`](crate::worker::SetupContext), which pairs each
//! registration with the matching bus subscription.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bus::MessageBus;
use crate::error::HandlerError;
use crate::message::{short_type_name, Envelope, EnvelopeKind, Notification, ReplyToken, Request, RequestId};
use crate::worker::{Worker, WorkerContext};

type RequestHandlerFn<W> = Box<
    dyn FnMut(&mut W, &WorkerContext, Box<dyn Any + Send>, RequestId) -> Result<(), HandlerError>
        + Send,
>;

type NotificationHandlerFn<W> =
    Box<dyn FnMut(&mut W, &WorkerContext, Box<dyn Any + Send>) -> Result<(), HandlerError> + Send>;

/// The reply capability handed to a request handler.
///
/// Consuming it with [`Responder::reply`] resolves the sender's promise for
/// exactly this request instance. Dropping it without replying leaves the
/// promise unresolved (the sender's problem to bound with a timeout);
/// [`Responder::into_token`] extracts the token for deferred resolution from
/// a later handler invocation.
pub struct Responder<R: Request> {
    bus: Arc<MessageBus>,
    token: ReplyToken<R>,
}

impl<R: Request> Responder<R> {
    pub(crate) fn new(bus: Arc<MessageBus>, token: ReplyToken<R>) -> Self {
        Self { bus, token }
    }

    /// Resolve the request with `reply`, waking the sender.
    pub fn reply(self, reply: R::Reply) {
        self.bus.resolve(self.token, reply);
    }

    /// Give up the reply capability as a bare token, for resolving later via
    /// [`MessageBus::resolve`].
    pub fn into_token(self) -> ReplyToken<R> {
        self.token
    }

    /// The request instance this responder answers.
    pub fn request_id(&self) -> RequestId {
        self.token.request_id()
    }
}

impl<R: Request> fmt::Debug for Responder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Responder").field(&self.request_id()).finish()
    }
}

/// Registry mapping message types to type-erased handler closures.
///
/// One registry per worker instance, populated during `init` and consulted
/// by the run loop for every popped envelope. Handlers run synchronously on
/// the worker's own thread, never concurrently with each other.
pub struct HandlerRegistry<W> {
    requests: HashMap<TypeId, RequestHandlerFn<W>>,
    notifications: HashMap<TypeId, NotificationHandlerFn<W>>,
}

impl<W: Worker> HandlerRegistry<W> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
            notifications: HashMap::new(),
        }
    }

    /// Register the handler invoked for requests of type `R`.
    ///
    /// Registering a second handler for the same type replaces the first.
    pub fn register_request<R, F>(&mut self, mut handler: F)
    where
        R: Request,
        F: FnMut(&mut W, &WorkerContext, R, Responder<R>) -> Result<(), HandlerError>
            + Send
            + 'static,
    {
        tracing::debug!(
            message = short_type_name::<R>(),
            worker_type = std::any::type_name::<W>(),
            "registered request handler"
        );
        let erased: RequestHandlerFn<W> = Box::new(move |worker, ctx, payload, id| {
            let request = payload
                .downcast::<R>()
                .map_err(|_| HandlerError::PayloadType(short_type_name::<R>()))?;
            let responder = Responder::new(Arc::clone(ctx.bus()), ReplyToken::new(id));
            handler(worker, ctx, *request, responder)
        });
        self.requests.insert(TypeId::of::<R>(), erased);
    }

    /// Register the handler invoked for notifications of type `N`.
    pub fn register_notification<N, F>(&mut self, mut handler: F)
    where
        N: Notification,
        F: FnMut(&mut W, &WorkerContext, N) -> Result<(), HandlerError> + Send + 'static,
    {
        tracing::debug!(
            message = short_type_name::<N>(),
            worker_type = std::any::type_name::<W>(),
            "registered notification handler"
        );
        let erased: NotificationHandlerFn<W> = Box::new(move |worker, ctx, payload| {
            let notification = payload
                .downcast::<N>()
                .map_err(|_| HandlerError::PayloadType(short_type_name::<N>()))?;
            handler(worker, ctx, *notification)
        });
        self.notifications.insert(TypeId::of::<N>(), erased);
    }

    /// Dispatch a popped envelope to the matching handler.
    pub(crate) fn dispatch(
        &mut self,
        worker: &mut W,
        ctx: &WorkerContext,
        envelope: Envelope,
    ) -> Result<(), HandlerError> {
        let (kind, type_id, type_name, payload) = envelope.into_parts();
        match kind {
            EnvelopeKind::Request(id) => {
                let handler = self
                    .requests
                    .get_mut(&type_id)
                    .ok_or(HandlerError::NoHandler(type_name))?;
                handler(worker, ctx, payload, id)
            }
            EnvelopeKind::Notification => {
                let handler = self
                    .notifications
                    .get_mut(&type_id)
                    .ok_or(HandlerError::NoHandler(type_name))?;
                handler(worker, ctx, payload)
            }
        }
    }

    /// Whether a handler is installed for message type `M` (request or
    /// notification).
    pub fn has_handler<M: 'static>(&self) -> bool {
        let type_id = TypeId::of::<M>();
        self.requests.contains_key(&type_id) || self.notifications.contains_key(&type_id)
    }

    /// Total number of installed handlers.
    pub fn handler_count(&self) -> usize {
        self.requests.len() + self.notifications.len()
    }
}

impl<W: Worker> Default for HandlerRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::SetupContext;
    use crate::BusError;

    struct Counter {
        pings: u32,
        ticks: u64,
    }

    impl Worker for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn init(&mut self, _ctx: &mut SetupContext<'_, Self>) -> Result<(), BusError> {
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct Ping(u32);

    impl Request for Ping {
        type Reply = u32;
    }

    #[derive(Debug, Clone)]
    struct Tick(u64);

    impl Notification for Tick {}

    fn test_context() -> WorkerContext {
        WorkerContext::new(Arc::new(MessageBus::new()), crate::worker::WorkerId::new("counter"))
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = HandlerRegistry::<Counter>::new();
        assert_eq!(registry.handler_count(), 0);
        assert!(!registry.has_handler::<Ping>());
    }

    #[test]
    fn test_registration_is_visible() {
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.register_request::<Ping, _>(|worker, _ctx, ping, responder| {
            worker.pings += ping.0;
            responder.reply(worker.pings);
            Ok(())
        });
        registry.register_notification::<Tick, _>(|worker, _ctx, tick| {
            worker.ticks = tick.0;
            Ok(())
        });

        assert_eq!(registry.handler_count(), 2);
        assert!(registry.has_handler::<Ping>());
        assert!(registry.has_handler::<Tick>());
    }

    #[test]
    fn test_dispatch_routes_by_concrete_type() {
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.register_notification::<Tick, _>(|worker, _ctx, tick| {
            worker.ticks += tick.0;
            Ok(())
        });

        let mut worker = Counter { pings: 0, ticks: 0 };
        let ctx = test_context();
        registry
            .dispatch(&mut worker, &ctx, Envelope::notification(Tick(5)))
            .unwrap();
        registry
            .dispatch(&mut worker, &ctx, Envelope::notification(Tick(2)))
            .unwrap();

        assert_eq!(worker.ticks, 7);
    }

    #[test]
    fn test_dispatch_without_handler_fails() {
        let mut registry = HandlerRegistry::<Counter>::new();
        let mut worker = Counter { pings: 0, ticks: 0 };
        let ctx = test_context();

        let err = registry
            .dispatch(&mut worker, &ctx, Envelope::notification(Tick(1)))
            .unwrap_err();
        assert!(matches!(err, HandlerError::NoHandler("Tick")));
    }

    #[test]
    fn test_request_handler_replies_through_the_bus() {
        let bus = Arc::new(MessageBus::new());
        let id = crate::worker::WorkerId::new("counter");
        bus.register(&id);
        bus.subscribe_request::<Ping>(&id).unwrap();

        let promise = bus.send_request(Ping(20)).unwrap();
        let envelope = bus.await_next(&id).unwrap();

        let mut registry = HandlerRegistry::<Counter>::new();
        registry.register_request::<Ping, _>(|worker, _ctx, ping, responder| {
            worker.pings += ping.0;
            responder.reply(worker.pings * 2);
            Ok(())
        });

        let mut worker = Counter { pings: 1, ticks: 0 };
        let ctx = WorkerContext::new(Arc::clone(&bus), id);
        registry.dispatch(&mut worker, &ctx, envelope).unwrap();

        assert_eq!(promise.get(), 42);
        assert_eq!(bus.pending_count(), 0);
    }
}
