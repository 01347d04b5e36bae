//! Worker runtime: lifecycle contract and the blocking run loop.
//!
//! A worker is a single logical thread of control that communicates only
//! through the bus. Its lifecycle:
//!
//! ```text
//! spawn → register → init (subscribe + install handlers) → loop {
//!     await_next → dispatch to handler
//! } until terminate() or mailbox closed → unregister
//! ```
//!
//! Handlers run synchronously on the worker's own thread, one message at a
//! time. Termination is cooperative: a handler calls
//! [`WorkerContext::terminate`], and the loop exits before blocking for the
//! next message. Sends never block beyond the enqueue; blocking on a reply
//! ([`Promise::get`](crate::Promise::get)) is an explicit, separate step that
//! stalls the worker's own mailbox while it waits.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Echo;
//!
//! impl Worker for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn init(&mut self, ctx: &mut SetupContext<'_, Self>) -> Result<(), BusError> {
//!         ctx.subscribe_request::<EchoRequest, _>(|_me, _ctx, req, responder| {
//!             responder.reply(req.text);
//!             Ok(())
//!         })?;
//!         ctx.subscribe_notification::<Shutdown, _>(|_me, ctx, _msg| {
//!             ctx.terminate();
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let handle = worker::spawn(Arc::clone(&bus), Echo)?;
//! ```

mod id;
mod registry;

pub use id::WorkerId;
pub use registry::{HandlerRegistry, Responder};

use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::thread;

use crate::bus::MessageBus;
use crate::error::{BusError, HandlerError};
use crate::message::{short_type_name, Notification, Request};
use crate::promise::Promise;

/// The behavior every worker composes with its own message handlers.
///
/// `init` runs exactly once, after registration and before the first message
/// is consumed; it is where the worker declares its subscriptions and the
/// handler for each subscribed type.
pub trait Worker: Send + Sized + 'static {
    /// Stable display name, used for the identity and the thread name.
    fn name(&self) -> &str;

    /// Install subscriptions and handlers.
    ///
    /// Returning an error aborts the worker before its loop starts; the
    /// registration is released.
    fn init(&mut self, ctx: &mut SetupContext<'_, Self>) -> Result<(), BusError>;
}

/// Setup-time view of the runtime, passed to [`Worker::init`].
///
/// Couples every handler registration with the matching bus subscription so
/// a worker cannot subscribe to a type it has no handler for.
pub struct SetupContext<'a, W: Worker> {
    bus: &'a Arc<MessageBus>,
    id: &'a WorkerId,
    registry: &'a mut HandlerRegistry<W>,
}

impl<'a, W: Worker> SetupContext<'a, W> {
    /// Subscribe to request type `R` and install its handler.
    ///
    /// The handler receives the request and a [`Responder`] that resolves
    /// the sender's promise. Subscribing twice to the same type yields two
    /// round-robin slots and replaces the handler.
    pub fn subscribe_request<R, F>(&mut self, handler: F) -> Result<(), BusError>
    where
        R: Request,
        F: FnMut(&mut W, &WorkerContext, R, Responder<R>) -> Result<(), HandlerError>
            + Send
            + 'static,
    {
        if self.registry.has_handler::<R>() {
            tracing::debug!(
                worker = %self.id,
                message = short_type_name::<R>(),
                "re-subscribing: extra rotation slot, handler replaced"
            );
        }
        self.bus.subscribe_request::<R>(self.id)?;
        self.registry.register_request::<R, F>(handler);
        Ok(())
    }

    /// Subscribe to notification type `N` and install its handler.
    pub fn subscribe_notification<N, F>(&mut self, handler: F) -> Result<(), BusError>
    where
        N: Notification,
        F: FnMut(&mut W, &WorkerContext, N) -> Result<(), HandlerError> + Send + 'static,
    {
        if self.registry.has_handler::<N>() {
            tracing::debug!(
                worker = %self.id,
                message = short_type_name::<N>(),
                "re-subscribing: extra rotation slot, handler replaced"
            );
        }
        self.bus.subscribe_notification::<N>(self.id)?;
        self.registry.register_notification::<N, F>(handler);
        Ok(())
    }

    /// The bus this worker is registered on.
    pub fn bus(&self) -> &Arc<MessageBus> {
        self.bus
    }

    /// This worker's identity.
    pub fn worker_id(&self) -> &WorkerId {
        self.id
    }
}

/// Runtime view of a worker, passed to every handler invocation.
pub struct WorkerContext {
    bus: Arc<MessageBus>,
    id: WorkerId,
    stop: Cell<bool>,
}

impl WorkerContext {
    pub(crate) fn new(bus: Arc<MessageBus>, id: WorkerId) -> Self {
        Self {
            bus,
            id,
            stop: Cell::new(false),
        }
    }

    /// The bus this worker is registered on.
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// This worker's identity.
    pub fn worker_id(&self) -> &WorkerId {
        &self.id
    }

    /// Send a request through the bus; `None` means unhandled.
    ///
    /// Does not block beyond the enqueue. Blocking on the returned promise
    /// from inside a handler stalls this worker's own mailbox until the
    /// reply arrives.
    pub fn send_request<R: Request>(&self, request: R) -> Option<Promise<R::Reply>> {
        self.bus.send_request(request)
    }

    /// Send a fire-and-forget notification through the bus.
    pub fn send_notification<N: Notification>(&self, notification: N) {
        self.bus.send_notification(notification)
    }

    /// Ask the run loop to exit before consuming the next message.
    pub fn terminate(&self) {
        self.stop.set(true);
    }

    /// Whether [`WorkerContext::terminate`] has been called.
    pub fn is_terminating(&self) -> bool {
        self.stop.get()
    }
}

/// Unregisters on drop, so a panicking handler or a failed `init` cannot
/// leave stale routing entries behind.
struct RegistrationGuard<'a> {
    bus: &'a MessageBus,
    id: &'a WorkerId,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        self.bus.unregister(self.id);
    }
}

/// Run a worker's full lifecycle on the calling thread.
///
/// Registers a fresh identity, runs [`Worker::init`], then consumes the
/// mailbox one message at a time until the worker terminates cooperatively
/// or its mailbox is closed. Handler errors are logged and the loop moves to
/// the next message; they never reach the bus or other workers.
///
/// # Errors
///
/// Propagates failures from [`Worker::init`]. A closed mailbox is treated as
/// shutdown, not an error.
pub fn run<W: Worker>(mut worker: W, bus: Arc<MessageBus>) -> Result<(), BusError> {
    let id = WorkerId::new(worker.name());
    bus.register(&id);
    let _guard = RegistrationGuard {
        bus: bus.as_ref(),
        id: &id,
    };

    let mut registry = HandlerRegistry::new();
    {
        let mut setup = SetupContext {
            bus: &bus,
            id: &id,
            registry: &mut registry,
        };
        worker.init(&mut setup)?;
    }
    let ctx = WorkerContext::new(Arc::clone(&bus), id.clone());
    tracing::debug!(worker = %id, handlers = registry.handler_count(), "worker running");

    while !ctx.is_terminating() {
        let envelope = match bus.await_next(&id) {
            Ok(envelope) => envelope,
            Err(BusError::MailboxClosed(_)) => break,
            Err(err) => return Err(err),
        };
        let message = envelope.type_name();
        if let Err(err) = registry.dispatch(&mut worker, &ctx, envelope) {
            tracing::error!(worker = %id, message, error = %err, "handler failed");
        }
    }

    tracing::debug!(worker = %id, "worker stopped");
    Ok(())
}

/// Spawn a worker on its own named OS thread.
///
/// # Errors
///
/// Returns the underlying I/O error if the thread cannot be created.
pub fn spawn<W: Worker>(bus: Arc<MessageBus>, worker: W) -> io::Result<WorkerHandle> {
    let thread_name = worker.name().to_string();
    let join = thread::Builder::new()
        .name(thread_name)
        .spawn(move || run(worker, bus))?;
    Ok(WorkerHandle { join })
}

/// Join handle for a spawned worker thread.
pub struct WorkerHandle {
    join: thread::JoinHandle<Result<(), BusError>>,
}

impl WorkerHandle {
    /// Wait for the worker's run loop to finish.
    ///
    /// A panicked worker thread is reported as
    /// [`BusError::WorkerPanicked`]; its registration was already released
    /// during unwinding.
    pub fn join(self) -> Result<(), BusError> {
        self.join
            .join()
            .unwrap_or(Err(BusError::WorkerPanicked))
    }

    /// Whether the worker thread has finished.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
