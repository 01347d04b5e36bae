//! Error types for the switchboard message bus.

use crate::worker::WorkerId;
use thiserror::Error;

/// Errors raised by bus operations.
///
/// Unhandled requests are deliberately *not* an error: `send_request` returns
/// `None` when no subscriber exists, and callers must treat that as a normal
/// outcome. Likewise, resolving a request twice (or late) is a silent no-op.
#[derive(Debug, Error)]
pub enum BusError {
    /// The worker has no live mailbox on this bus.
    ///
    /// Consuming or subscribing for an unregistered identity is a programming
    /// error, fatal to the calling operation.
    #[error("worker {0} is not registered")]
    NotRegistered(WorkerId),

    /// The worker's mailbox was destroyed while (or before) the caller was
    /// blocked in `await_next`.
    ///
    /// The run loop treats this as a shutdown signal.
    #[error("mailbox for worker {0} was closed")]
    MailboxClosed(WorkerId),

    /// A worker thread panicked before its run loop completed.
    ///
    /// Reported on the join side only; the bus itself stays consistent
    /// because registration is released on unwind.
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Errors confined to a single worker's dispatch loop.
///
/// A handler failure never propagates into the bus or other workers: the run
/// loop logs it and moves on to the next message.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The worker subscribed to a message type but registered no handler for it.
    #[error("no handler registered for message type '{0}'")]
    NoHandler(&'static str),

    /// The envelope payload did not downcast to the handler's message type.
    #[error("payload type mismatch for message type '{0}'")]
    PayloadType(&'static str),

    /// The handler itself reported a failure.
    #[error("handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    /// Convenience constructor for handler-reported failures.
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed(reason.into())
    }
}
