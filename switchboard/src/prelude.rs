//! Common imports for switchboard workers.
//!
//! This module provides a convenient prelude for importing commonly used types and traits.

pub use crate::bus::MessageBus;
pub use crate::error::{BusError, HandlerError};
pub use crate::message::{Envelope, Notification, ReplyToken, Request, RequestId};
pub use crate::promise::Promise;
pub use crate::worker::{
    self, Responder, SetupContext, Worker, WorkerContext, WorkerHandle, WorkerId,
};

// Re-export commonly used external types
pub use std::sync::Arc;
pub use std::time::Duration;
