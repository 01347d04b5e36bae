//! # Switchboard
//!
//! An in-process message bus for thread-per-worker microservices.
//!
//! Independent workers never call each other: they publish typed messages
//! through a shared [`MessageBus`], which load-balances request/response
//! *requests* round-robin across subscriber pools and fans out
//! fire-and-forget *notifications* to every subscriber. A request's reply
//! travels back through a [`Promise`], a one-shot result cell the sender can
//! block on.
//!
//! ## Crate Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     worker runtime                           │
//! │  Worker trait • SetupContext • run loop • spawn              │
//! │  HandlerRegistry: TypeId → handler closure                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │                     MessageBus                               │
//! │  mailboxes • subscription routes (+ round-robin cursor)      │
//! │  pending table: RequestId → Promise                          │
//! ├──────────────────────────┬───────────────────────────────────┤
//! │  message taxonomy        │  Promise                          │
//! │  Request / Notification  │  one-shot, blockable result cell  │
//! │  Envelope / ReplyToken   │                                   │
//! └──────────────────────────┴───────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchboard::prelude::*;
//!
//! let bus = Arc::new(MessageBus::new());
//! let worker = worker::spawn(Arc::clone(&bus), MyWorker::new())?;
//!
//! if let Some(promise) = bus.send_request(MyRequest { .. }) {
//!     println!("reply: {:?}", promise.get());
//! }
//! ```
//!
//! ## Guarantees (and non-guarantees)
//!
//! - Per-mailbox FIFO and per-type, send-order round-robin fairness.
//! - Exactly-once delivery of a request to one live subscriber.
//! - No ordering across message types or mailboxes, no persistence, no
//!   delivery beyond the current process.

#![deny(missing_docs)]

pub mod bus;
pub mod error;
pub mod message;
pub mod prelude;
pub mod promise;
pub mod worker;

pub use bus::MessageBus;
pub use error::{BusError, HandlerError};
pub use message::{Envelope, Notification, ReplyToken, Request, RequestId};
pub use promise::Promise;
pub use worker::{Responder, SetupContext, Worker, WorkerContext, WorkerHandle, WorkerId};
