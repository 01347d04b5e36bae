//! Message taxonomy: requests, notifications, and the type-erased envelope.
//!
//! The bus knows two disjoint message kinds:
//!
//! - a **request** expects exactly one reply value and is routed to a single
//!   subscriber (round-robin), tracked by a [`Promise`](crate::Promise);
//! - a **notification** is fire-and-forget and fanned out to every
//!   subscriber.
//!
//! Both are plain data types; implementing [`Request`] or [`Notification`]
//! is the whole contract. Inside a mailbox they travel as an [`Envelope`],
//! which erases the concrete type and keeps its [`TypeId`] for dispatch.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

/// A message kind expecting exactly one reply value.
///
/// The declared [`Request::Reply`] type is what the matching
/// [`Promise`](crate::Promise) resolves to. `Reply: Clone` because a promise
/// is multi-reader.
///
/// # Example
///
/// ```rust,ignore
/// struct DetectObjects { frame: u64 }
///
/// impl Request for DetectObjects {
///     type Reply = bool;
/// }
/// ```
pub trait Request: Send + 'static {
    /// The reply value this request resolves to.
    type Reply: Clone + Send + 'static;
}

/// A fire-and-forget message kind with no reply.
///
/// `Clone` is required because a send enqueues one copy of the notification
/// into every subscriber's mailbox.
pub trait Notification: Clone + Send + 'static {}

/// Identity of a specific request *instance*.
///
/// Two requests with identical payloads are distinct instances with distinct
/// ids. Allocated by the bus when the request is dispatched; unique within
/// one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw id value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A typed token naming one in-flight request instance.
///
/// Produced when a request envelope is dispatched to a handler; consumed by
/// [`MessageBus::resolve`](crate::MessageBus::resolve) to deliver the reply
/// to exactly that instance's promise. The type parameter pins the reply
/// type so resolution cannot cross request kinds.
pub struct ReplyToken<R: Request> {
    id: RequestId,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request> ReplyToken<R> {
    pub(crate) fn new(id: RequestId) -> Self {
        Self {
            id,
            _request: PhantomData,
        }
    }

    /// The request instance this token resolves.
    pub fn request_id(&self) -> RequestId {
        self.id
    }
}

impl<R: Request> fmt::Debug for ReplyToken<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReplyToken").field(&self.id).finish()
    }
}

/// Extract the simple type name from a fully-qualified path, for diagnostics.
///
/// Generic arguments are dropped so `HashMap<String, u64>` shows as
/// `HashMap`, not a fragment of its parameter list.
pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum EnvelopeKind {
    Request(RequestId),
    Notification,
}

/// A type-erased message as stored in a worker's mailbox.
///
/// Carries the message kind, the concrete payload behind `dyn Any`, and the
/// payload's [`TypeId`] used by the handler registry to pick a handler.
pub struct Envelope {
    kind: EnvelopeKind,
    type_id: TypeId,
    type_name: &'static str,
    payload: Box<dyn Any + Send>,
}

impl Envelope {
    pub(crate) fn request<R: Request>(id: RequestId, request: R) -> Self {
        Self {
            kind: EnvelopeKind::Request(id),
            type_id: TypeId::of::<R>(),
            type_name: short_type_name::<R>(),
            payload: Box::new(request),
        }
    }

    pub(crate) fn notification<N: Notification>(notification: N) -> Self {
        Self {
            kind: EnvelopeKind::Notification,
            type_id: TypeId::of::<N>(),
            type_name: short_type_name::<N>(),
            payload: Box::new(notification),
        }
    }

    /// Whether the payload is of concrete type `M`.
    pub fn is<M: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    /// Simple name of the payload type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this envelope carries a request.
    pub fn is_request(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Request(_))
    }

    /// Whether this envelope carries a notification.
    pub fn is_notification(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Notification)
    }

    /// Borrow the payload as `M`, if that is its concrete type.
    pub fn payload_ref<M: 'static>(&self) -> Option<&M> {
        self.payload.downcast_ref::<M>()
    }

    /// Build a reply token for this envelope, if it carries a request of
    /// type `R`.
    pub fn reply_token<R: Request>(&self) -> Option<ReplyToken<R>> {
        match self.kind {
            EnvelopeKind::Request(id) if self.is::<R>() => Some(ReplyToken::new(id)),
            _ => None,
        }
    }

    pub(crate) fn into_parts(self) -> (EnvelopeKind, TypeId, &'static str, Box<dyn Any + Send>) {
        (self.kind, self.type_id, self.type_name, self.payload)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish()
    }
}
