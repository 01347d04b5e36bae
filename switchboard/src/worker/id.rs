//! Opaque identities for running worker instances.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// The identity of one running worker instance.
///
/// An identity is *not* the worker's declared type: two workers may share a
/// type (and even a name) but never an identity. Equality and hashing use
/// only the process-unique serial; the name exists for diagnostics.
///
/// Identities are minted once and never reused. An identity whose mailbox
/// was destroyed by `unregister` must not be registered again — create a
/// fresh one instead.
#[derive(Debug, Clone)]
pub struct WorkerId {
    serial: u64,
    name: Arc<str>,
}

impl WorkerId {
    /// Mint a fresh identity with a human-readable display name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name.as_ref()),
        }
    }

    /// The display name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The process-unique serial number.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl PartialEq for WorkerId {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for WorkerId {}

impl Hash for WorkerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.serial)
    }
}
