//! Connections between a signal and a slot.
//!
//! A [`Connection`] is the token for one signal-to-slot subscription. Both
//! endpoints keep an `Arc` of it in their own connection container, while
//! the connection refers back to them only weakly. It therefore lives as
//! long as the longer-lived holder, and no reference cycle is created.
//!
//! # Lifecycle
//!
//! ```text
//! connect ──► Valid ──disconnect / endpoint drop──► Invalid ──► Removed
//! ```
//!
//! Invalidation is immediate. Physical removal from an endpoint's container
//! is immediate when that container is idle, and deferred to its last
//! release when a dispatch is iterating it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::extension::{Extension, ExtensionBase};
use crate::logging::targets;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection, used for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// The connection dispatches.
    Valid,
    /// The connection was disconnected and never dispatches again.
    Invalid,
}

/// Shared handle to a connection.
pub type ConnectionPtr = Arc<Connection>;

/// A link between a source (signal) endpoint and a target (slot) endpoint.
///
/// Equality is identity: two handles are equal when they point at the same
/// connection.
pub struct Connection {
    id: ConnectionId,
    source: Weak<dyn Extension>,
    target: Weak<dyn Extension>,
    valid: AtomicBool,
}

impl Connection {
    /// Create a valid connection. The caller registers it on the endpoints.
    pub(crate) fn new(source: Weak<dyn Extension>, target: Weak<dyn Extension>) -> ConnectionPtr {
        Arc::new(Self {
            id: ConnectionId::next(),
            source,
            target,
            valid: AtomicBool::new(true),
        })
    }

    /// The connection's identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The source endpoint, if it is still alive.
    pub fn source(&self) -> Option<Arc<dyn Extension>> {
        self.source.upgrade()
    }

    /// The target endpoint, if it is still alive.
    pub fn target(&self) -> Option<Arc<dyn Extension>> {
        self.target.upgrade()
    }

    /// Whether the connection still dispatches.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// The connection's state.
    pub fn state(&self) -> ConnectionState {
        if self.is_valid() {
            ConnectionState::Valid
        } else {
            ConnectionState::Invalid
        }
    }

    /// Whether `endpoint` is this connection's source.
    pub fn is_source(&self, endpoint: &ExtensionBase) -> bool {
        std::ptr::addr_eq(self.source.as_ptr(), endpoint.weak_this().as_ptr())
    }

    /// Whether `endpoint` is this connection's target.
    pub fn is_target(&self, endpoint: &ExtensionBase) -> bool {
        std::ptr::addr_eq(self.target.as_ptr(), endpoint.weak_this().as_ptr())
    }

    /// Whether `endpoint` is either end of this connection.
    pub fn involves(&self, endpoint: &ExtensionBase) -> bool {
        self.is_source(endpoint) || self.is_target(endpoint)
    }

    /// Mark the connection invalid. Returns whether it was valid before.
    pub(crate) fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }

    /// Invalidate the connection and remove it from both endpoints.
    ///
    /// Safe to call at any time, including from a slot running inside a
    /// dispatch that iterates one of the endpoints' containers: the dispatch
    /// skips the connection from then on, and the physical removal waits for
    /// that container's last release. Returns whether the connection was
    /// valid before the call.
    pub fn disconnect(self: &Arc<Self>) -> bool {
        let was_valid = self.invalidate();
        for endpoint in [&self.source, &self.target] {
            if let Some(extension) = endpoint.upgrade() {
                extension.base().connections().remove(self);
            }
        }
        if was_valid {
            tracing::debug!(target: targets::CONNECTION, id = %self.id, "connection disconnected");
        }
        was_valid
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_of = |endpoint: &Weak<dyn Extension>| {
            endpoint
                .upgrade()
                .map(|extension| extension.name().to_string())
        };
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("source", &name_of(&self.source))
            .field("target", &name_of(&self.target))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::ReturnValue;
    use crate::extension::CallbackExtension;

    fn endpoint(name: &str) -> Arc<CallbackExtension> {
        CallbackExtension::new(name, |_, _| ReturnValue::empty())
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_endpoint_roles() {
        let source = endpoint("source");
        let target = endpoint("target");
        let other = endpoint("other");

        let connection = Connection::new(source.base().weak_this(), target.base().weak_this());
        assert!(connection.is_source(source.base()));
        assert!(!connection.is_source(target.base()));
        assert!(connection.is_target(target.base()));
        assert!(!connection.involves(other.base()));
        assert_eq!(connection.state(), ConnectionState::Valid);
    }

    #[test]
    fn test_disconnect_removes_from_both_endpoints() {
        let source = endpoint("source");
        let target = endpoint("target");
        let connection = Connection::new(source.base().weak_this(), target.base().weak_this());
        source.base().connections().push(connection.clone());
        target.base().connections().push(connection.clone());

        assert!(connection.disconnect());
        assert_eq!(connection.state(), ConnectionState::Invalid);
        assert!(source.base().connections().is_empty());
        assert!(target.base().connections().is_empty());

        // A second disconnect is a no-op.
        assert!(!connection.disconnect());
    }

    #[test]
    fn test_endpoints_held_weakly() {
        let source = endpoint("source");
        let connection = {
            let target = endpoint("target");
            Connection::new(source.base().weak_this(), target.base().weak_this())
        };
        assert!(connection.source().is_some());
        assert!(connection.target().is_none());
    }

    #[test]
    fn test_identity_equality() {
        let source = endpoint("source");
        let a = Connection::new(source.base().weak_this(), source.base().weak_this());
        let b = Connection::new(source.base().weak_this(), source.base().weak_this());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
