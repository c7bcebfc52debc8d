//! Object extensions.
//!
//! An extension is a named, runnable unit attached to an [`Object`]. Every
//! extension can be the target of a connection, and signals are extensions
//! that can also be a connection's source.
//!
//! # Implementing an extension
//!
//! Extensions are created inside an `Arc` so that their [`ExtensionBase`] can
//! hold a weak handle to the extension itself:
//!
//! ```
//! use std::any::Any;
//! use std::sync::{Arc, Weak};
//! use tether_core::{Extension, ExtensionBase, PackagedArguments, ReturnValue};
//!
//! struct Doubler {
//!     base: ExtensionBase,
//! }
//!
//! impl Doubler {
//!     fn new(name: &str) -> Arc<Self> {
//!         Arc::new_cyclic(|this: &Weak<Self>| Self {
//!             base: ExtensionBase::new(name, this.clone()),
//!         })
//!     }
//! }
//!
//! impl Extension for Doubler {
//!     fn base(&self) -> &ExtensionBase {
//!         &self.base
//!     }
//!
//!     fn run_override(&self, args: &PackagedArguments) -> ReturnValue {
//!         match args.get::<i32>(0) {
//!             Ok(value) => ReturnValue::new(value * 2),
//!             Err(_) => ReturnValue::empty(),
//!         }
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let doubler = Doubler::new("double");
//! let result = doubler.run(&PackagedArguments::new().with(21_i32));
//! assert_eq!(result.and_then(|r| r.get::<i32>().copied()), Some(42));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::arguments::{PackagedArguments, ReturnValue};
use crate::connection::ConnectionPtr;
use crate::container::GuardedContainer;
use crate::logging::targets;
use crate::object::Object;

/// A named, runnable unit attached to an object.
///
/// Implementors provide [`base`](Self::base), [`run_override`](Self::run_override)
/// and [`as_any`](Self::as_any). [`run`](Self::run) is the entry point
/// callers and signals use; it is not meant to be overridden.
pub trait Extension: Any + Send + Sync {
    /// The shared extension state.
    fn base(&self) -> &ExtensionBase;

    /// The extension's behaviour.
    fn run_override(&self, args: &PackagedArguments) -> ReturnValue;

    /// Whether `args` have the shape this extension expects.
    fn verify_signature(&self, _args: &PackagedArguments) -> bool {
        true
    }

    /// Whether the extension is already running and refuses to be entered
    /// again through [`run`](Self::run).
    fn is_busy(&self) -> bool {
        false
    }

    /// Get this as Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The extension's name.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// The short type name of the extension, for diagnostics.
    fn type_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Run the extension.
    ///
    /// Returns `None` if the extension did not run: it is blocked, already
    /// busy, or `args` fail its signature check. Otherwise returns the result
    /// of [`run_override`](Self::run_override).
    fn run(&self, args: &PackagedArguments) -> Option<ReturnValue> {
        let base = self.base();
        if base.is_blocked() {
            tracing::trace!(target: targets::OBJECT, extension = base.name(), "extension blocked, not running");
            return None;
        }
        if self.is_busy() {
            tracing::trace!(target: targets::OBJECT, extension = base.name(), "extension busy, not running");
            return None;
        }
        if !self.verify_signature(args) {
            tracing::trace!(target: targets::OBJECT, extension = base.name(), "signature mismatch, not running");
            return None;
        }
        Some(self.run_override(args))
    }
}

impl fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.type_name())
            .field("name", &self.name())
            .field("connections", &self.base().connections().len())
            .finish()
    }
}

/// State shared by every extension.
///
/// Holds the name, a weak handle to the owning extension, the owning object
/// (weakly), the connection container and the blocked flag. Dropping the
/// base disconnects every connection it still holds.
pub struct ExtensionBase {
    name: String,
    this: Weak<dyn Extension>,
    object: RwLock<Weak<Object>>,
    connections: GuardedContainer<ConnectionPtr>,
    blocked: AtomicBool,
}

impl ExtensionBase {
    /// Create the base for the extension `this` points to.
    ///
    /// Use inside `Arc::new_cyclic`, naming the closure parameter's type
    /// (`|this: &Weak<Self>|`) so the weak handle is created for the concrete
    /// extension and coerced here. See the [module documentation](self).
    pub fn new(name: impl Into<String>, this: Weak<dyn Extension>) -> Self {
        Self {
            name: name.into(),
            this,
            object: RwLock::new(Weak::new()),
            connections: GuardedContainer::new(),
            blocked: AtomicBool::new(false),
        }
    }

    /// The extension's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A strong handle to the owning extension, while it is alive.
    pub fn this(&self) -> Option<Arc<dyn Extension>> {
        self.this.upgrade()
    }

    /// A weak handle to the owning extension.
    pub fn weak_this(&self) -> Weak<dyn Extension> {
        self.this.clone()
    }

    /// Whether `other` belongs to the same extension as this base.
    pub fn same_extension(&self, other: &ExtensionBase) -> bool {
        std::ptr::addr_eq(self.this.as_ptr(), other.this.as_ptr())
    }

    /// The object this extension is attached to.
    pub fn object(&self) -> Option<Arc<Object>> {
        self.object.read().upgrade()
    }

    /// Attach to `object`. Fails if attached to another live object.
    pub(crate) fn attach(&self, object: Weak<Object>) -> bool {
        let mut current = self.object.write();
        if current.strong_count() > 0 {
            return false;
        }
        *current = object;
        true
    }

    pub(crate) fn detach(&self) {
        *self.object.write() = Weak::new();
    }

    /// The connections this extension takes part in, as source or target.
    pub fn connections(&self) -> &GuardedContainer<ConnectionPtr> {
        &self.connections
    }

    /// Register a connection on this endpoint.
    pub(crate) fn add_connection(&self, connection: ConnectionPtr) {
        self.connections.push(connection);
    }

    /// Whether running is suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Suppress or re-enable running.
    ///
    /// A blocked slot reports that it did not run; a blocked signal
    /// dispatches nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Disconnect every connection this extension takes part in.
    ///
    /// Unconditional: callers that may run inside a dispatch should go
    /// through [`SignalExtension::try_disconnect`](crate::SignalExtension::try_disconnect).
    /// Returns the number of connections that were still valid.
    pub fn disconnect_all(&self) -> usize {
        self.connections
            .view()
            .iter()
            .filter(|connection| connection.disconnect())
            .count()
    }
}

impl Drop for ExtensionBase {
    fn drop(&mut self) {
        let disconnected = self.disconnect_all();
        if disconnected > 0 {
            tracing::debug!(target: targets::OBJECT, extension = %self.name, disconnected, "extension dropped, connections invalidated");
        }
    }
}

impl fmt::Debug for ExtensionBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionBase")
            .field("name", &self.name)
            .field("connections", &self.connections.len())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// The closure type run by a [`CallbackExtension`].
pub type Callback = dyn Fn(&CallbackExtension, &PackagedArguments) -> ReturnValue + Send + Sync;

/// An extension that runs a replaceable closure.
///
/// # Example
///
/// ```
/// use tether_core::{CallbackExtension, Extension, PackagedArguments, ReturnValue};
///
/// let greet = CallbackExtension::new("greet", |this, _| {
///     ReturnValue::new(format!("hello from {}", this.name()))
/// });
/// let result = greet.run(&PackagedArguments::new()).unwrap();
/// assert_eq!(result.get::<String>().map(String::as_str), Some("hello from greet"));
/// ```
pub struct CallbackExtension {
    base: ExtensionBase,
    callback: RwLock<Arc<Callback>>,
}

impl CallbackExtension {
    /// Create an extension running `callback`.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Arc<Self>
    where
        F: Fn(&CallbackExtension, &PackagedArguments) -> ReturnValue + Send + Sync + 'static,
    {
        let name = name.into();
        let callback: Arc<Callback> = Arc::new(callback);
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            base: ExtensionBase::new(name, this.clone()),
            callback: RwLock::new(callback),
        })
    }

    /// Replace the closure. Takes effect from the next run.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&CallbackExtension, &PackagedArguments) -> ReturnValue + Send + Sync + 'static,
    {
        *self.callback.write() = Arc::new(callback);
    }
}

impl Extension for CallbackExtension {
    fn base(&self) -> &ExtensionBase {
        &self.base
    }

    fn run_override(&self, args: &PackagedArguments) -> ReturnValue {
        // Cloned out so the callback may replace itself.
        let callback = Arc::clone(&self.callback.read());
        callback(self, args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for CallbackExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackExtension")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_run_calls_callback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let ext = CallbackExtension::new("record", move |_, args| {
            calls_clone.lock().push(*args.get::<i32>(0).unwrap());
            ReturnValue::empty()
        });

        assert!(ext.run(&PackagedArguments::new().with(5_i32)).is_some());
        assert_eq!(*calls.lock(), vec![5]);
    }

    #[test]
    fn test_blocked_extension_does_not_run() {
        let ext = CallbackExtension::new("noop", |_, _| ReturnValue::new(1_u8));
        ext.base().set_blocked(true);
        assert!(ext.run(&PackagedArguments::new()).is_none());
        ext.base().set_blocked(false);
        assert!(ext.run(&PackagedArguments::new()).is_some());
    }

    #[test]
    fn test_set_callback_from_inside_callback() {
        let ext = CallbackExtension::new("swap", |this, _| {
            this.set_callback(|_, _| ReturnValue::new("second"));
            ReturnValue::new("first")
        });
        let args = PackagedArguments::new();
        assert_eq!(ext.run(&args).unwrap().get::<&str>(), Some(&"first"));
        assert_eq!(ext.run(&args).unwrap().get::<&str>(), Some(&"second"));
    }

    #[test]
    fn test_type_name_and_downcast() {
        let ext: Arc<dyn Extension> = CallbackExtension::new("x", |_, _| ReturnValue::empty());
        assert_eq!(ext.type_name(), "CallbackExtension");
        assert!(ext.as_any().downcast_ref::<CallbackExtension>().is_some());
        assert_eq!(ext.name(), "x");
    }

    #[test]
    fn test_same_extension() {
        let a = CallbackExtension::new("a", |_, _| ReturnValue::empty());
        let b = CallbackExtension::new("b", |_, _| ReturnValue::empty());
        assert!(a.base().same_extension(a.base()));
        assert!(!a.base().same_extension(b.base()));
        assert!(a.base().this().is_some());
    }
}
