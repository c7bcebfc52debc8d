//! Signal extensions and connection dispatch.
//!
//! A [`SignalExtension`] is an extension that owns connections to slot
//! extensions and invokes them when it runs. Dispatch is safe against
//! reentrancy: a slot may connect or disconnect slots on the very signal
//! that is invoking it, including disconnecting itself.
//!
//! # Key Types
//!
//! - [`SignalExtension`] - The signal endpoint and dispatcher
//! - [`SignalConfig`] / [`SignalBuilder`] - Construction options
//! - [`TriggerState`] - Whether the signal is dispatching
//!
//! # Dispatch
//!
//! Emitting retains the connection container through a
//! [`LockView`](crate::container::LockView) and walks that snapshot in
//! insertion order. Each slot runs inside a
//! [`RelockGuard`](crate::container::RelockGuard), so mutations the slot
//! requests apply right away instead of piling up behind the dispatch.
//!
//! - Connections added during a dispatch are not visited by it; the next
//!   dispatch sees them.
//! - Connections invalidated before their turn are skipped.
//! - Slots whose extension has been dropped are skipped silently.
//!
//! Dispatches are tracked per thread. Emits on different threads run side
//! by side, each reporting its own snapshot size from
//! [`connection_count`](SignalExtension::connection_count), while a nested
//! run on the thread already dispatching is refused.
//!
//! # Example
//!
//! ```
//! use tether_core::{CallbackExtension, PackagedArguments, ReturnValue, SignalExtension};
//!
//! let clicked = SignalExtension::new("clicked");
//! let on_click = CallbackExtension::new("on_click", |_, args| {
//!     println!("clicked at {:?}", args.get::<(i32, i32)>(0));
//!     ReturnValue::empty()
//! });
//!
//! let connection = clicked.connect(on_click.clone());
//! assert_eq!(clicked.emit(&PackagedArguments::new().with((10, 20))), 1);
//!
//! clicked.disconnect(&connection);
//! assert_eq!(clicked.emit(&PackagedArguments::new().with((10, 20))), 0);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::arguments::{PackagedArguments, ReturnValue, Signature};
use crate::connection::{Connection, ConnectionPtr};
use crate::container::{LockView, RelockGuard};
use crate::extension::{Extension, ExtensionBase};
use crate::logging::targets;

/// Whether a signal is dispatching on the calling thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TriggerState {
    /// No dispatch in progress on this thread.
    #[default]
    Idle,
    /// At least one dispatch in progress on this thread.
    Dispatching {
        /// Number of dispatches in progress on this thread (nested emits).
        depth: usize,
        /// Size of the snapshot the innermost dispatch iterates.
        view_len: usize,
    },
}

/// One dispatch in progress.
#[derive(Clone, Copy, Debug)]
struct DispatchFrame {
    thread: ThreadId,
    view_len: usize,
}

/// Construction options for a [`SignalExtension`].
#[derive(Clone, Debug)]
pub struct SignalConfig {
    /// Extension name, used for lookup on the owning object.
    pub name: String,
    /// Argument shape accepted by the signal.
    pub signature: Signature,
    /// Whether the signal starts blocked.
    pub blocked: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            name: "signal".to_string(),
            signature: Signature::any(),
            blocked: false,
        }
    }
}

impl SignalConfig {
    /// Create a configuration with the given name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating signals with custom configuration.
#[derive(Debug, Default)]
pub struct SignalBuilder {
    config: SignalConfig,
}

impl SignalBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the accepted argument shape.
    pub fn signature(mut self, signature: Signature) -> Self {
        self.config.signature = signature;
        self
    }

    /// Start the signal blocked.
    pub fn blocked(mut self, blocked: bool) -> Self {
        self.config.blocked = blocked;
        self
    }

    /// Build the signal.
    pub fn build(self) -> Arc<SignalExtension> {
        SignalExtension::with_config(self.config)
    }
}

/// Registers one dispatch frame and removes it on drop.
struct TriggerScope<'a> {
    frames: &'a Mutex<Vec<DispatchFrame>>,
    thread: ThreadId,
}

impl<'a> TriggerScope<'a> {
    fn enter(
        frames: &'a Mutex<Vec<DispatchFrame>>,
        locked: &mut Vec<DispatchFrame>,
        view_len: usize,
    ) -> Self {
        let thread = thread::current().id();
        locked.push(DispatchFrame { thread, view_len });
        Self { frames, thread }
    }
}

impl Drop for TriggerScope<'_> {
    fn drop(&mut self) {
        let mut frames = self.frames.lock();
        // Frames of one thread nest, so the last one is ours.
        if let Some(index) = frames.iter().rposition(|frame| frame.thread == self.thread) {
            frames.remove(index);
        }
    }
}

/// An extension that dispatches to connected slot extensions.
///
/// Connections are shared with the slots they target; see
/// [`Connection`](crate::Connection) for their lifecycle.
///
/// # Thread Safety
///
/// `SignalExtension` is `Send + Sync`. No lock is held while a slot runs.
///
/// # Panics
///
/// Dropping a signal while one of its dispatches is still iterating is a
/// contract violation; the connection container panics on drop.
pub struct SignalExtension {
    base: ExtensionBase,
    signature: Signature,
    /// Dispatches in progress, on any thread. Locked before the connection
    /// container whenever both are needed.
    frames: Mutex<Vec<DispatchFrame>>,
}

static_assertions::assert_impl_all!(SignalExtension: Send, Sync);

impl SignalExtension {
    /// Create a signal accepting any arguments.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_config(SignalConfig::with_name(name))
    }

    /// Create a signal from a configuration.
    pub fn with_config(config: SignalConfig) -> Arc<Self> {
        let SignalConfig {
            name,
            signature,
            blocked,
        } = config;
        Arc::new_cyclic(|this: &Weak<Self>| {
            let base = ExtensionBase::new(name, this.clone());
            base.set_blocked(blocked);
            Self {
                base,
                signature,
                frames: Mutex::new(Vec::new()),
            }
        })
    }

    /// Start building a signal.
    pub fn builder() -> SignalBuilder {
        SignalBuilder::new()
    }

    /// The argument shape accepted by this signal.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The trigger state as seen from the calling thread.
    pub fn trigger_state(&self) -> TriggerState {
        let thread = thread::current().id();
        let frames = self.frames.lock();
        let mut depth = 0;
        let mut view_len = 0;
        for frame in frames.iter().filter(|frame| frame.thread == thread) {
            depth += 1;
            view_len = frame.view_len;
        }
        if depth == 0 {
            TriggerState::Idle
        } else {
            TriggerState::Dispatching { depth, view_len }
        }
    }

    /// Whether a dispatch is in progress on any thread.
    pub fn is_triggering(&self) -> bool {
        !self.frames.lock().is_empty()
    }

    /// Whether the calling thread is inside a dispatch of this signal.
    pub fn is_triggering_here(&self) -> bool {
        matches!(self.trigger_state(), TriggerState::Dispatching { .. })
    }

    /// Whether emission is blocked.
    pub fn is_blocked(&self) -> bool {
        self.base.is_blocked()
    }

    /// Block or unblock emission.
    pub fn set_blocked(&self, blocked: bool) {
        self.base.set_blocked(blocked);
    }

    /// Connect `slot` to this signal.
    ///
    /// The connection is registered on both endpoints and returned valid.
    /// A signal may be connected to itself; such a connection is dispatched
    /// like any other, and the nested run reports that it did not run
    /// because the signal is already busy.
    pub fn connect(&self, slot: Arc<dyn Extension>) -> ConnectionPtr {
        let connection = Connection::new(self.base.weak_this(), Arc::downgrade(&slot));
        self.base.add_connection(connection.clone());
        if !slot.base().same_extension(&self.base) {
            slot.base().add_connection(connection.clone());
        }
        tracing::debug!(
            target: targets::SIGNAL,
            signal = %self.base.name(),
            slot = slot.name(),
            id = %connection.id(),
            "connected"
        );
        connection
    }

    /// Connect the extension named `name` on the owning object.
    ///
    /// Returns `None`, creating nothing, if the signal is not attached to an
    /// object or the object has no such extension.
    pub fn connect_to(&self, name: &str) -> Option<ConnectionPtr> {
        let Some(object) = self.base.object() else {
            tracing::warn!(target: targets::SIGNAL, signal = %self.base.name(), slot = name, "connect by name on a detached signal");
            return None;
        };
        let Some(slot) = object.find_extension(name) else {
            tracing::debug!(target: targets::SIGNAL, signal = %self.base.name(), slot = name, "no extension to connect");
            return None;
        };
        Some(self.connect(slot))
    }

    /// Disconnect `connection`.
    ///
    /// Callable at any time, including from a slot during dispatch: it only
    /// affects the steps that have not run yet. Returns `false` if the
    /// connection does not involve this signal or was already disconnected.
    pub fn disconnect(&self, connection: &ConnectionPtr) -> bool {
        if !connection.involves(&self.base) {
            return false;
        }
        connection.disconnect()
    }

    /// Disconnect every connection to or from this signal.
    ///
    /// Refused while the signal is dispatching on any thread: returns
    /// `false` and changes nothing. Callers may retry once the dispatch has
    /// completed. The check and the tear-down happen under the lock that
    /// starts a dispatch, so no dispatch can begin in between.
    pub fn try_disconnect(&self) -> bool {
        let frames = self.frames.lock();
        if !frames.is_empty() {
            tracing::warn!(target: targets::SIGNAL, signal = %self.base.name(), "disconnect refused while dispatching");
            return false;
        }
        let disconnected = self.base.disconnect_all();
        drop(frames);
        tracing::debug!(target: targets::SIGNAL, signal = %self.base.name(), disconnected, "disconnected all");
        true
    }

    /// Number of connections.
    ///
    /// Called from inside a dispatch, this is the size of the snapshot that
    /// dispatch iterates, regardless of mutations made since. Otherwise it
    /// is read from the live container and may already be stale if another
    /// thread is connecting or disconnecting.
    pub fn connection_count(&self) -> usize {
        let thread = thread::current().id();
        let frames = self.frames.lock();
        match frames.iter().rev().find(|frame| frame.thread == thread) {
            Some(frame) => frame.view_len,
            None => self.base.connections().view().len(),
        }
    }

    /// Invoke every connected slot with `args`.
    ///
    /// Returns the number of slots that ran. Nothing is invoked if `args`
    /// fail the signature check or the signal is blocked.
    pub fn emit(&self, args: &PackagedArguments) -> usize {
        if !self.signature.verify(args) {
            tracing::trace!(target: targets::SIGNAL, signal = %self.base.name(), "signature mismatch, not dispatching");
            return 0;
        }
        if self.base.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, signal = %self.base.name(), "signal blocked, skipping emit");
            return 0;
        }
        self.dispatch(args)
    }

    #[tracing::instrument(name = "tether::dispatch", skip_all, target = "tether_core::signal", level = "trace", fields(signal = %self.base.name()))]
    fn dispatch(&self, args: &PackagedArguments) -> usize {
        let connections = self.base.connections();
        let mut frames = self.frames.lock();
        let view = LockView::new(connections);
        let _trigger = TriggerScope::enter(&self.frames, &mut frames, view.len());
        drop(frames);
        tracing::trace!(target: targets::SIGNAL, connection_count = view.len(), "dispatching");

        let mut ran = 0;
        for connection in view.iter() {
            if !connection.is_valid() {
                tracing::trace!(target: targets::SIGNAL, id = %connection.id(), "skipping disconnected connection");
                continue;
            }
            // Keeps the slot alive for the call.
            let Some(slot) = connection.target() else {
                tracing::trace!(target: targets::SIGNAL, id = %connection.id(), "skipping dropped slot");
                continue;
            };
            // The same connection is also stored on the slot side.
            if !connection.is_source(&self.base) {
                continue;
            }

            let _relock = RelockGuard::new(connections);
            if slot.run(args).is_some() {
                ran += 1;
            }
        }
        ran
    }
}

impl Extension for SignalExtension {
    fn base(&self) -> &ExtensionBase {
        &self.base
    }

    fn run_override(&self, args: &PackagedArguments) -> ReturnValue {
        ReturnValue::new(self.dispatch(args))
    }

    fn verify_signature(&self, args: &PackagedArguments) -> bool {
        self.signature.verify(args)
    }

    fn is_busy(&self) -> bool {
        self.is_triggering_here()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for SignalExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalExtension")
            .field("name", &self.base.name())
            .field("signature", &self.signature)
            .field("state", &self.trigger_state())
            .field("connections", &self.base.connections().len())
            .finish()
    }
}
