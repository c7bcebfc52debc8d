//! Core systems for Tether.
//!
//! This crate provides the object-extension model and the signal dispatch
//! machinery built on it:
//!
//! - **Guarded Containers**: Ordered storage iterated through retained
//!   snapshots, with mutation deferred while a snapshot is in use
//! - **Object Model**: Named objects owning named, runnable extensions
//! - **Signal Extensions**: Reentrancy-safe dispatch to connected slots
//! - **Connections**: Shared links between a signal and a slot
//!
//! # Signal Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use tether_core::{CallbackExtension, Object, PackagedArguments, ReturnValue, Signature, SignalExtension};
//!
//! let object = Object::create("counter");
//! let value_changed = SignalExtension::builder()
//!     .name("value_changed")
//!     .signature(Signature::new().arg::<i32>())
//!     .build();
//!
//! let total = Arc::new(AtomicI32::new(0));
//! let total_clone = total.clone();
//! let on_change = CallbackExtension::new("on_change", move |_, args| {
//!     if let Ok(value) = args.get::<i32>(0) {
//!         total_clone.fetch_add(*value, Ordering::SeqCst);
//!     }
//!     ReturnValue::empty()
//! });
//!
//! object.add_extension(value_changed.clone()).unwrap();
//! object.add_extension(on_change).unwrap();
//!
//! // Slots can be resolved by name on the owning object.
//! let connection = value_changed.connect_to("on_change").unwrap();
//!
//! assert_eq!(value_changed.emit(&PackagedArguments::new().with(42_i32)), 1);
//! assert_eq!(total.load(Ordering::SeqCst), 42);
//!
//! // Arguments of the wrong shape are not dispatched.
//! assert_eq!(value_changed.emit(&PackagedArguments::new().with("42")), 0);
//!
//! connection.disconnect();
//! assert_eq!(value_changed.connection_count(), 0);
//! ```

pub mod arguments;
pub mod connection;
pub mod container;
mod error;
pub mod extension;
pub mod logging;
pub mod object;
pub mod signal;

pub use arguments::{Argument, PackagedArguments, ReturnValue, Signature};
pub use connection::{Connection, ConnectionId, ConnectionPtr, ConnectionState};
pub use container::{GuardedContainer, LockView, RelockGuard, View};
pub use error::{ArgumentError, Error, ObjectError, Result};
pub use extension::{Callback, CallbackExtension, Extension, ExtensionBase};
pub use logging::{FormatOptions, ObjectDebug, PerfSpan, TreeStyle};
pub use object::{ExtensionId, Object, ObjectResult};
pub use signal::{SignalBuilder, SignalConfig, SignalExtension, TriggerState};
