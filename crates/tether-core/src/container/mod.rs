//! Guarded containers and the views used to iterate them.
//!
//! A [`GuardedContainer`] never hands out its live storage. Readers either
//! take an unguarded [`View`] copy, or retain the container and iterate its
//! *locked view* through a [`LockView`]. While at least one retain is
//! outstanding, structural mutation is queued and applied when the last
//! holder releases.
//!
//! # Key Types
//!
//! - [`GuardedContainer`] - Ordered storage with a retain counter and a
//!   pending-mutation log
//! - [`View`] - Immutable range over a snapshot of the container
//! - [`LockView`] - Scoped retain, released on drop
//! - [`RelockGuard`] - Scoped release of one retain, re-acquired on drop
//!
//! # Example
//!
//! ```
//! use tether_core::container::{GuardedContainer, LockView};
//!
//! let container = GuardedContainer::new();
//! container.push(1);
//! container.push(2);
//!
//! {
//!     let view = LockView::new(&container);
//!     // Mutation while locked is deferred.
//!     container.push(3);
//!     assert_eq!(view.len(), 2);
//!     assert_eq!(container.pending_len(), 1);
//! }
//!
//! assert_eq!(container.len(), 3);
//! ```

mod guarded;
mod view;

pub use guarded::GuardedContainer;
pub use view::{LockView, RelockGuard, View};
