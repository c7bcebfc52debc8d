use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::view::View;
use crate::logging::targets;

/// A structural change requested while the container was retained.
enum PendingOp<T> {
    Push(T),
    Remove(T),
    Clear,
}

struct GuardState<T> {
    /// Live content.
    items: Vec<T>,
    /// Number of outstanding retains.
    retain_count: usize,
    /// Snapshot shared by every retain. Taken lazily after a reacquire.
    locked: Option<Arc<[T]>>,
    /// Mutations deferred until the retain count drops to zero.
    pending: Vec<PendingOp<T>>,
}

impl<T: PartialEq> GuardState<T> {
    /// Whether `item` is present once the pending log is applied.
    fn effectively_contains(&self, item: &T) -> bool {
        let mut count = self.items.iter().filter(|candidate| *candidate == item).count();
        for op in &self.pending {
            match op {
                PendingOp::Push(pushed) if pushed == item => count += 1,
                PendingOp::Remove(removed) if removed == item => count = count.saturating_sub(1),
                PendingOp::Clear => count = 0,
                _ => {}
            }
        }
        count > 0
    }

    fn snapshot(&mut self) -> Arc<[T]>
    where
        T: Clone,
    {
        let items = &self.items;
        Arc::clone(
            self.locked
                .get_or_insert_with(|| items.iter().cloned().collect()),
        )
    }

    fn remove_now(&mut self, item: &T) -> bool {
        match self.items.iter().position(|candidate| candidate == item) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }
}

/// An ordered container whose content is only iterated through retained
/// snapshots.
///
/// The retain counter is the single source of truth for "a snapshot of this
/// container is in use". While it is non-zero, [`push`](Self::push) and
/// [`remove`](Self::remove) are recorded in a pending log and applied, in
/// request order, by the [`release`](Self::release) that brings the counter
/// back to zero.
///
/// All state sits behind one mutex, which is never held while callers work
/// with a view.
///
/// # Panics
///
/// Dropping a container that is still retained panics: an unreleased guard
/// means some iteration outlived the data it was iterating.
pub struct GuardedContainer<T> {
    state: Mutex<GuardState<T>>,
}

impl<T: Clone + PartialEq> Default for GuardedContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> GuardedContainer<T> {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GuardState {
                items: Vec::new(),
                retain_count: 0,
                locked: None,
                pending: Vec::new(),
            }),
        }
    }

    /// Retain the container and return its locked view.
    ///
    /// The first retain snapshots the live content. Every retain made while
    /// the container is already retained returns that same snapshot. Each
    /// call must be paired with exactly one [`release`](Self::release);
    /// prefer [`LockView`](super::LockView), which does the pairing for you.
    pub fn retain(&self) -> View<T> {
        let mut state = self.state.lock();
        state.retain_count += 1;
        View::new(state.snapshot())
    }

    /// Take back a retain given up by a [`RelockGuard`](super::RelockGuard).
    ///
    /// Only the counter moves. The holder already has its snapshot, so none
    /// is built here; the next [`retain`](Self::retain) or
    /// [`locked_view`](Self::locked_view) takes one if it is needed.
    pub(crate) fn reacquire(&self) {
        self.state.lock().retain_count += 1;
    }

    /// Release one retain.
    ///
    /// When the count reaches zero the locked snapshot is dropped and all
    /// deferred mutations are applied.
    ///
    /// # Panics
    ///
    /// Panics if the container is not retained.
    pub fn release(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        assert!(
            state.retain_count > 0,
            "release() called on a guarded container that is not retained"
        );
        state.retain_count -= 1;
        if state.retain_count > 0 {
            return;
        }

        state.locked = None;
        let pending = std::mem::take(&mut state.pending);
        if pending.is_empty() {
            return;
        }
        let applied = pending.len();
        for op in pending {
            match op {
                PendingOp::Push(item) => state.items.push(item),
                PendingOp::Remove(item) => {
                    state.remove_now(&item);
                }
                PendingOp::Clear => state.items.clear(),
            }
        }
        tracing::trace!(target: targets::CONTAINER, applied, len = state.items.len(), "applied deferred mutations");
    }

    /// Append an item. Deferred while the container is retained.
    pub fn push(&self, item: T) {
        let mut state = self.state.lock();
        if state.retain_count > 0 {
            state.pending.push(PendingOp::Push(item));
        } else {
            state.items.push(item);
        }
    }

    /// Remove the first occurrence of `item`.
    ///
    /// Returns `true` if the item was present, counting insertions that are
    /// still pending. The removal itself is deferred while the container is
    /// retained.
    pub fn remove(&self, item: &T) -> bool {
        let mut state = self.state.lock();
        if state.retain_count == 0 {
            return state.remove_now(item);
        }
        if !state.effectively_contains(item) {
            return false;
        }
        state.pending.push(PendingOp::Remove(item.clone()));
        true
    }

    /// Remove every item. Deferred while the container is retained.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if state.retain_count > 0 {
            state.pending.push(PendingOp::Clear);
        } else {
            state.items.clear();
        }
    }

    /// The locked view, if the container is currently retained.
    pub fn locked_view(&self) -> Option<View<T>> {
        let mut state = self.state.lock();
        if state.retain_count == 0 {
            return None;
        }
        Some(View::new(state.snapshot()))
    }

    /// An unguarded copy of the live content.
    ///
    /// This does not retain. While the container is retained the result can
    /// differ from the locked view, and it never includes pending mutations.
    pub fn view(&self) -> View<T> {
        self.state.lock().items.iter().cloned().collect()
    }

    /// Number of live items, not counting pending mutations.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the live content is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of outstanding retains.
    pub fn ref_count(&self) -> usize {
        self.state.lock().retain_count
    }

    /// Number of mutations waiting for the last release.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl<T> Drop for GuardedContainer<T> {
    fn drop(&mut self) {
        let retained = self.state.get_mut().retain_count;
        if retained != 0 && !std::thread::panicking() {
            panic!("guarded container dropped with {retained} outstanding retain(s)");
        }
    }
}

impl<T> fmt::Debug for GuardedContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GuardedContainer")
            .field("len", &state.items.len())
            .field("retain_count", &state.retain_count)
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn container_of(items: &[i32]) -> GuardedContainer<i32> {
        let container = GuardedContainer::new();
        for &item in items {
            container.push(item);
        }
        container
    }

    #[test]
    fn test_mutation_applies_immediately_when_idle() {
        let container = container_of(&[1, 2, 3]);
        assert!(container.remove(&2));
        assert!(!container.remove(&42));
        assert_eq!(container.view().as_slice(), &[1, 3]);
        assert_eq!(container.pending_len(), 0);
    }

    #[test]
    fn test_mutation_deferred_while_retained() {
        let container = container_of(&[1, 2]);
        let view = container.retain();

        container.push(3);
        assert!(container.remove(&1));
        assert_eq!(container.view().as_slice(), &[1, 2]);
        assert_eq!(container.pending_len(), 2);
        assert_eq!(view.as_slice(), &[1, 2]);

        container.release();
        assert_eq!(container.view().as_slice(), &[2, 3]);
        assert_eq!(container.pending_len(), 0);
        assert_eq!(container.ref_count(), 0);
    }

    #[test]
    fn test_nested_retain_shares_locked_view() {
        let container = container_of(&[1]);
        let outer = container.retain();
        container.push(2);
        let inner = container.retain();

        assert_eq!(container.ref_count(), 2);
        assert_eq!(outer.as_slice(), inner.as_slice());
        assert_eq!(inner.len(), 1);

        container.release();
        // Still retained by the outer holder.
        assert_eq!(container.len(), 1);
        container.release();
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_locked_view_only_while_retained() {
        let container = container_of(&[7]);
        assert!(container.locked_view().is_none());
        let _view = container.retain();
        assert_eq!(container.locked_view().map(|v| v.len()), Some(1));
        container.release();
        assert!(container.locked_view().is_none());
    }

    #[test]
    fn test_remove_of_pending_push() {
        let container = container_of(&[]);
        let _view = container.retain();
        container.push(5);
        assert!(container.remove(&5));
        // A second removal has nothing left to remove.
        assert!(!container.remove(&5));
        container.release();
        assert!(container.is_empty());
    }

    #[test]
    fn test_clear_when_idle() {
        let container = container_of(&[1, 2, 3]);
        container.clear();
        assert!(container.is_empty());
        assert_eq!(container.pending_len(), 0);
    }

    #[test]
    fn test_clear_deferred_in_request_order() {
        let container = container_of(&[1, 2]);
        let view = container.retain();

        container.push(3);
        container.clear();
        container.push(4);
        assert_eq!(container.len(), 2);
        assert_eq!(view.as_slice(), &[1, 2]);
        // Cleared items are no longer removable.
        assert!(!container.remove(&1));
        assert!(container.remove(&4));
        container.push(5);

        container.release();
        assert_eq!(container.view().as_slice(), &[5]);
    }

    #[test]
    fn test_reacquire_does_not_snapshot() {
        #[derive(Debug, PartialEq)]
        struct Counted(u32);

        static CLONES: AtomicUsize = AtomicUsize::new(0);

        impl Clone for Counted {
            fn clone(&self) -> Self {
                CLONES.fetch_add(1, Ordering::SeqCst);
                Counted(self.0)
            }
        }

        let container = GuardedContainer::new();
        for i in 0..100 {
            container.push(Counted(i));
        }

        let view = container.retain();
        for _ in view.iter() {
            container.release();
            container.reacquire();
        }
        container.release();

        // Only the first retain copies the items.
        assert_eq!(CLONES.load(Ordering::SeqCst), 100);
        assert_eq!(container.ref_count(), 0);
    }

    #[test]
    fn test_locked_view_after_reacquire() {
        let container = container_of(&[1]);
        let _view = container.retain();
        container.release();
        container.push(2);
        container.reacquire();

        // Taken on demand from the live content.
        assert_eq!(container.locked_view().map(|v| v.len()), Some(2));
        container.release();
    }

    #[test]
    #[should_panic(expected = "not retained")]
    fn test_release_without_retain_panics() {
        let container = container_of(&[1]);
        container.release();
    }

    #[test]
    #[should_panic(expected = "outstanding retain")]
    fn test_drop_while_retained_panics() {
        let container = container_of(&[1]);
        let _view = container.retain();
        drop(container);
    }
}
