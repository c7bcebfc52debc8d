use std::fmt;
use std::sync::Arc;

use super::guarded::GuardedContainer;

/// An immutable range over a snapshot of a guarded container.
///
/// A `View` does not retain anything. When built from
/// [`GuardedContainer::view`] it is a plain copy of the live content and may
/// diverge from the container's locked view as soon as it is created.
pub struct View<T> {
    items: Arc<[T]>,
}

impl<T> View<T> {
    /// Wrap an existing snapshot.
    pub fn new(items: Arc<[T]>) -> Self {
        Self { items }
    }

    /// Iterate the view in container order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of items in the view.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// The view as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Whether `position` lies within this view.
    ///
    /// Positions are only meaningful for the view they were obtained from.
    /// Comparing a position taken from another retain/release cycle gives an
    /// answer about this view, not about the item the caller had in mind.
    pub fn in_view(&self, position: usize) -> bool {
        position < self.items.len()
    }
}

impl<T: PartialEq> View<T> {
    /// Position of the first occurrence of `item`.
    pub fn find(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|candidate| candidate == item)
    }

    /// Whether the view contains `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.find(item).is_some()
    }
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> FromIterator<T> for View<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> From<Vec<T>> for View<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items.into())
    }
}

impl<'a, T> IntoIterator for &'a View<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

/// Retains a guarded container for the lifetime of the value.
///
/// The container is retained on construction and released on drop, on every
/// exit path including early returns and unwinding. However many times the
/// container is retained meanwhile, a `LockView` always iterates the locked
/// view it obtained on construction.
pub struct LockView<'a, T: Clone + PartialEq> {
    container: &'a GuardedContainer<T>,
    view: View<T>,
}

impl<'a, T: Clone + PartialEq> LockView<'a, T> {
    /// Retain `container` and capture its locked view.
    pub fn new(container: &'a GuardedContainer<T>) -> Self {
        let view = container.retain();
        Self { container, view }
    }

    /// Iterate the locked view.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.view.iter()
    }

    /// Position of the first occurrence of `item` in the locked view.
    pub fn find(&self, item: &T) -> Option<usize> {
        self.view.find(item)
    }

    /// Whether the locked view contains `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.view.contains(item)
    }

    /// Number of items in the locked view.
    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// Whether the locked view is empty.
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// The underlying locked view.
    pub fn view(&self) -> &View<T> {
        &self.view
    }
}

impl<T: Clone + PartialEq> Drop for LockView<'_, T> {
    fn drop(&mut self) {
        self.container.release();
    }
}

impl<'a, 'b, T: Clone + PartialEq> IntoIterator for &'b LockView<'a, T> {
    type Item = &'b T;
    type IntoIter = std::slice::Iter<'b, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Clone + PartialEq + fmt::Debug> fmt::Debug for LockView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockView").field("view", &self.view).finish()
    }
}

/// Temporarily gives back one retain of a guarded container.
///
/// Used around reentrant-risk calls made while a [`LockView`] is alive: the
/// release lets mutations requested by the callee apply immediately, and the
/// retain taken again on drop restores the caller's count without taking a
/// new snapshot. The enclosing `LockView` keeps iterating its own snapshot
/// throughout.
pub struct RelockGuard<'a, T: Clone + PartialEq> {
    container: &'a GuardedContainer<T>,
}

impl<'a, T: Clone + PartialEq> RelockGuard<'a, T> {
    /// Release one retain of `container`.
    ///
    /// # Panics
    ///
    /// Panics if the container is not retained.
    pub fn new(container: &'a GuardedContainer<T>) -> Self {
        container.release();
        Self { container }
    }
}

impl<T: Clone + PartialEq> Drop for RelockGuard<'_, T> {
    fn drop(&mut self) {
        self.container.reacquire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn container_of(items: &[&'static str]) -> GuardedContainer<&'static str> {
        let container = GuardedContainer::new();
        for &item in items {
            container.push(item);
        }
        container
    }

    #[test]
    fn test_view_find_and_bounds() {
        let view = View::from(vec!["a", "b", "c"]);
        assert_eq!(view.find(&"b"), Some(1));
        assert_eq!(view.find(&"z"), None);
        assert!(view.contains(&"c"));
        assert!(view.in_view(2));
        assert!(!view.in_view(3));
        assert_eq!(view.iter().copied().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lock_view_releases_on_scope_exit() {
        let container = container_of(&["a", "b"]);
        {
            let view = LockView::new(&container);
            assert_eq!(container.ref_count(), 1);
            assert_eq!(view.len(), 2);
            assert_eq!(view.find(&"b"), Some(1));
        }
        assert_eq!(container.ref_count(), 0);
    }

    #[test]
    fn test_lock_view_releases_on_early_return() {
        fn first_match(container: &GuardedContainer<&'static str>, wanted: &str) -> Option<usize> {
            let view = LockView::new(container);
            for (index, item) in view.iter().enumerate() {
                if *item == wanted {
                    return Some(index);
                }
            }
            None
        }

        let container = container_of(&["a", "b", "c"]);
        assert_eq!(first_match(&container, "a"), Some(0));
        assert_eq!(first_match(&container, "x"), None);
        assert_eq!(container.ref_count(), 0);
    }

    #[test]
    fn test_lock_view_releases_on_unwind() {
        let container = container_of(&["a"]);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _view = LockView::new(&container);
            container.push("b");
            panic!("slot failed");
        }));
        assert!(result.is_err());
        assert_eq!(container.ref_count(), 0);
        // The deferred push was applied by the release during unwinding.
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_lock_view_ignores_later_mutation() {
        let container = container_of(&["a", "b"]);
        let view = LockView::new(&container);
        container.push("c");
        container.remove(&"a");
        let seen: Vec<_> = view.iter().copied().collect();
        assert_eq!(seen, vec!["a", "b"]);
        drop(view);
        assert_eq!(container.view().as_slice(), &["b", "c"]);
    }

    #[test]
    fn test_relock_guard_opens_mutation_window() {
        let container = container_of(&["a", "b"]);
        let view = LockView::new(&container);
        {
            let _relock = RelockGuard::new(&container);
            assert_eq!(container.ref_count(), 0);
            container.push("c");
            // Applied immediately: nothing is retained inside the window.
            assert_eq!(container.len(), 3);
        }
        assert_eq!(container.ref_count(), 1);
        assert_eq!(view.len(), 2);
        drop(view);
        assert_eq!(container.ref_count(), 0);
    }

    #[test]
    fn test_nested_lock_views_balance() {
        let container = container_of(&["a"]);
        let outer = LockView::new(&container);
        {
            let inner = LockView::new(&container);
            assert_eq!(container.ref_count(), 2);
            assert_eq!(inner.len(), outer.len());
        }
        assert_eq!(container.ref_count(), 1);
        drop(outer);
        assert_eq!(container.ref_count(), 0);
    }
}
