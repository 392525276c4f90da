//! Storage and handle capabilities.
//!
//! Every container is split in two: a storage type that owns the elements
//! and the [`Version`], and a handle that owns (or shares) a cell wrapping
//! that storage. Views, iterators and cursors never touch the elements
//! directly; they go through the handle, so the owner stays the only
//! mutator of its storage.
//!
//! | Cell | Alias | Used by |
//! |------|-------|---------|
//! | `Rc<RefCell<S>>` | [`LocalCell`] | single-writer containers |
//! | `Arc<ReentrantMutex<RefCell<S>>>` | [`SyncCell`] | the legacy synchronized array |
//!
//! A busy borrow (reentrant access while the same storage is mid-mutation)
//! is reported as [`CollectionError::ConcurrentModification`] rather than a
//! panic.

use std::cell::RefCell;
use std::rc::{self, Rc};
use std::sync::{self, Arc};

use parking_lot::ReentrantMutex;

use crate::{CollectionError, Result, Version};

/// Single-threaded shared cell.
pub type LocalCell<S> = Rc<RefCell<S>>;

/// Per-call locked cell shared across threads.
pub type SyncCell<S> = Arc<ReentrantMutex<RefCell<S>>>;

// ============================================================================
// SequenceStorage
// ============================================================================

/// Positional element storage with a structural-modification counter.
///
/// Implemented by the contiguous array and the node chain. Positional
/// mutators validate their indices and bump the version when they change
/// the element count; [`replace`](Self::replace) never bumps it.
pub trait SequenceStorage {
    /// Element type.
    type Item;

    /// Number of live elements.
    fn len(&self) -> usize;

    /// Current structural version.
    fn version(&self) -> Version;

    /// Element at `index`, or `None` when `index >= len`.
    fn get(&self, index: usize) -> Option<&Self::Item>;

    /// Replaces the element at `index`, returning the old one.
    fn replace(&mut self, index: usize, value: Self::Item) -> Result<Self::Item>;

    /// Inserts `value` at `index` (`index <= len`).
    fn insert(&mut self, index: usize, value: Self::Item) -> Result<()>;

    /// Removes and returns the element at `index`.
    fn remove_at(&mut self, index: usize) -> Result<Self::Item>;

    /// Removes the half-open range `[from, to)`.
    fn remove_range(&mut self, from: usize, to: usize) -> Result<()>;

    /// Inserts every value at `index`, preserving their order.
    fn insert_all(&mut self, index: usize, values: Vec<Self::Item>) -> Result<()>;

    /// Clones `[from, to)` into a vector.
    ///
    /// The range must already be validated against `len`.
    fn copy_range(&self, from: usize, to: usize) -> Vec<Self::Item>
    where
        Self::Item: Clone,
    {
        (from..to).filter_map(|i| self.get(i).cloned()).collect()
    }

    /// Returns `true` if `len() == 0`.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Shared
// ============================================================================

/// Access to storage behind a shared handle.
///
/// `read` and `write` run a closure against the storage for the duration of
/// one call. Neither holds the borrow after returning, so traversal
/// callbacks run with the storage released.
pub trait Shared: Clone {
    /// The storage behind the handle.
    type Target;

    /// Non-owning counterpart of the handle.
    type Weak: Clone;

    /// Runs `f` with shared access to the storage.
    fn read<R>(&self, f: impl FnOnce(&Self::Target) -> R) -> Result<R>;

    /// Runs `f` with exclusive access to the storage.
    fn write<R>(&self, f: impl FnOnce(&mut Self::Target) -> R) -> Result<R>;

    /// Creates a non-owning handle.
    fn downgrade(&self) -> Self::Weak;

    /// Recovers a strong handle, failing with
    /// [`CollectionError::Detached`] once every strong handle is gone.
    fn upgrade(weak: &Self::Weak) -> Result<Self>;
}

impl<S> Shared for Rc<RefCell<S>> {
    type Target = S;
    type Weak = rc::Weak<RefCell<S>>;

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        let guard = self
            .try_borrow()
            .map_err(|_| CollectionError::ConcurrentModification)?;
        Ok(f(&guard))
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut guard = self
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentModification)?;
        Ok(f(&mut guard))
    }

    #[inline]
    fn downgrade(&self) -> Self::Weak {
        Rc::downgrade(self)
    }

    #[inline]
    fn upgrade(weak: &Self::Weak) -> Result<Self> {
        weak.upgrade().ok_or(CollectionError::Detached)
    }
}

impl<S> Shared for Arc<ReentrantMutex<RefCell<S>>> {
    type Target = S;
    type Weak = sync::Weak<ReentrantMutex<RefCell<S>>>;

    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        let lock = self.lock();
        let guard = lock
            .try_borrow()
            .map_err(|_| CollectionError::ConcurrentModification)?;
        Ok(f(&guard))
    }

    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let lock = self.lock();
        let mut guard = lock
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentModification)?;
        Ok(f(&mut guard))
    }

    #[inline]
    fn downgrade(&self) -> Self::Weak {
        Arc::downgrade(self)
    }

    #[inline]
    fn upgrade(weak: &Self::Weak) -> Result<Self> {
        weak.upgrade().ok_or(CollectionError::Detached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_local_cell_reports_concurrent_modification() {
        let cell: LocalCell<Vec<u32>> = Rc::new(RefCell::new(vec![1, 2]));
        let other = cell.clone();
        let result = cell.write(|v| {
            v.push(3);
            other.read(|v| v.len())
        });
        assert!(matches!(
            result,
            Ok(Err(CollectionError::ConcurrentModification))
        ));
        assert_eq!(cell.read(|v| v.len()).unwrap(), 3);
    }

    #[test]
    fn weak_upgrade_fails_after_drop() {
        let cell: LocalCell<Vec<u32>> = Rc::new(RefCell::new(Vec::new()));
        let weak = cell.downgrade();
        assert!(<LocalCell<Vec<u32>> as Shared>::upgrade(&weak).is_ok());
        drop(cell);
        assert!(matches!(
            <LocalCell<Vec<u32>> as Shared>::upgrade(&weak),
            Err(CollectionError::Detached)
        ));
    }

    #[test]
    fn sync_cell_reentrant_read_inside_read() {
        let cell: SyncCell<Vec<u32>> = Arc::new(ReentrantMutex::new(RefCell::new(vec![7])));
        let other = cell.clone();
        let nested = cell.read(|v| other.read(|w| v[0] + w[0])).unwrap();
        assert_eq!(nested.unwrap(), 14);
    }
}
