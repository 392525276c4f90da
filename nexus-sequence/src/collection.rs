//! Capability traits shared by every container.
//!
//! Containers do not inherit from one another. Each one implements the
//! capabilities it supports independently:
//!
//! | Trait | Array | Chain | Hashed | Ordered | Sync |
//! |-------|:-----:|:-----:|:------:|:-------:|:----:|
//! | [`Collection`] | ✓ | ✓ | ✓ | ✓ | ✓ |
//! | [`Sequence`] | ✓ | ✓ | | | ✓ |
//! | [`Membership`] | ✓ | ✓ | ✓ | ✓ | ✓ |

use std::collections::{BTreeSet, HashSet};
use std::hash::{BuildHasher, Hash};

use crate::Result;

/// Element-collection surface common to all containers.
///
/// Every call borrows the storage for its own duration, so each one can
/// fail with `ConcurrentModification` when made from inside a mutating
/// callback on the same storage.
pub trait Collection<T> {
    /// Number of elements.
    fn len(&self) -> Result<usize>;

    /// Returns `true` if there are no elements.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns `true` if an element equal to `value` is present.
    fn contains(&self, value: &T) -> Result<bool>;

    /// Adds `value`. Returns `false` when a set already held it.
    fn add(&self, value: T) -> Result<bool>;

    /// Removes one element equal to `value`.
    fn remove(&self, value: &T) -> Result<bool>;

    /// Snapshot of the elements in iteration order.
    fn to_vec(&self) -> Result<Vec<T>>;
}

/// Index-addressable collection.
pub trait Sequence<T>: Collection<T> {
    /// Clone of the element at `index`.
    fn get(&self, index: usize) -> Result<T>;

    /// Replaces the element at `index`. Not a structural modification.
    fn set(&self, index: usize, value: T) -> Result<T>;

    /// Inserts at `index`; `index == len` appends.
    fn insert(&self, index: usize, value: T) -> Result<()>;

    /// Removes and returns the element at `index`.
    fn remove_at(&self, index: usize) -> Result<T>;

    /// Position of the first element equal to `value`.
    fn index_of(&self, value: &T) -> Result<Option<usize>>;

    /// Position of the last element equal to `value`.
    fn last_index_of(&self, value: &T) -> Result<Option<usize>>;
}

/// Fallible membership test used by bulk set-difference and intersection.
///
/// The test may fail; containers report a busy storage borrow as
/// [`ConcurrentModification`](crate::CollectionError::ConcurrentModification).
pub trait Membership<T> {
    /// Returns `Ok(true)` if `value` is a member.
    fn is_member(&self, value: &T) -> Result<bool>;
}

impl<T: PartialEq> Membership<T> for [T] {
    #[inline]
    fn is_member(&self, value: &T) -> Result<bool> {
        Ok(self.contains(value))
    }
}

impl<T: PartialEq> Membership<T> for Vec<T> {
    #[inline]
    fn is_member(&self, value: &T) -> Result<bool> {
        Ok(self.as_slice().contains(value))
    }
}

impl<T: Eq + Hash, S: BuildHasher> Membership<T> for HashSet<T, S> {
    #[inline]
    fn is_member(&self, value: &T) -> Result<bool> {
        Ok(self.contains(value))
    }
}

impl<T: Ord> Membership<T> for BTreeSet<T> {
    #[inline]
    fn is_member(&self, value: &T) -> Result<bool> {
        Ok(self.contains(value))
    }
}
