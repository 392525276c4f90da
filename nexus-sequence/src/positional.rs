//! Fallible positional access through a handle.
//!
//! [`Positional`] is what iterators, cursors and views are generic over.
//! It is implemented for every [`Shared`] handle whose storage is a
//! [`SequenceStorage`], and by [`SubRange`](crate::SubRange) so that views
//! can be iterated, split and nested exactly like their parents.

use crate::storage::{SequenceStorage, Shared};
use crate::{CollectionError, Result, Version};

/// Positional operations through an interior-mutable handle.
pub trait Positional: Clone {
    /// Element type.
    type Item;

    /// Number of elements visible through this handle.
    fn len(&self) -> Result<usize>;

    /// Structural version visible through this handle.
    fn version(&self) -> Result<Version>;

    /// Clone of the element at `index`.
    fn get(&self, index: usize) -> Result<Self::Item>
    where
        Self::Item: Clone;

    /// Replaces the element at `index`, returning the previous value.
    fn set(&self, index: usize, value: Self::Item) -> Result<Self::Item>;

    /// Inserts at `index` (`index <= len`).
    fn insert(&self, index: usize, value: Self::Item) -> Result<()>;

    /// Removes the element at `index`.
    fn remove_at(&self, index: usize) -> Result<Self::Item>;

    /// Removes `[from, to)`.
    fn remove_range(&self, from: usize, to: usize) -> Result<()>;

    /// Inserts `values` at `index` in order.
    fn insert_all(&self, index: usize, values: Vec<Self::Item>) -> Result<()>;

    /// Clones `[from, to)`.
    fn copy_range(&self, from: usize, to: usize) -> Result<Vec<Self::Item>>
    where
        Self::Item: Clone;
}

impl<H> Positional for H
where
    H: Shared,
    H::Target: SequenceStorage,
{
    type Item = <H::Target as SequenceStorage>::Item;

    #[inline]
    fn len(&self) -> Result<usize> {
        self.read(|s| s.len())
    }

    #[inline]
    fn version(&self) -> Result<Version> {
        self.read(|s| s.version())
    }

    fn get(&self, index: usize) -> Result<Self::Item>
    where
        Self::Item: Clone,
    {
        self.read(|s| {
            s.get(index)
                .cloned()
                .ok_or_else(|| CollectionError::out_of_bounds(index, s.len()))
        })?
    }

    fn set(&self, index: usize, value: Self::Item) -> Result<Self::Item> {
        self.write(|s| s.replace(index, value))?
    }

    fn insert(&self, index: usize, value: Self::Item) -> Result<()> {
        self.write(|s| s.insert(index, value))?
    }

    fn remove_at(&self, index: usize) -> Result<Self::Item> {
        self.write(|s| s.remove_at(index))?
    }

    fn remove_range(&self, from: usize, to: usize) -> Result<()> {
        self.write(|s| s.remove_range(from, to))?
    }

    fn insert_all(&self, index: usize, values: Vec<Self::Item>) -> Result<()> {
        self.write(|s| s.insert_all(index, values))?
    }

    fn copy_range(&self, from: usize, to: usize) -> Result<Vec<Self::Item>>
    where
        Self::Item: Clone,
    {
        self.read(|s| {
            crate::error::check_range(from, to, s.len())?;
            Ok(s.copy_range(from, to))
        })?
    }
}
