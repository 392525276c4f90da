//! Contiguous growable array.
//!
//! Live elements occupy slots `[0, len)` of a backing buffer whose logical
//! capacity is always at least `len`. When an insertion needs more room
//! the capacity grows to `max(C + C/2, required)`, clamped to
//! [`MAX_ARRAY_LENGTH`]; a requirement above that limit fails with
//! [`CapacityExceeded`](crate::CollectionError::CapacityExceeded).
//! Capacity only shrinks through [`GrowableArray::trim_to_size`].
//!
//! ```text
//! capacity = 10
//! ┌────┬────┬────┬────┬────┬────┬────┬────┬────┬────┐
//! │ 10 │ 20 │ 30 │ 40 │    │    │    │    │    │    │
//! └────┴────┴────┴────┴────┴────┴────┴────┴────┴────┘
//!   0    1    2    3  ^ len = 4
//! ```
//!
//! # Example
//!
//! ```
//! use nexus_sequence::GrowableArray;
//!
//! let array = GrowableArray::new();
//! array.add(5).unwrap();
//! array.add(10).unwrap();
//! array.insert(1, 7).unwrap();
//! array.remove_at(0).unwrap();
//! assert_eq!(array.to_vec().unwrap(), vec![7, 10]);
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use log::debug;

use crate::collection::{Collection, Membership, Sequence};
use crate::cursor::IndexCursor;
use crate::error::{check_index, check_position, check_range};
use crate::iter::Iter;
use crate::storage::{LocalCell, SequenceStorage, Shared};
use crate::view::SubRange;
use crate::{CollectionError, Result, Version};

/// Capacity adopted on first growth by an array created with `new()`.
pub const DEFAULT_CAPACITY: usize = 10;

/// Largest element count an array may hold.
pub const MAX_ARRAY_LENGTH: usize = i32::MAX as usize - 8;

// ============================================================================
// Growth policy
// ============================================================================

/// Capacity growth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// `C + C/2`. Used by [`GrowableArray`].
    HalfAgain,
    /// `2C`. Default for [`SyncArray`](crate::SyncArray).
    Double,
    /// `C + n`; an increment of zero doubles.
    Increment(usize),
}

impl Growth {
    /// Capacity to adopt when `required` exceeds `current`.
    pub fn next_capacity(self, current: usize, required: usize) -> Result<usize> {
        if required > MAX_ARRAY_LENGTH {
            return Err(CollectionError::CapacityExceeded {
                requested: required,
                max: MAX_ARRAY_LENGTH,
            });
        }
        let grown = match self {
            Growth::HalfAgain => current.saturating_add(current >> 1),
            Growth::Double | Growth::Increment(0) => current.saturating_mul(2),
            Growth::Increment(n) => current.saturating_add(n),
        };
        Ok(grown.max(required).min(MAX_ARRAY_LENGTH))
    }
}

// ============================================================================
// Marks
// ============================================================================

/// Bitmap of positions selected by the first pass of a filtered removal.
#[derive(Debug)]
pub(crate) struct Marks {
    words: Vec<u64>,
    count: usize,
}

impl Marks {
    fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; bitmap_words(len)],
            count: 0,
        }
    }

    #[inline]
    fn set(&mut self, idx: usize) {
        self.words[idx / 64] |= 1 << (idx % 64);
        self.count += 1;
    }

    #[inline]
    fn is_set(&self, idx: usize) -> bool {
        (self.words[idx / 64] & (1 << (idx % 64))) != 0
    }
}

const fn bitmap_words(len: usize) -> usize {
    len.div_ceil(64)
}

// ============================================================================
// ArrayStorage
// ============================================================================

/// Backing storage of a growable array.
///
/// `capacity` is tracked logically; the `Vec` is reserved to match it.
#[derive(Debug)]
pub struct ArrayStorage<T> {
    elements: Vec<T>,
    capacity: usize,
    growth: Growth,
    /// Set until the first growth of an array built with the default
    /// constructor.
    pending_default: bool,
    version: Version,
}

impl<T> ArrayStorage<T> {
    /// Empty storage that adopts [`DEFAULT_CAPACITY`] on first growth.
    pub fn new(growth: Growth) -> Self {
        Self {
            elements: Vec::new(),
            capacity: 0,
            growth,
            pending_default: true,
            version: Version::new(),
        }
    }

    /// Empty storage with [`DEFAULT_CAPACITY`] slots reserved up front.
    pub fn eager(growth: Growth) -> Self {
        Self {
            elements: Vec::with_capacity(DEFAULT_CAPACITY),
            capacity: DEFAULT_CAPACITY,
            growth,
            pending_default: false,
            version: Version::new(),
        }
    }

    /// Empty storage with exactly `capacity` slots.
    pub fn with_capacity(capacity: usize, growth: Growth) -> Result<Self> {
        if capacity > MAX_ARRAY_LENGTH {
            return Err(CollectionError::CapacityExceeded {
                requested: capacity,
                max: MAX_ARRAY_LENGTH,
            });
        }
        Ok(Self {
            elements: Vec::with_capacity(capacity),
            capacity,
            growth,
            pending_default: false,
            version: Version::new(),
        })
    }

    /// Storage holding `elements`, with capacity equal to their count.
    pub fn from_vec(elements: Vec<T>, growth: Growth) -> Result<Self> {
        if elements.len() > MAX_ARRAY_LENGTH {
            return Err(CollectionError::CapacityExceeded {
                requested: elements.len(),
                max: MAX_ARRAY_LENGTH,
            });
        }
        Ok(Self {
            capacity: elements.len(),
            elements,
            growth,
            pending_default: false,
            version: Version::new(),
        })
    }

    /// Logical capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live elements.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    /// Grows so that `required` elements fit.
    fn grow_for(&mut self, required: usize) -> Result<()> {
        if required <= self.capacity {
            return Ok(());
        }
        let next = if self.pending_default {
            if required > MAX_ARRAY_LENGTH {
                return Err(CollectionError::CapacityExceeded {
                    requested: required,
                    max: MAX_ARRAY_LENGTH,
                });
            }
            required.max(DEFAULT_CAPACITY)
        } else {
            self.growth.next_capacity(self.capacity, required)?
        };
        debug!(
            "array growth: capacity {} -> {} (required {})",
            self.capacity, next, required
        );
        self.elements.reserve_exact(next - self.elements.len());
        self.capacity = next;
        self.pending_default = false;
        Ok(())
    }

    fn required(&self, additional: usize) -> Result<usize> {
        self.elements
            .len()
            .checked_add(additional)
            .ok_or(CollectionError::CapacityExceeded {
                requested: usize::MAX,
                max: MAX_ARRAY_LENGTH,
            })
    }

    /// Grows to at least `min` slots.
    ///
    /// A no-op for `min <= DEFAULT_CAPACITY` while the lazy default is still
    /// pending. Capacity changes are not structural.
    pub fn ensure_capacity(&mut self, min: usize) -> Result<()> {
        if min > self.capacity && !(self.pending_default && min <= DEFAULT_CAPACITY) {
            self.grow_for(min)?;
        }
        Ok(())
    }

    /// Shrinks capacity to the current length.
    pub fn trim_to_size(&mut self) {
        if self.capacity > self.elements.len() {
            debug!(
                "array trim: capacity {} -> {}",
                self.capacity,
                self.elements.len()
            );
            self.elements.shrink_to_fit();
            self.capacity = self.elements.len();
        }
        self.pending_default = false;
    }

    /// Appends `value`.
    pub fn push(&mut self, value: T) -> Result<()> {
        let required = self.required(1)?;
        self.grow_for(required)?;
        self.elements.push(value);
        self.version.bump();
        Ok(())
    }

    /// Pads with `fill()` or truncates to `len`. Always structural.
    pub fn resize_with(&mut self, len: usize, fill: impl FnMut() -> T) -> Result<()> {
        if len > self.elements.len() {
            self.grow_for(len)?;
        }
        self.elements.resize_with(len, fill);
        self.version.bump();
        Ok(())
    }

    /// Removes every element. Capacity is retained.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.version.bump();
    }

    /// Sorts `[0, len)` with `compare`; one version bump after sorting.
    pub fn sort_by(&mut self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.elements.sort_by(compare);
        self.version.bump();
    }

    /// Replaces every element in place. Not structural.
    pub fn update_all(&mut self, mut f: impl FnMut(&T) -> T) {
        for slot in self.elements.iter_mut() {
            *slot = f(slot);
        }
    }

    /// First pass of a filtered removal.
    pub(crate) fn mark_where(&self, mut pred: impl FnMut(&T) -> bool) -> Marks {
        let mut marks = Marks::with_len(self.elements.len());
        for (i, value) in self.elements.iter().enumerate() {
            if pred(value) {
                marks.set(i);
            }
        }
        marks
    }

    /// Second pass: compacts survivors left to right in a single sweep.
    pub(crate) fn compact(&mut self, marks: &Marks) -> bool {
        if marks.count == 0 {
            return false;
        }
        let mut i = 0;
        self.elements.retain(|_| {
            let hit = marks.is_set(i);
            i += 1;
            !hit
        });
        self.version.bump();
        true
    }

    /// Two-pass removal of every element matching `pred`.
    pub fn remove_where(&mut self, pred: impl FnMut(&T) -> bool) -> bool {
        let marks = self.mark_where(pred);
        self.compact(&marks)
    }

    /// Keeps the elements for which `keep` returns `Ok(true)`.
    ///
    /// Compacts in one pass. If `keep` fails at position `r`, the elements
    /// rejected before `r` stay removed, everything from `r` on is kept in
    /// order, and the version reflects the removals already made before the
    /// error is returned.
    pub fn retain_checked(&mut self, mut keep: impl FnMut(&T) -> Result<bool>) -> Result<bool> {
        let end = self.elements.len();
        let mut w = 0;
        let mut r = 0;
        let mut failure = None;
        while r < end {
            match keep(&self.elements[r]) {
                Ok(true) => {
                    self.elements.swap(w, r);
                    w += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            r += 1;
        }
        let removed = r - w;
        self.elements.drain(w..r);
        self.version.bump_by(removed);
        match failure {
            Some(e) => Err(e),
            None => Ok(removed > 0),
        }
    }

    /// First position of `value` at or after `from`.
    pub fn index_of_from(&self, value: &T, from: usize) -> Option<usize>
    where
        T: PartialEq,
    {
        self.elements
            .get(from..)?
            .iter()
            .position(|e| e == value)
            .map(|i| i + from)
    }

    /// Last position of `value` at or before `from`.
    pub fn last_index_of_from(&self, value: &T, from: usize) -> Option<usize>
    where
        T: PartialEq,
    {
        let end = from.checked_add(1)?.min(self.elements.len());
        self.elements[..end].iter().rposition(|e| e == value)
    }

    /// Removes the first element equal to `value`.
    pub fn remove_value(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.index_of_from(value, 0) {
            Some(i) => {
                self.elements.remove(i);
                self.version.bump();
                true
            }
            None => false,
        }
    }
}

impl<T: Clone> Clone for ArrayStorage<T> {
    /// Copies the live elements into storage sized to fit them, with a
    /// fresh version.
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            capacity: self.elements.len(),
            growth: self.growth,
            pending_default: false,
            version: Version::new(),
        }
    }
}

impl<T> SequenceStorage for ArrayStorage<T> {
    type Item = T;

    #[inline]
    fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    fn version(&self) -> Version {
        self.version
    }

    #[inline]
    fn get(&self, index: usize) -> Option<&T> {
        self.elements.get(index)
    }

    fn replace(&mut self, index: usize, value: T) -> Result<T> {
        check_index(index, self.elements.len())?;
        Ok(std::mem::replace(&mut self.elements[index], value))
    }

    fn insert(&mut self, index: usize, value: T) -> Result<()> {
        check_position(index, self.elements.len())?;
        let required = self.required(1)?;
        self.grow_for(required)?;
        self.elements.insert(index, value);
        self.version.bump();
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<T> {
        check_index(index, self.elements.len())?;
        let value = self.elements.remove(index);
        self.version.bump();
        Ok(value)
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<()> {
        check_range(from, to, self.elements.len())?;
        self.elements.drain(from..to);
        self.version.bump();
        Ok(())
    }

    fn insert_all(&mut self, index: usize, values: Vec<T>) -> Result<()> {
        check_position(index, self.elements.len())?;
        let required = self.required(values.len())?;
        self.grow_for(required)?;
        self.elements.splice(index..index, values);
        self.version.bump();
        Ok(())
    }

    fn copy_range(&self, from: usize, to: usize) -> Vec<T>
    where
        T: Clone,
    {
        self.elements[from..to].to_vec()
    }
}

// ============================================================================
// GrowableArray
// ============================================================================

/// Single-writer growable array handle.
///
/// Operations take `&self`; the storage lives in a shared cell so that
/// [`share`](Self::share), views, iterators and cursors can reach it.
/// [`try_clone`](Self::try_clone) duplicates the storage; `share` hands
/// out a second handle to the same storage.
///
/// Every accessor borrows the storage fallibly. Called from inside a
/// callback of a mutating operation on the same storage (a sort comparator
/// or an `update_all` function), it fails with `ConcurrentModification`.
#[derive(Debug)]
pub struct GrowableArray<T> {
    inner: LocalCell<ArrayStorage<T>>,
}

/// Cell type behind a [`GrowableArray`].
pub type ArrayCell<T> = LocalCell<ArrayStorage<T>>;

impl<T> GrowableArray<T> {
    /// Creates an empty array. The default capacity is adopted on first
    /// insertion.
    pub fn new() -> Self {
        Self::from_storage(ArrayStorage::new(Growth::HalfAgain))
    }

    /// Creates an empty array with exactly `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self::from_storage(ArrayStorage::with_capacity(
            capacity,
            Growth::HalfAgain,
        )?))
    }

    /// Wraps `elements`; capacity equals their count.
    pub fn from_vec(elements: Vec<T>) -> Result<Self> {
        Ok(Self::from_storage(ArrayStorage::from_vec(
            elements,
            Growth::HalfAgain,
        )?))
    }

    fn from_storage(storage: ArrayStorage<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(storage)),
        }
    }

    /// A second handle onto the same storage.
    pub fn share(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> Result<usize> {
        self.inner.read(|s| s.len())
    }

    /// Returns `true` if the array is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Logical capacity.
    pub fn capacity(&self) -> Result<usize> {
        self.inner.read(|s| s.capacity())
    }

    /// Current structural version.
    pub fn version(&self) -> Result<Version> {
        self.inner.read(|s| s.version())
    }

    /// Grows to at least `min` slots.
    pub fn ensure_capacity(&self, min: usize) -> Result<()> {
        self.inner.write(|s| s.ensure_capacity(min))?
    }

    /// Shrinks capacity to the current length.
    pub fn trim_to_size(&self) -> Result<()> {
        self.inner.write(|s| s.trim_to_size())
    }

    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        crate::positional::Positional::get(&self.inner, index)
    }

    /// Replaces the element at `index`, returning the previous value.
    pub fn set(&self, index: usize, value: T) -> Result<T> {
        self.inner.write(|s| s.replace(index, value))?
    }

    /// Appends `value`.
    pub fn add(&self, value: T) -> Result<()> {
        self.inner.write(|s| s.push(value))?
    }

    /// Inserts `value` at `index`; `index == len` appends.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        self.inner.write(|s| s.insert(index, value))?
    }

    /// Removes and returns the element at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.inner.write(|s| s.remove_at(index))?
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.inner.write(|s| s.remove_value(value))
    }

    /// Removes `[from, to)`.
    pub fn remove_range(&self, from: usize, to: usize) -> Result<()> {
        self.inner.write(|s| s.remove_range(from, to))?
    }

    /// Appends every value. Returns `true` if anything was added.
    pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> Result<bool> {
        let values: Vec<T> = values.into_iter().collect();
        let added = !values.is_empty();
        self.inner.write(|s| {
            let end = s.len();
            s.insert_all(end, values)
        })??;
        Ok(added)
    }

    /// Inserts every value at `index`, in order.
    pub fn insert_all(&self, index: usize, values: impl IntoIterator<Item = T>) -> Result<bool> {
        let values: Vec<T> = values.into_iter().collect();
        let added = !values.is_empty();
        self.inner.write(|s| s.insert_all(index, values))??;
        Ok(added)
    }

    /// Removes every element. Idempotent on an empty array.
    pub fn clear(&self) -> Result<()> {
        self.inner.write(|s| s.clear())
    }

    /// Removes every element matching `pred` in two passes.
    ///
    /// Marking runs under a shared borrow, so `pred` may read the array
    /// through other handles.
    pub fn remove_if(&self, pred: impl FnMut(&T) -> bool) -> Result<bool> {
        let (marks, expected) = self.inner.read(|s| (s.mark_where(pred), s.version()))?;
        self.inner.write(|s| {
            expected.expect_live(s.version())?;
            Ok::<_, CollectionError>(s.compact(&marks))
        })?
    }

    /// Removes every element that is a member of `other`.
    ///
    /// Partial-compaction contract: see [`retain_checked`](Self::retain_checked).
    pub fn remove_all<M>(&self, other: &M) -> Result<bool>
    where
        M: Membership<T> + ?Sized,
    {
        self.retain_checked(|e| other.is_member(e).map(|hit| !hit))
    }

    /// Keeps only the elements that are members of `other`.
    pub fn retain_all<M>(&self, other: &M) -> Result<bool>
    where
        M: Membership<T> + ?Sized,
    {
        self.retain_checked(|e| other.is_member(e))
    }

    /// Keeps the elements for which `keep` returns `Ok(true)`.
    ///
    /// If `keep` fails midway, the elements it already rejected stay
    /// removed and the remaining ones are kept before the error is
    /// returned. Reentrant access to this array from `keep` fails with
    /// `ConcurrentModification`.
    pub fn retain_checked(&self, keep: impl FnMut(&T) -> Result<bool>) -> Result<bool> {
        self.inner.write(|s| s.retain_checked(keep))?
    }

    /// Replaces every element with `f(element)`. Not structural.
    pub fn update_all(&self, f: impl FnMut(&T) -> T) -> Result<()> {
        self.inner.write(|s| s.update_all(f))
    }

    /// Sorts with `compare`.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Result<()> {
        self.inner.write(|s| s.sort_by(compare))
    }

    /// Sorts by natural order.
    pub fn sort(&self) -> Result<()>
    where
        T: Ord,
    {
        self.sort_by(T::cmp)
    }

    /// Returns `true` if an equal element is present.
    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.inner.read(|s| s.as_slice().contains(value))
    }

    /// First position of `value`.
    pub fn index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.inner.read(|s| s.index_of_from(value, 0))
    }

    /// Last position of `value`.
    pub fn last_index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.inner
            .read(|s| s.last_index_of_from(value, usize::MAX - 1))
    }

    /// Calls `f` on each element in order.
    ///
    /// The storage is released while `f` runs. A structural change made from
    /// `f` stops the traversal with `ConcurrentModification`.
    pub fn for_each(&self, mut f: impl FnMut(T)) -> Result<()>
    where
        T: Clone,
    {
        let expected = self.version()?;
        let mut index = 0;
        loop {
            let next = self.inner.read(|s| {
                expected.expect_live(s.version())?;
                Ok::<_, CollectionError>(s.get(index).cloned())
            })??;
            match next {
                Some(value) => f(value),
                None => return Ok(()),
            }
            index += 1;
        }
    }

    /// Fixed-size snapshot of the elements.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.as_slice().to_vec())
    }

    /// Independent copy: elements cloned into storage sized to fit them,
    /// with a fresh version.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
    {
        self.inner.read(|s| Self::from_storage(s.clone()))
    }

    /// Fail-fast list iterator from the front.
    pub fn iter(&self) -> Result<Iter<ArrayCell<T>>> {
        Iter::new(self.inner.clone(), 0)
    }

    /// Fail-fast list iterator positioned before `index`.
    pub fn list_iter(&self, index: usize) -> Result<Iter<ArrayCell<T>>> {
        Iter::new(self.inner.clone(), index)
    }

    /// Late-binding partitionable cursor over the whole array.
    pub fn cursor(&self) -> IndexCursor<ArrayCell<T>> {
        IndexCursor::new(self.inner.clone())
    }

    /// Live view over `[from, to)`.
    pub fn sub_range(&self, from: usize, to: usize) -> Result<SubRange<ArrayCell<T>>> {
        SubRange::new(&self.inner, from, to)
    }

    pub(crate) fn cell(&self) -> &ArrayCell<T> {
        &self.inner
    }
}

impl<T> Default for GrowableArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects at most `limit` values, dropping the rest unconsumed.
pub(crate) fn collect_capped<T>(iter: impl IntoIterator<Item = T>, limit: usize) -> Vec<T> {
    iter.into_iter().take(limit).collect()
}

/// Stops silently at [`MAX_ARRAY_LENGTH`] elements, like
/// [`SyncArray`](crate::SyncArray)'s `FromIterator`.
impl<T> FromIterator<T> for GrowableArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let elements = collect_capped(iter, MAX_ARRAY_LENGTH);
        let capacity = elements.len();
        Self::from_storage(ArrayStorage {
            elements,
            capacity,
            growth: Growth::HalfAgain,
            pending_default: false,
            version: Version::new(),
        })
    }
}

impl<T: Clone + PartialEq> Collection<T> for GrowableArray<T> {
    fn len(&self) -> Result<usize> {
        GrowableArray::len(self)
    }

    fn contains(&self, value: &T) -> Result<bool> {
        GrowableArray::contains(self, value)
    }

    fn add(&self, value: T) -> Result<bool> {
        GrowableArray::add(self, value).map(|()| true)
    }

    fn remove(&self, value: &T) -> Result<bool> {
        GrowableArray::remove(self, value)
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        GrowableArray::to_vec(self)
    }
}

impl<T: Clone + PartialEq> Sequence<T> for GrowableArray<T> {
    fn get(&self, index: usize) -> Result<T> {
        GrowableArray::get(self, index)
    }

    fn set(&self, index: usize, value: T) -> Result<T> {
        GrowableArray::set(self, index, value)
    }

    fn insert(&self, index: usize, value: T) -> Result<()> {
        GrowableArray::insert(self, index, value)
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        GrowableArray::remove_at(self, index)
    }

    fn index_of(&self, value: &T) -> Result<Option<usize>> {
        GrowableArray::index_of(self, value)
    }

    fn last_index_of(&self, value: &T) -> Result<Option<usize>> {
        GrowableArray::last_index_of(self, value)
    }
}

impl<T: PartialEq> Membership<T> for GrowableArray<T> {
    fn is_member(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.as_slice().contains(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_default_capacity() {
        let array = GrowableArray::new();
        assert_eq!(array.capacity().unwrap(), 0);
        array.add(1).unwrap();
        assert_eq!(array.capacity().unwrap(), DEFAULT_CAPACITY);
    }

    #[test]
    fn ensure_capacity_below_default_is_noop_while_pending() {
        let array: GrowableArray<u32> = GrowableArray::new();
        array.ensure_capacity(5).unwrap();
        assert_eq!(array.capacity().unwrap(), 0);
        array.ensure_capacity(11).unwrap();
        assert_eq!(array.capacity().unwrap(), 11);
    }

    #[test]
    fn growth_is_half_again() {
        let array = GrowableArray::with_capacity(10).unwrap();
        for i in 0..11 {
            array.add(i).unwrap();
        }
        assert_eq!(array.capacity().unwrap(), 15);
        for i in 11..16 {
            array.add(i).unwrap();
        }
        assert_eq!(array.capacity().unwrap(), 22);
    }

    #[test]
    fn zero_capacity_grows_to_required() {
        let array = GrowableArray::with_capacity(0).unwrap();
        array.add(1).unwrap();
        assert_eq!(array.capacity().unwrap(), 1);
        array.add(2).unwrap();
        assert_eq!(array.capacity().unwrap(), 2);
        array.add(3).unwrap();
        assert_eq!(array.capacity().unwrap(), 3);
    }

    #[test]
    fn next_capacity_policies() {
        assert_eq!(Growth::HalfAgain.next_capacity(10, 11).unwrap(), 15);
        assert_eq!(Growth::HalfAgain.next_capacity(10, 40).unwrap(), 40);
        assert_eq!(Growth::Double.next_capacity(10, 11).unwrap(), 20);
        assert_eq!(Growth::Increment(3).next_capacity(10, 11).unwrap(), 13);
        assert_eq!(Growth::Increment(0).next_capacity(10, 11).unwrap(), 20);
        assert_eq!(
            Growth::HalfAgain
                .next_capacity(MAX_ARRAY_LENGTH - 1, MAX_ARRAY_LENGTH)
                .unwrap(),
            MAX_ARRAY_LENGTH
        );
        assert!(matches!(
            Growth::HalfAgain.next_capacity(10, MAX_ARRAY_LENGTH + 1),
            Err(CollectionError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn with_capacity_above_max_fails() {
        assert!(matches!(
            GrowableArray::<u8>::with_capacity(MAX_ARRAY_LENGTH + 1),
            Err(CollectionError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn trim_to_size() {
        let array = GrowableArray::new();
        array.add_all([1, 2, 3]).unwrap();
        assert_eq!(array.capacity().unwrap(), 10);
        let version = array.version().unwrap();
        array.trim_to_size().unwrap();
        assert_eq!(array.capacity().unwrap(), 3);
        assert_eq!(array.version().unwrap(), version);
    }

    #[test]
    fn scenario_add_insert_remove() {
        let array = GrowableArray::new();
        array.add(5).unwrap();
        array.add(10).unwrap();
        array.insert(1, 7).unwrap();
        array.remove_at(0).unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![7, 10]);
    }

    #[test]
    fn bounds() {
        let array: GrowableArray<i32> = [1, 2, 3].into_iter().collect();
        assert!(matches!(
            array.get(3),
            Err(CollectionError::OutOfBounds { index: 3, len: 3 })
        ));
        assert!(array.get(usize::MAX).is_err());
        assert!(array.insert(4, 9).is_err());
        array.insert(3, 4).unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3, 4]);
        assert!(array.remove_at(4).is_err());
        assert!(array.set(4, 0).is_err());
    }

    #[test]
    fn set_is_not_structural() {
        let array: GrowableArray<i32> = [1, 2, 3].into_iter().collect();
        let version = array.version().unwrap();
        assert_eq!(array.set(1, 20).unwrap(), 2);
        assert_eq!(array.version().unwrap(), version);
        array.update_all(|v| v * 10).unwrap();
        assert_eq!(array.version().unwrap(), version);
        assert_eq!(array.to_vec().unwrap(), vec![10, 200, 30]);
    }

    #[test]
    fn remove_if_two_pass() {
        let array: GrowableArray<i32> = (0..200).collect();
        let version = array.version().unwrap();
        assert!(array.remove_if(|v| v % 3 == 0).unwrap());
        assert_eq!(array.len().unwrap(), 133);
        assert!(array.to_vec().unwrap().iter().all(|v| v % 3 != 0));
        assert_ne!(array.version().unwrap(), version);

        let version = array.version().unwrap();
        assert!(!array.remove_if(|v| *v > 1000).unwrap());
        assert_eq!(array.version().unwrap(), version);
    }

    #[test]
    fn remove_if_predicate_may_read_other_handle() {
        let array: GrowableArray<i32> = (0..10).collect();
        let other = array.share();
        assert!(array.remove_if(|v| *v >= other.len().unwrap() as i32 / 2).unwrap());
        assert_eq!(array.to_vec().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn remove_all_and_retain_all() {
        let array: GrowableArray<i32> = (1..=6).collect();
        assert!(array.remove_all(&[2, 4][..]).unwrap());
        assert_eq!(array.to_vec().unwrap(), vec![1, 3, 5, 6]);
        assert!(array.retain_all(&vec![1, 6, 9]).unwrap());
        assert_eq!(array.to_vec().unwrap(), vec![1, 6]);
        assert!(!array.retain_all(&vec![1, 6]).unwrap());
    }

    #[test]
    fn retain_checked_partial_compaction() {
        let array: GrowableArray<i32> = (1..=8).collect();
        let version = array.version().unwrap();
        let err = array
            .retain_checked(|v| {
                if *v == 5 {
                    Err(CollectionError::IllegalState("boom"))
                } else {
                    Ok(v % 2 == 1)
                }
            })
            .unwrap_err();
        assert!(matches!(err, CollectionError::IllegalState("boom")));
        // 2 and 4 were rejected before the failure; 5.. are kept in order.
        assert_eq!(array.to_vec().unwrap(), vec![1, 3, 5, 6, 7, 8]);
        assert_eq!(array.version().unwrap().get(), version.get() + 2);
    }

    #[test]
    fn self_remove_all_is_concurrent_modification() {
        let array: GrowableArray<i32> = (1..=4).collect();
        let err = array.remove_all(&array).unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn reads_from_retain_predicate_report_concurrent_modification() {
        let array: GrowableArray<i32> = (0..4).collect();
        let other = array.share();
        let err = array
            .retain_checked(|v| Ok(other.contains(v)? && *v > 1))
            .unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(array.to_vec().unwrap(), vec![0, 1, 2, 3]);

        // Same answer as the bulk form
        let err = array.remove_all(&other).unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[test]
    fn reads_from_sort_comparator_fail_without_panicking() {
        let array: GrowableArray<i32> = [3, 1, 2].into_iter().collect();
        let other = array.share();
        let mut failures = 0;
        array
            .sort_by(|a, b| {
                if other.len().is_err() && other.to_vec().is_err() {
                    failures += 1;
                }
                a.cmp(b)
            })
            .unwrap();
        assert!(failures > 0);
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn from_iter_stops_at_the_ceiling() {
        assert_eq!(collect_capped(0..10, 4), vec![0, 1, 2, 3]);
        assert_eq!(collect_capped(0..3, 4), vec![0, 1, 2]);
    }

    #[test]
    #[ignore = "walks MAX_ARRAY_LENGTH elements"]
    fn from_iter_of_unit_values_clamps_length() {
        let array: GrowableArray<()> = std::iter::repeat(()).take(MAX_ARRAY_LENGTH + 3).collect();
        assert_eq!(array.len().unwrap(), MAX_ARRAY_LENGTH);
        assert!(matches!(
            array.add(()),
            Err(CollectionError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn sort_bumps_once() {
        let array: GrowableArray<i32> = [3, 1, 2].into_iter().collect();
        let version = array.version().unwrap();
        array.sort().unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3]);
        assert_eq!(array.version().unwrap().get(), version.get() + 1);
        array.sort_by(|a, b| b.cmp(a)).unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn index_of_and_last_index_of() {
        let array: GrowableArray<i32> = [1, 2, 1, 3].into_iter().collect();
        assert_eq!(array.index_of(&1).unwrap(), Some(0));
        assert_eq!(array.last_index_of(&1).unwrap(), Some(2));
        assert_eq!(array.index_of(&9).unwrap(), None);
        assert!(array.remove(&1).unwrap());
        assert_eq!(array.to_vec().unwrap(), vec![2, 1, 3]);
    }

    #[test]
    fn clone_is_deep_and_share_is_not() {
        let array: GrowableArray<i32> = [1, 2].into_iter().collect();
        let copy = array.try_clone().unwrap();
        let alias = array.share();
        array.add(3).unwrap();
        assert_eq!(copy.to_vec().unwrap(), vec![1, 2]);
        assert_eq!(alias.to_vec().unwrap(), vec![1, 2, 3]);
        assert_eq!(copy.capacity().unwrap(), 2);
    }

    #[test]
    fn for_each_stops_on_mutation() {
        let array: GrowableArray<i32> = (0..5).collect();
        let other = array.share();
        let mut seen = Vec::new();
        let err = array
            .for_each(|v| {
                seen.push(v);
                if v == 1 {
                    other.add(99).unwrap();
                }
            })
            .unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn clear_twice() {
        let array: GrowableArray<i32> = (0..5).collect();
        array.clear().unwrap();
        assert!(array.is_empty().unwrap());
        array.clear().unwrap();
        assert_eq!(array.len().unwrap(), 0);
    }

    #[test]
    fn insert_all_in_middle() {
        let array: GrowableArray<i32> = [1, 5].into_iter().collect();
        assert!(array.insert_all(1, [2, 3, 4]).unwrap());
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(!array.insert_all(0, Vec::new()).unwrap());
        assert!(array.insert_all(9, [0]).is_err());
    }

    #[test]
    fn remove_range() {
        let array: GrowableArray<i32> = (0..10).collect();
        array.remove_range(2, 8).unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![0, 1, 8, 9]);
        assert!(matches!(
            array.remove_range(3, 1),
            Err(CollectionError::IllegalArgument(_))
        ));
    }
}
