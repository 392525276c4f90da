//! Legacy synchronized array and the stack built on it.
//!
//! [`SyncArray`] is the growable array behind an `Arc<ReentrantMutex<_>>`.
//! Every public method takes the lock for that one call only, so a
//! sequence of calls is not atomic. Use [`SyncArray::atomically`] to hold
//! the lock across several calls; the mutex is reentrant, so the calls made
//! inside simply lock again.
//!
//! Iterators, cursors and sub-ranges are the generic ones, running over the
//! synchronized cell. Each of their steps locks separately, and they fail
//! fast when another thread changes the structure in between.
//!
//! # Example
//!
//! ```
//! use nexus_sequence::SyncArray;
//! use std::thread;
//!
//! let array = SyncArray::new();
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let array = array.share();
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 array.add(t * 100 + i).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(array.len().unwrap(), 400);
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::array::{ArrayStorage, Growth};
use crate::collection::{Collection, Membership, Sequence};
use crate::cursor::IndexCursor;
use crate::iter::Iter;
use crate::storage::{SequenceStorage, Shared, SyncCell};
use crate::view::SubRange;
use crate::{CollectionError, Result, Version};

/// Cell type behind a [`SyncArray`].
pub type SyncArrayCell<T> = SyncCell<ArrayStorage<T>>;

/// Growable array locked per call.
///
/// Grows by doubling, or by a fixed increment when built with
/// [`with_capacity_and_increment`](Self::with_capacity_and_increment).
#[derive(Debug)]
pub struct SyncArray<T> {
    inner: SyncArrayCell<T>,
}

impl<T> SyncArray<T> {
    /// Empty array with ten slots reserved.
    pub fn new() -> Self {
        Self::from_storage(ArrayStorage::eager(Growth::Double))
    }

    /// Empty array with exactly `capacity` slots; grows by doubling.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        ArrayStorage::with_capacity(capacity, Growth::Double).map(Self::from_storage)
    }

    /// Empty array that grows by `increment` slots at a time (`0` doubles).
    pub fn with_capacity_and_increment(capacity: usize, increment: usize) -> Result<Self> {
        ArrayStorage::with_capacity(capacity, Growth::Increment(increment)).map(Self::from_storage)
    }

    /// Wraps `elements`; capacity equals their count.
    pub fn from_vec(elements: Vec<T>) -> Result<Self> {
        ArrayStorage::from_vec(elements, Growth::Double).map(Self::from_storage)
    }

    pub(crate) fn from_storage(storage: ArrayStorage<T>) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(storage))),
        }
    }

    pub(crate) fn cell(&self) -> &SyncArrayCell<T> {
        &self.inner
    }

    /// A second handle onto the same storage.
    pub fn share(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    /// Runs `f` while holding the lock, making the calls it makes on this
    /// array atomic with respect to other threads.
    pub fn atomically<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.inner.lock();
        f(self)
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

    /// Pads with `T::default()` or truncates to `len`. Structural.
    pub fn set_len(&self, len: usize) -> Result<()>
    where
        T: Default,
    {
        self.inner.write(|s| s.resize_with(len, T::default))?
    }

    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        crate::positional::Positional::get(&self.inner, index)
    }

    /// Clone of the first element.
    pub fn first_element(&self) -> Result<T>
    where
        T: Clone,
    {
        self.inner
            .read(|s| s.as_slice().first().cloned())?
            .ok_or(CollectionError::Empty)
    }

    /// Clone of the last element.
    pub fn last_element(&self) -> Result<T>
    where
        T: Clone,
    {
        self.inner
            .read(|s| s.as_slice().last().cloned())?
            .ok_or(CollectionError::Empty)
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

    /// Appends every value.
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

    /// Removes every element.
    pub fn clear(&self) -> Result<()> {
        self.inner.write(|s| s.clear())
    }

    /// Removes every element matching `pred`, both passes under one lock.
    pub fn remove_if(&self, pred: impl FnMut(&T) -> bool) -> Result<bool> {
        let _guard = self.inner.lock();
        let (marks, expected) = self.inner.read(|s| (s.mark_where(pred), s.version()))?;
        self.inner.write(|s| {
            expected.expect_live(s.version())?;
            Ok::<_, CollectionError>(s.compact(&marks))
        })?
    }

    /// Removes every element that is a member of `other`.
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

    /// Keeps the elements for which `keep` returns `Ok(true)`; see
    /// [`GrowableArray::retain_checked`](crate::GrowableArray::retain_checked).
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
        Ok(self.index_of(value)?.is_some())
    }

    /// First position of `value`.
    pub fn index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.index_of_from(value, 0)
    }

    /// First position of `value` at or after `from`.
    pub fn index_of_from(&self, value: &T, from: usize) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.inner.read(|s| s.index_of_from(value, from))
    }

    /// Last position of `value`.
    pub fn last_index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.last_index_of_from(value, usize::MAX - 1)
    }

    /// Last position of `value` at or before `from`.
    pub fn last_index_of_from(&self, value: &T, from: usize) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.inner.read(|s| s.last_index_of_from(value, from))
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.as_slice().to_vec())
    }

    /// Independent copy, sized to fit and unlocked from this one.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
    {
        self.inner.read(|s| Self::from_storage(s.clone()))
    }

    /// Fail-fast list iterator from the front.
    pub fn iter(&self) -> Result<Iter<SyncArrayCell<T>>> {
        Iter::new(self.inner.clone(), 0)
    }

    /// Fail-fast list iterator positioned before `index`.
    pub fn list_iter(&self, index: usize) -> Result<Iter<SyncArrayCell<T>>> {
        Iter::new(self.inner.clone(), index)
    }

    /// Late-binding partitionable cursor.
    pub fn cursor(&self) -> IndexCursor<SyncArrayCell<T>> {
        IndexCursor::new(self.inner.clone())
    }

    /// Live view over `[from, to)`.
    pub fn sub_range(&self, from: usize, to: usize) -> Result<SubRange<SyncArrayCell<T>>> {
        SubRange::new(&self.inner, from, to)
    }
}

impl<T> Default for SyncArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for SyncArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut storage = ArrayStorage::eager(Growth::Double);
        for value in iter {
            // Only fails past MAX_ARRAY_LENGTH elements.
            if storage.push(value).is_err() {
                break;
            }
        }
        Self::from_storage(storage)
    }
}

impl<T: Clone + PartialEq> Collection<T> for SyncArray<T> {
    fn len(&self) -> Result<usize> {
        SyncArray::len(self)
    }

    fn contains(&self, value: &T) -> Result<bool> {
        SyncArray::contains(self, value)
    }

    fn add(&self, value: T) -> Result<bool> {
        SyncArray::add(self, value).map(|()| true)
    }

    fn remove(&self, value: &T) -> Result<bool> {
        SyncArray::remove(self, value)
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        SyncArray::to_vec(self)
    }
}

impl<T: Clone + PartialEq> Sequence<T> for SyncArray<T> {
    fn get(&self, index: usize) -> Result<T> {
        SyncArray::get(self, index)
    }

    fn set(&self, index: usize, value: T) -> Result<T> {
        SyncArray::set(self, index, value)
    }

    fn insert(&self, index: usize, value: T) -> Result<()> {
        SyncArray::insert(self, index, value)
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        SyncArray::remove_at(self, index)
    }

    fn index_of(&self, value: &T) -> Result<Option<usize>> {
        SyncArray::index_of(self, value)
    }

    fn last_index_of(&self, value: &T) -> Result<Option<usize>> {
        SyncArray::last_index_of(self, value)
    }
}

impl<T: PartialEq> Membership<T> for SyncArray<T> {
    fn is_member(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.as_slice().contains(value))
    }
}

// ============================================================================
// Stack
// ============================================================================

/// LIFO stack over a [`SyncArray`]; the top is the last element.
#[derive(Debug, Default)]
pub struct Stack<T> {
    array: SyncArray<T>,
}

impl<T> Stack<T> {
    /// Empty stack.
    pub fn new() -> Self {
        Self {
            array: SyncArray::new(),
        }
    }

    /// A second handle onto the same stack.
    pub fn share(&self) -> Self {
        Self {
            array: self.array.share(),
        }
    }

    /// Pushes `value` on top.
    pub fn push(&self, value: T) -> Result<()> {
        self.array.add(value)
    }

    /// Removes and returns the top.
    pub fn pop(&self) -> Result<T> {
        self.array.atomically(|a| match a.len()? {
            0 => Err(CollectionError::Empty),
            len => a.remove_at(len - 1),
        })
    }

    /// Clone of the top.
    pub fn peek(&self) -> Result<T>
    where
        T: Clone,
    {
        self.array.last_element()
    }

    /// Returns `true` if the stack is empty.
    pub fn is_empty(&self) -> Result<bool> {
        self.array.is_empty()
    }

    /// Number of elements.
    pub fn len(&self) -> Result<usize> {
        self.array.len()
    }

    /// 1-based distance of `value` from the top; `None` if absent.
    pub fn search(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.array.atomically(|a| match a.last_index_of(value)? {
            Some(i) => Ok(Some(a.len()? - i)),
            None => Ok(None),
        })
    }

    /// The backing array.
    pub fn as_array(&self) -> &SyncArray<T> {
        &self.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Partition;
    use std::thread;

    #[test]
    fn eager_capacity_and_doubling() {
        let array = SyncArray::new();
        assert_eq!(array.capacity().unwrap(), 10);
        for i in 0..11 {
            array.add(i).unwrap();
        }
        assert_eq!(array.capacity().unwrap(), 20);
    }

    #[test]
    fn fixed_increment_growth() {
        let array = SyncArray::with_capacity_and_increment(4, 3).unwrap();
        for i in 0..5 {
            array.add(i).unwrap();
        }
        assert_eq!(array.capacity().unwrap(), 7);
    }

    #[test]
    fn legacy_surface() {
        let array: SyncArray<u32> = [1, 2, 3, 2].into_iter().collect();
        assert_eq!(array.first_element().unwrap(), 1);
        assert_eq!(array.last_element().unwrap(), 2);
        assert_eq!(array.index_of_from(&2, 2).unwrap(), Some(3));
        assert_eq!(array.last_index_of(&2).unwrap(), Some(3));
        assert_eq!(array.last_index_of_from(&2, 2).unwrap(), Some(1));
        array.set_len(6).unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3, 2, 0, 0]);
        array.set_len(2).unwrap();
        assert_eq!(array.to_vec().unwrap(), vec![1, 2]);
        array.clear().unwrap();
        assert!(matches!(array.first_element(), Err(CollectionError::Empty)));
        assert!(matches!(array.last_element(), Err(CollectionError::Empty)));
    }

    #[test]
    fn set_len_is_structural() {
        let array: SyncArray<u32> = SyncArray::new();
        let v = array.version().unwrap();
        array.set_len(3).unwrap();
        assert_ne!(array.version().unwrap(), v);
    }

    #[test]
    fn concurrent_appends() {
        let array = SyncArray::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let array = array.share();
                thread::spawn(move || {
                    for i in 0..1000 {
                        array.add(t * 1000 + i).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut values = array.to_vec().unwrap();
        values.sort();
        assert_eq!(values, (0..4000).collect::<Vec<_>>());
    }

    #[test]
    fn atomically_is_reentrant() {
        let array: SyncArray<u32> = (0..3).collect();
        let total = array.atomically(|a| {
            a.add(3).unwrap();
            a.len().unwrap()
        });
        assert_eq!(total, 4);
    }

    #[test]
    fn generic_iterator_and_cursor() {
        let array: SyncArray<u32> = (0..10).collect();
        let mut it = array.iter().unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 0);
        it.remove().unwrap();
        assert_eq!(array.len().unwrap(), 9);

        let mut right = array.cursor();
        let mut left = right.try_split().unwrap().unwrap();
        let mut seen = Vec::new();
        left.for_each_remaining(|v| seen.push(v)).unwrap();
        right.for_each_remaining(|v| seen.push(v)).unwrap();
        assert_eq!(seen, (1..10).collect::<Vec<_>>());

        let view = array.sub_range(2, 4).unwrap();
        assert_eq!(view.to_vec().unwrap(), vec![3, 4]);
    }

    #[test]
    fn stack_lifo() {
        let stack = Stack::new();
        assert!(stack.is_empty().unwrap());
        stack.push("a").unwrap();
        stack.push("b").unwrap();
        stack.push("c").unwrap();
        assert_eq!(stack.peek().unwrap(), "c");
        assert_eq!(stack.search(&"c").unwrap(), Some(1));
        assert_eq!(stack.search(&"a").unwrap(), Some(3));
        assert_eq!(stack.search(&"z").unwrap(), None);
        assert_eq!(stack.pop().unwrap(), "c");
        assert_eq!(stack.len().unwrap(), 2);
        assert_eq!(stack.as_array().to_vec().unwrap(), vec!["a", "b"]);
        stack.pop().unwrap();
        stack.pop().unwrap();
        assert!(matches!(stack.pop(), Err(CollectionError::Empty)));
        assert!(matches!(stack.peek(), Err(CollectionError::Empty)));
    }

    #[test]
    fn reads_from_retain_predicate_report_concurrent_modification() {
        let array: SyncArray<u32> = (0..4).collect();
        let other = array.share();
        let err = array
            .retain_checked(|v| Ok(other.contains(v)? && *v > 1))
            .unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(array.to_vec().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncArray<u32>>();
        assert_send_sync::<Stack<String>>();
    }
}
