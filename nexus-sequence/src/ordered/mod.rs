//! Comparator-ordered set and its live range views.
//!
//! [`OrderedSet`] keeps its elements in the total order of a
//! [`Comparator`], backed by a [`SkipMap`]. Two elements the comparator
//! calls equal are the same element.
//!
//! [`OrderedRange`] is a live window onto a bounded key range of a set:
//! it reads and writes through the set, so changes made either way are
//! visible in both. Adding a key outside the window's bounds is an
//! `IllegalArgument` error.
//!
//! # Example
//!
//! ```
//! use nexus_sequence::OrderedSet;
//!
//! let set: OrderedSet<u32> = [30, 10, 20].into_iter().collect();
//! assert_eq!(set.to_vec().unwrap(), vec![10, 20, 30]);
//! assert_eq!(set.ceiling(&15).unwrap(), Some(20));
//!
//! let low = set.head_set(20, false);
//! assert_eq!(low.to_vec().unwrap(), vec![10]);
//! set.add(5).unwrap();
//! assert_eq!(low.to_vec().unwrap(), vec![5, 10]);
//! ```

pub mod comparator;
pub mod skiplist;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::rc::{Rc, Weak};

use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::collection::{Collection, Membership};
use crate::cursor::SnapshotCursor;
use crate::set::{SetIter, SetStorage};
use crate::storage::{LocalCell, Shared};
use crate::{CollectionError, Result, Version};

use comparator::{Comparator, Natural};
use skiplist::SkipMap;

// ============================================================================
// OrderedStorage
// ============================================================================

/// Skip-list-backed set storage.
#[derive(Debug)]
pub struct OrderedStorage<T, C> {
    map: SkipMap<T, (), C>,
    version: Version,
}

impl<T, C: Comparator<T>> OrderedStorage<T, C> {
    /// Empty storage ordered by `comparator`.
    pub fn new(comparator: C, level_ratio: u32) -> Self {
        Self {
            map: SkipMap::with_level_ratio(comparator, SmallRng::from_entropy(), level_ratio),
            version: Version::new(),
        }
    }

    /// The ordering in use.
    pub fn comparator(&self) -> &C {
        self.map.comparator()
    }

    /// Elements in ascending order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.map.iter().map(|(k, _)| k)
    }

    fn pop_first(&mut self) -> Option<T> {
        let (value, ()) = self.map.pop_first()?;
        self.version.bump();
        Some(value)
    }

    fn pop_last(&mut self) -> Option<T> {
        let (value, ()) = self.map.pop_last()?;
        self.version.bump();
        Some(value)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.version.bump();
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> bool {
        let removed = self.map.remove_where(|k, _| pred(k));
        self.version.bump_by(removed);
        removed > 0
    }

    fn retain_checked(&mut self, mut keep: impl FnMut(&T) -> Result<bool>) -> Result<bool> {
        let mut failure = None;
        let removed = self.map.remove_where(|k, _| {
            if failure.is_some() {
                return false;
            }
            match keep(k) {
                Ok(keep) => !keep,
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        });
        self.version.bump_by(removed);
        match failure {
            Some(e) => Err(e),
            None => Ok(removed > 0),
        }
    }
}

impl<T: Clone, C: Comparator<T> + Clone> Clone for OrderedStorage<T, C> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
            version: Version::new(),
        }
    }
}

impl<T, C: Comparator<T>> SetStorage for OrderedStorage<T, C> {
    type Item = T;

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    fn version(&self) -> Version {
        self.version
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.values().cloned().collect()
    }

    #[inline]
    fn contains(&self, value: &T) -> bool {
        self.map.contains_key(value)
    }

    fn insert(&mut self, value: T) -> bool {
        if self.map.insert(value, ()).is_some() {
            return false;
        }
        self.version.bump();
        true
    }

    fn remove(&mut self, value: &T) -> bool {
        if self.map.remove(value).is_some() {
            self.version.bump();
            true
        } else {
            false
        }
    }
}

// ============================================================================
// OrderedSet
// ============================================================================

/// Single-writer ordered set handle.
pub struct OrderedSet<T, C = Natural> {
    inner: LocalCell<OrderedStorage<T, C>>,
}

impl<T: fmt::Debug, C: Comparator<T>> fmt::Debug for OrderedSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(s) => f.debug_set().entries(s.values()).finish(),
            Err(_) => f.write_str("OrderedSet { <borrowed> }"),
        }
    }
}

impl<T, C: Comparator<T> + Default> OrderedSet<T, C> {
    /// Empty set ordered by `C::default()`.
    pub fn new() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T, C: Comparator<T>> OrderedSet<T, C> {
    /// Empty set ordered by `comparator`.
    pub fn with_comparator(comparator: C) -> Self {
        Self::with_level_ratio(comparator, 2)
    }

    /// Empty set with a custom skip-list level ratio.
    pub fn with_level_ratio(comparator: C, level_ratio: u32) -> Self {
        Self::from_storage(OrderedStorage::new(comparator, level_ratio))
    }

    pub(crate) fn from_storage(storage: OrderedStorage<T, C>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(storage)),
        }
    }

    pub(crate) fn cell(&self) -> &LocalCell<OrderedStorage<T, C>> {
        &self.inner
    }

    /// A second handle onto the same set.
    pub fn share(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> Result<usize> {
        self.inner.read(|s| s.len())
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current structural version.
    pub fn version(&self) -> Result<Version> {
        self.inner.read(|s| s.version())
    }

    /// Copy of the comparator.
    pub fn comparator(&self) -> Result<C>
    where
        C: Clone,
    {
        self.inner.read(|s| s.comparator().clone())
    }

    /// Returns `true` if `value` is a member.
    pub fn contains(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.contains(value))
    }

    /// Adds `value`; `false` if an equal element is present.
    pub fn add(&self, value: T) -> Result<bool> {
        self.inner.write(|s| s.insert(value))
    }

    /// Removes `value`; `false` if absent.
    pub fn remove(&self, value: &T) -> Result<bool> {
        self.inner.write(|s| s.remove(value))
    }

    /// Removes every element.
    pub fn clear(&self) -> Result<()> {
        self.inner.write(|s| s.clear())
    }

    /// Adds every value; `true` if the set changed.
    pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> Result<bool> {
        self.inner.write(|s| {
            values
                .into_iter()
                .fold(false, |changed, value| s.insert(value) | changed)
        })
    }

    /// Removes every element matching `pred`.
    pub fn remove_if(&self, pred: impl FnMut(&T) -> bool) -> Result<bool> {
        self.inner.write(|s| s.remove_where(pred))
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

    /// Keeps the elements for which `keep` returns `Ok(true)`; removals
    /// made before a failure stay in place.
    pub fn retain_checked(&self, keep: impl FnMut(&T) -> Result<bool>) -> Result<bool> {
        self.inner.write(|s| s.retain_checked(keep))?
    }

    /// Smallest element.
    pub fn first(&self) -> Result<T>
    where
        T: Clone,
    {
        self.inner
            .read(|s| s.map.first().map(|(k, _)| k.clone()))?
            .ok_or(CollectionError::Empty)
    }

    /// Largest element.
    pub fn last(&self) -> Result<T>
    where
        T: Clone,
    {
        self.inner
            .read(|s| s.map.last().map(|(k, _)| k.clone()))?
            .ok_or(CollectionError::Empty)
    }

    /// Removes the smallest element; `None` when empty.
    pub fn poll_first(&self) -> Result<Option<T>> {
        self.inner.write(|s| s.pop_first())
    }

    /// Removes the largest element; `None` when empty.
    pub fn poll_last(&self) -> Result<Option<T>> {
        self.inner.write(|s| s.pop_last())
    }

    /// Greatest element strictly below `value`.
    pub fn lower(&self, value: &T) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.map.lower(value).map(|(k, _)| k.clone()))
    }

    /// Greatest element at or below `value`.
    pub fn floor(&self, value: &T) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.map.floor(value).map(|(k, _)| k.clone()))
    }

    /// Least element at or above `value`.
    pub fn ceiling(&self, value: &T) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.map.ceiling(value).map(|(k, _)| k.clone()))
    }

    /// Least element strictly above `value`.
    pub fn higher(&self, value: &T) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.map.higher(value).map(|(k, _)| k.clone()))
    }

    /// Snapshot in ascending order.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.snapshot())
    }

    /// Independent copy under a clone of the comparator.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
        C: Clone,
    {
        self.inner.read(|s| Self::from_storage(s.clone()))
    }

    /// Fail-fast ascending iterator with `remove`.
    pub fn iter(&self) -> Result<SetIter<OrderedStorage<T, C>>>
    where
        T: Clone,
    {
        SetIter::new(self.inner.clone())
    }

    /// Fail-fast descending iterator with `remove`.
    pub fn descending_iter(&self) -> Result<SetIter<OrderedStorage<T, C>>>
    where
        T: Clone,
    {
        SetIter::descending(self.inner.clone())
    }

    /// Late-binding splittable cursor, ascending.
    pub fn cursor(&self) -> SnapshotCursor<OrderedStorage<T, C>> {
        SnapshotCursor::new(self.inner.clone())
    }

    /// Live view of the elements between `from` and `to`.
    ///
    /// Fails with `IllegalArgument` when `from` orders after `to`.
    pub fn sub_set(
        &self,
        from: T,
        from_inclusive: bool,
        to: T,
        to_inclusive: bool,
    ) -> Result<OrderedRange<T, C>> {
        let inverted =
            self.inner.read(|s| s.comparator().compare(&from, &to) == Ordering::Greater)?;
        if inverted {
            return Err(CollectionError::IllegalArgument(
                "sub_set: from orders after to".into(),
            ));
        }
        Ok(self.range(bound(from, from_inclusive), bound(to, to_inclusive)))
    }

    /// Live view of the elements below `to`.
    pub fn head_set(&self, to: T, inclusive: bool) -> OrderedRange<T, C> {
        self.range(Bound::Unbounded, bound(to, inclusive))
    }

    /// Live view of the elements at or above `from`.
    pub fn tail_set(&self, from: T, inclusive: bool) -> OrderedRange<T, C> {
        self.range(bound(from, inclusive), Bound::Unbounded)
    }

    fn range(&self, lo: Bound<T>, hi: Bound<T>) -> OrderedRange<T, C> {
        OrderedRange {
            root: Rc::downgrade(&self.inner),
            lo,
            hi,
        }
    }
}

fn bound<T>(value: T, inclusive: bool) -> Bound<T> {
    if inclusive {
        Bound::Included(value)
    } else {
        Bound::Excluded(value)
    }
}

impl<T, C: Comparator<T> + Default> Default for OrderedSet<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Comparator<T> + Default> FromIterator<T> for OrderedSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut storage = OrderedStorage::new(C::default(), 2);
        for value in iter {
            storage.insert(value);
        }
        storage.version = Version::new();
        Self::from_storage(storage)
    }
}

impl<T: Clone, C: Comparator<T>> Collection<T> for OrderedSet<T, C> {
    fn len(&self) -> Result<usize> {
        OrderedSet::len(self)
    }

    fn contains(&self, value: &T) -> Result<bool> {
        OrderedSet::contains(self, value)
    }

    fn add(&self, value: T) -> Result<bool> {
        OrderedSet::add(self, value)
    }

    fn remove(&self, value: &T) -> Result<bool> {
        OrderedSet::remove(self, value)
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        OrderedSet::to_vec(self)
    }
}

impl<T, C: Comparator<T>> Membership<T> for OrderedSet<T, C> {
    fn is_member(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.contains(value))
    }
}

// ============================================================================
// OrderedRange
// ============================================================================

/// Live bounded view onto an [`OrderedSet`].
///
/// Holds a weak handle; once the set is dropped every call fails with
/// `Detached`.
pub struct OrderedRange<T, C = Natural> {
    root: Weak<RefCell<OrderedStorage<T, C>>>,
    lo: Bound<T>,
    hi: Bound<T>,
}

impl<T: fmt::Debug, C> fmt::Debug for OrderedRange<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedRange")
            .field("lo", &self.lo)
            .field("hi", &self.hi)
            .finish()
    }
}

impl<T, C: Comparator<T>> OrderedRange<T, C> {
    fn live(&self) -> Result<LocalCell<OrderedStorage<T, C>>> {
        <LocalCell<OrderedStorage<T, C>> as Shared>::upgrade(&self.root)
    }

    fn above_lo(&self, c: &C, value: &T) -> bool {
        match &self.lo {
            Bound::Included(lo) => c.compare(value, lo) != Ordering::Less,
            Bound::Excluded(lo) => c.compare(value, lo) == Ordering::Greater,
            Bound::Unbounded => true,
        }
    }

    fn below_hi(&self, c: &C, value: &T) -> bool {
        match &self.hi {
            Bound::Included(hi) => c.compare(value, hi) != Ordering::Greater,
            Bound::Excluded(hi) => c.compare(value, hi) == Ordering::Less,
            Bound::Unbounded => true,
        }
    }

    fn in_range(&self, c: &C, value: &T) -> bool {
        self.above_lo(c, value) && self.below_hi(c, value)
    }

    /// Number of elements inside the bounds.
    pub fn len(&self) -> Result<usize> {
        self.live()?
            .read(|s| s.map.range(self.lo.as_ref(), self.hi.as_ref()).count())
    }

    /// Returns `true` if no element lies inside the bounds.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Returns `true` if `value` is inside the bounds and a member.
    pub fn contains(&self, value: &T) -> Result<bool> {
        self.live()?
            .read(|s| self.in_range(s.comparator(), value) && s.contains(value))
    }

    /// Adds `value` to the set; `IllegalArgument` outside the bounds.
    pub fn add(&self, value: T) -> Result<bool> {
        self.live()?.write(|s| {
            if !self.in_range(s.comparator(), &value) {
                return Err(CollectionError::IllegalArgument(
                    "key out of range".into(),
                ));
            }
            Ok(s.insert(value))
        })?
    }

    /// Removes `value` if it lies inside the bounds.
    pub fn remove(&self, value: &T) -> Result<bool> {
        self.live()?
            .write(|s| self.in_range(s.comparator(), value) && s.remove(value))
    }

    /// Removes every element inside the bounds.
    pub fn clear(&self) -> Result<()> {
        self.live()?.write(|s| {
            // In-range elements are contiguous in iteration order.
            let skip = s
                .values()
                .take_while(|v| !self.above_lo(s.comparator(), v))
                .count();
            let window = skip..skip + s.map.range(self.lo.as_ref(), self.hi.as_ref()).count();
            let mut index = 0;
            s.remove_where(|_| {
                let hit = window.contains(&index);
                index += 1;
                hit
            });
        })
    }

    /// Smallest element inside the bounds.
    pub fn first(&self) -> Result<T>
    where
        T: Clone,
    {
        self.live()?
            .read(|s| {
                let entry = match &self.lo {
                    Bound::Included(lo) => s.map.ceiling(lo),
                    Bound::Excluded(lo) => s.map.higher(lo),
                    Bound::Unbounded => s.map.first(),
                };
                entry
                    .map(|(k, _)| k)
                    .filter(|k| self.below_hi(s.comparator(), k))
                    .cloned()
            })?
            .ok_or(CollectionError::Empty)
    }

    /// Largest element inside the bounds.
    pub fn last(&self) -> Result<T>
    where
        T: Clone,
    {
        self.live()?
            .read(|s| {
                let entry = match &self.hi {
                    Bound::Included(hi) => s.map.floor(hi),
                    Bound::Excluded(hi) => s.map.lower(hi),
                    Bound::Unbounded => s.map.last(),
                };
                entry
                    .map(|(k, _)| k)
                    .filter(|k| self.above_lo(s.comparator(), k))
                    .cloned()
            })?
            .ok_or(CollectionError::Empty)
    }

    /// Snapshot of the elements inside the bounds, ascending.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.live()?.read(|s| {
            s.map
                .range(self.lo.as_ref(), self.hi.as_ref())
                .map(|(k, _)| k.clone())
                .collect()
        })
    }
}
