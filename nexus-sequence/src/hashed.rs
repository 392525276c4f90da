//! Hash-backed set.
//!
//! Elements are the keys of a `HashMap` whose values are a zero-sized
//! [`Present`] marker. Iteration order is unspecified.
//!
//! The table capacity is tracked as a logical power of two that doubles
//! once the element count passes `capacity * load_factor`. It drives the
//! persisted header and the sizing on decode; the backing map grows on
//! its own schedule.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use log::debug;

use crate::collection::{Collection, Membership};
use crate::cursor::SnapshotCursor;
use crate::set::{SetIter, SetStorage};
use crate::storage::{LocalCell, Shared};
use crate::{CollectionError, Result, Version};

/// Load factor used when none is given.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Largest tracked table capacity.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Table capacity used by [`HashedSet::new`].
pub const DEFAULT_TABLE_CAPACITY: usize = 16;

/// Marker value stored against every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Present;

/// Smallest power of two at or above `capacity`, within `1..=MAXIMUM_CAPACITY`.
fn table_size_for(capacity: usize) -> usize {
    capacity.clamp(1, MAXIMUM_CAPACITY).next_power_of_two()
}

fn check_load_factor(load_factor: f32) -> Result<()> {
    // Also rejects NaN.
    if !(load_factor > 0.0) {
        return Err(CollectionError::IllegalArgument(format!(
            "illegal load factor: {load_factor}"
        )));
    }
    Ok(())
}

// ============================================================================
// HashedStorage
// ============================================================================

/// Map-backed set storage.
#[derive(Debug)]
pub struct HashedStorage<T> {
    map: HashMap<T, Present>,
    capacity: usize,
    load_factor: f32,
    version: Version,
}

impl<T: Eq + Hash> HashedStorage<T> {
    /// Empty storage with the given table capacity and load factor.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        check_load_factor(load_factor)?;
        Ok(Self {
            map: HashMap::new(),
            capacity: table_size_for(capacity),
            load_factor,
            version: Version::new(),
        })
    }

    /// Tracked table capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Load factor.
    #[inline]
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    fn threshold(&self) -> usize {
        (self.capacity as f64 * self.load_factor as f64) as usize
    }

    fn grow_table(&mut self) {
        let before = self.capacity;
        while self.map.len() > self.threshold() && self.capacity < MAXIMUM_CAPACITY {
            self.capacity <<= 1;
        }
        if self.capacity != before {
            debug!(
                "hashed set table resized {} -> {} at {} elements",
                before,
                self.capacity,
                self.map.len()
            );
        }
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.map.clear();
        self.version.bump();
    }

    /// Removes every element matching `pred`; one bump per removal.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> bool {
        let before = self.map.len();
        self.map.retain(|k, _| !pred(k));
        let removed = before - self.map.len();
        self.version.bump_by(removed);
        removed > 0
    }

    /// Keeps the elements for which `keep` returns `Ok(true)`.
    ///
    /// Visiting stops at the first failure; removals already made stay.
    pub fn retain_checked(&mut self, mut keep: impl FnMut(&T) -> Result<bool>) -> Result<bool> {
        let before = self.map.len();
        let mut failure = None;
        self.map.retain(|k, _| {
            if failure.is_some() {
                return true;
            }
            match keep(k) {
                Ok(keep) => keep,
                Err(e) => {
                    failure = Some(e);
                    true
                }
            }
        });
        let removed = before - self.map.len();
        self.version.bump_by(removed);
        match failure {
            Some(e) => Err(e),
            None => Ok(removed > 0),
        }
    }

    /// Elements in iteration order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.map.keys()
    }
}

impl<T: Eq + Hash + Clone> Clone for HashedStorage<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
            capacity: self.capacity,
            load_factor: self.load_factor,
            version: Version::new(),
        }
    }
}

impl<T: Eq + Hash> SetStorage for HashedStorage<T> {
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
        self.map.keys().cloned().collect()
    }

    #[inline]
    fn contains(&self, value: &T) -> bool {
        self.map.contains_key(value)
    }

    fn insert(&mut self, value: T) -> bool {
        if self.map.contains_key(&value) {
            return false;
        }
        self.map.insert(value, Present);
        self.version.bump();
        self.grow_table();
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
// HashedSet
// ============================================================================

/// Single-writer hash set handle.
///
/// # Example
///
/// ```
/// use nexus_sequence::HashedSet;
///
/// let set = HashedSet::new();
/// assert!(set.add("a").unwrap());
/// assert!(!set.add("a").unwrap());
/// assert!(set.contains(&"a").unwrap());
/// assert_eq!(set.len().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct HashedSet<T> {
    inner: LocalCell<HashedStorage<T>>,
}

impl<T: Eq + Hash> HashedSet<T> {
    /// Empty set with capacity 16 and load factor 0.75.
    pub fn new() -> Self {
        Self::from_storage(HashedStorage {
            map: HashMap::new(),
            capacity: DEFAULT_TABLE_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            version: Version::new(),
        })
    }

    /// Empty set with at least `capacity` table slots.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    /// Empty set with the given table capacity and load factor.
    ///
    /// Fails with `IllegalArgument` when `load_factor` is not positive.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        HashedStorage::with_capacity_and_load_factor(capacity, load_factor).map(Self::from_storage)
    }

    pub(crate) fn from_storage(storage: HashedStorage<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(storage)),
        }
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

    /// Tracked table capacity.
    pub fn capacity(&self) -> Result<usize> {
        self.inner.read(|s| s.capacity())
    }

    /// Load factor.
    pub fn load_factor(&self) -> Result<f32> {
        self.inner.read(|s| s.load_factor())
    }

    /// Current structural version.
    pub fn version(&self) -> Result<Version> {
        self.inner.read(|s| s.version())
    }

    /// Returns `true` if `value` is a member.
    pub fn contains(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.contains(value))
    }

    /// Adds `value`; `false` if already present.
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

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.snapshot())
    }

    /// Independent copy with the same capacity and load factor.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
    {
        self.inner.read(|s| Self::from_storage(s.clone()))
    }

    /// Fail-fast iterator with `remove`.
    pub fn iter(&self) -> Result<SetIter<HashedStorage<T>>>
    where
        T: Clone,
    {
        SetIter::new(self.inner.clone())
    }

    /// Late-binding splittable cursor.
    pub fn cursor(&self) -> SnapshotCursor<HashedStorage<T>> {
        SnapshotCursor::new(self.inner.clone())
    }

    pub(crate) fn cell(&self) -> &LocalCell<HashedStorage<T>> {
        &self.inner
    }
}

impl<T: Eq + Hash> Default for HashedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash> FromIterator<T> for HashedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let values: Vec<T> = iter.into_iter().collect();
        let capacity = ((values.len() as f32 / DEFAULT_LOAD_FACTOR) as usize + 1)
            .max(DEFAULT_TABLE_CAPACITY);
        let mut storage = HashedStorage {
            map: HashMap::with_capacity(values.len()),
            capacity: table_size_for(capacity),
            load_factor: DEFAULT_LOAD_FACTOR,
            version: Version::new(),
        };
        for value in values {
            storage.insert(value);
        }
        storage.version = Version::new();
        Self::from_storage(storage)
    }
}

impl<T: Eq + Hash + Clone> Collection<T> for HashedSet<T> {
    fn len(&self) -> Result<usize> {
        HashedSet::len(self)
    }

    fn contains(&self, value: &T) -> Result<bool> {
        HashedSet::contains(self, value)
    }

    fn add(&self, value: T) -> Result<bool> {
        HashedSet::add(self, value)
    }

    fn remove(&self, value: &T) -> Result<bool> {
        HashedSet::remove(self, value)
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        HashedSet::to_vec(self)
    }
}

impl<T: Eq + Hash> Membership<T> for HashedSet<T> {
    fn is_member(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.contains(value))
    }
}
