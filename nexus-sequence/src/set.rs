//! Set storage capability and the snapshot-based set iterator.

use crate::storage::{LocalCell, Shared};
use crate::{CollectionError, Result, Version};

/// Unique-element storage with a structural-modification counter.
///
/// Implemented by the hashed and the ordered set storages. `insert` and
/// `remove` bump the version only when they change the membership.
pub trait SetStorage {
    /// Element type.
    type Item;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Current structural version.
    fn version(&self) -> Version;

    /// Clones of every element in iteration order.
    fn snapshot(&self) -> Vec<Self::Item>
    where
        Self::Item: Clone;

    /// Returns `true` if `value` is a member.
    fn contains(&self, value: &Self::Item) -> bool;

    /// Adds `value`; `false` if it was already present.
    fn insert(&mut self, value: Self::Item) -> bool;

    /// Removes `value`; `false` if it was absent.
    fn remove(&mut self, value: &Self::Item) -> bool;

    /// Returns `true` if `len() == 0`.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fail-fast iterator over a set.
///
/// Walks a snapshot taken at creation. Every step compares the captured
/// version against the live set; [`remove`](Self::remove) deletes the last
/// returned element from the set and resynchronizes.
#[derive(Debug)]
pub struct SetIter<S: SetStorage> {
    source: LocalCell<S>,
    items: std::vec::IntoIter<S::Item>,
    last: Option<S::Item>,
    expected: Version,
    failed: bool,
}

impl<S> SetIter<S>
where
    S: SetStorage,
    S::Item: Clone,
{
    pub(crate) fn new(source: LocalCell<S>) -> Result<Self> {
        Self::with_order(source, false)
    }

    pub(crate) fn descending(source: LocalCell<S>) -> Result<Self> {
        Self::with_order(source, true)
    }

    fn with_order(source: LocalCell<S>, reverse: bool) -> Result<Self> {
        let (mut snapshot, expected) = source.read(|s| (s.snapshot(), s.version()))?;
        if reverse {
            snapshot.reverse();
        }
        Ok(Self {
            source,
            items: snapshot.into_iter(),
            last: None,
            expected,
            failed: false,
        })
    }

    fn check(&self) -> Result<()> {
        self.expected.expect_live(self.source.read(|s| s.version())?)
    }

    /// Returns `true` if another element remains.
    pub fn has_next(&self) -> bool {
        !self.failed && self.items.len() > 0
    }

    /// Removes the element last returned by `next`.
    pub fn remove(&mut self) -> Result<()> {
        if self.failed {
            return Err(CollectionError::ConcurrentModification);
        }
        let last = self
            .last
            .take()
            .ok_or(CollectionError::IllegalState("remove without next"))?;
        self.check()?;
        self.expected = self.source.write(|s| {
            s.remove(&last);
            s.version()
        })?;
        Ok(())
    }
}

impl<S> Iterator for SetIter<S>
where
    S: SetStorage,
    S::Item: Clone,
{
    type Item = Result<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(e) = self.check() {
            self.failed = true;
            return Some(Err(e));
        }
        let value = self.items.next()?;
        self.last = Some(value.clone());
        Some(Ok(value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.items.len()))
        }
    }
}
