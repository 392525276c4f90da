//! Partitionable bulk-traversal cursors.
//!
//! A cursor walks a half-open range of a container and can be split
//! recursively into further cursors for chunked or parallel consumption.
//! Splits never overlap, and concatenating the pieces in split order
//! (each returned piece precedes the cursor it was split from) gives back
//! the original order.
//!
//! Whole-container cursors bind late: the fence and the captured version
//! are read on first use, so structural changes made before that are
//! visible and any made after it fail the traversal.
//!
//! | Cursor | Source | Split |
//! |--------|--------|-------|
//! | [`IndexCursor`] | arrays, views | midpoint, lower half returned |
//! | [`ChainCursor`] | linked sequence | buffers a growing batch into a [`BufferCursor`] |
//! | [`BufferCursor`] | owned buffer | midpoint |
//! | [`SnapshotCursor`] | sets | midpoint over a snapshot |

use std::collections::VecDeque;

use log::trace;

use crate::chain::{ChainCell, NIL};
use crate::positional::Positional;
use crate::set::SetStorage;
use crate::storage::{LocalCell, SequenceStorage, Shared};
use crate::{CollectionError, Result, Version};

/// Growth step of the batches buffered by [`ChainCursor::try_split`].
pub const BATCH_UNIT: usize = 1 << 10;

/// Largest batch buffered by one chain split.
pub const MAX_BATCH: usize = 1 << 25;

/// A recursively splittable traversal.
pub trait Partition: Sized {
    /// Element type.
    type Item;

    /// Type of the pieces produced by [`try_split`](Self::try_split).
    type Split: Partition<Item = Self::Item>;

    /// Feeds the next element to `action`. Returns `Ok(false)` when
    /// exhausted. The version is checked on every step.
    fn try_advance(&mut self, action: impl FnMut(Self::Item)) -> Result<bool>;

    /// Feeds every remaining element to `action`, checking the version
    /// once after the whole pass.
    fn for_each_remaining(&mut self, action: impl FnMut(Self::Item)) -> Result<()>;

    /// Splits off a prefix of the remaining elements, or `None` when the
    /// remainder is too small to split.
    fn try_split(&mut self) -> Result<Option<Self::Split>>;

    /// Number of elements left, if known; otherwise an upper estimate.
    fn estimate_size(&self) -> usize;
}

// ============================================================================
// IndexCursor
// ============================================================================

/// Cursor over an index range of a [`Positional`] source.
#[derive(Debug)]
pub struct IndexCursor<P: Positional> {
    source: P,
    index: usize,
    fence: Option<usize>,
    expected: Version,
}

impl<P: Positional> IndexCursor<P> {
    /// Creates an unbound cursor over the whole source.
    pub(crate) fn new(source: P) -> Self {
        Self {
            source,
            index: 0,
            fence: None,
            expected: Version::new(),
        }
    }

    /// Creates a cursor bound immediately.
    pub(crate) fn bound(source: P) -> Result<Self> {
        let mut cursor = Self::new(source);
        cursor.bind()?;
        Ok(cursor)
    }

    fn bind(&mut self) -> Result<usize> {
        if let Some(fence) = self.fence {
            return Ok(fence);
        }
        let fence = self.source.len()?;
        self.expected = self.source.version()?;
        self.fence = Some(fence);
        trace!("index cursor bound: fence {}", fence);
        Ok(fence)
    }

    fn check(&self) -> Result<()> {
        self.expected.expect_live(self.source.version()?)
    }
}

impl<P> Partition for IndexCursor<P>
where
    P: Positional,
    P::Item: Clone,
{
    type Item = P::Item;
    type Split = Self;

    fn try_advance(&mut self, mut action: impl FnMut(P::Item)) -> Result<bool> {
        let hi = self.bind()?;
        if self.index >= hi {
            return Ok(false);
        }
        self.check()?;
        let value = self.source.get(self.index)?;
        self.index += 1;
        action(value);
        self.check()?;
        Ok(true)
    }

    fn for_each_remaining(&mut self, mut action: impl FnMut(P::Item)) -> Result<()> {
        let hi = self.bind()?;
        if self.index < hi {
            let values = match self.source.copy_range(self.index, hi) {
                Ok(values) => values,
                Err(e) => {
                    self.check()?;
                    return Err(e);
                }
            };
            self.index = hi;
            for value in values {
                action(value);
            }
        }
        self.check()
    }

    fn try_split(&mut self) -> Result<Option<Self>> {
        let hi = self.bind()?;
        let lo = self.index;
        let mid = lo + (hi - lo) / 2;
        if lo >= mid {
            return Ok(None);
        }
        trace!("index cursor split: [{}, {}) | [{}, {})", lo, mid, mid, hi);
        self.index = mid;
        Ok(Some(Self {
            source: self.source.clone(),
            index: lo,
            fence: Some(mid),
            expected: self.expected,
        }))
    }

    fn estimate_size(&self) -> usize {
        let fence = match self.fence {
            Some(fence) => fence,
            None => self.source.len().unwrap_or(0),
        };
        fence.saturating_sub(self.index)
    }
}

// ============================================================================
// ChainCursor
// ============================================================================

/// Late-binding cursor over a linked sequence.
///
/// Splitting copies a batch of elements into a [`BufferCursor`]; each
/// successive split buffers [`BATCH_UNIT`] more than the previous one, up
/// to [`MAX_BATCH`]. A remainder of one element is not split.
#[derive(Debug)]
pub struct ChainCursor<T> {
    source: ChainCell<T>,
    current: usize,
    est: Option<usize>,
    expected: Version,
    batch: usize,
}

impl<T> ChainCursor<T> {
    pub(crate) fn new(source: ChainCell<T>) -> Self {
        Self {
            source,
            current: NIL,
            est: None,
            expected: Version::new(),
            batch: 0,
        }
    }

    fn bind(&mut self) -> Result<usize> {
        if let Some(est) = self.est {
            return Ok(est);
        }
        let (head, len, version) = self.source.read(|s| (s.head(), s.len(), s.version()))?;
        self.current = head;
        self.expected = version;
        self.est = Some(len);
        trace!("chain cursor bound: {} elements", len);
        Ok(len)
    }

    fn check(&self) -> Result<()> {
        self.expected.expect_live(self.source.read(|s| s.version())?)
    }

    /// Clones up to `n` values starting at the current node and advances
    /// past them.
    fn take(&mut self, n: usize) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.check()?;
        let (values, next) = self.source.read(|s| s.walk(self.current, n))?;
        self.current = next;
        Ok(values)
    }
}

impl<T: Clone> Partition for ChainCursor<T> {
    type Item = T;
    type Split = BufferCursor<T>;

    fn try_advance(&mut self, mut action: impl FnMut(T)) -> Result<bool> {
        let est = self.bind()?;
        if est == 0 || self.current == NIL {
            return Ok(false);
        }
        let mut values = self.take(1)?;
        let value = values.pop().ok_or(CollectionError::ConcurrentModification)?;
        self.est = Some(est - 1);
        action(value);
        self.check()?;
        Ok(true)
    }

    fn for_each_remaining(&mut self, mut action: impl FnMut(T)) -> Result<()> {
        let est = self.bind()?;
        if est > 0 && self.current != NIL {
            let values = self.take(est)?;
            self.current = NIL;
            self.est = Some(0);
            for value in values {
                action(value);
            }
        }
        self.check()
    }

    fn try_split(&mut self) -> Result<Option<BufferCursor<T>>> {
        let est = self.bind()?;
        if est <= 1 || self.current == NIL {
            return Ok(None);
        }
        let n = (self.batch + BATCH_UNIT).min(est).min(MAX_BATCH);
        let values = self.take(n)?;
        self.batch = values.len();
        self.est = Some(est - values.len());
        trace!(
            "chain cursor split: buffered {}, {} remain",
            values.len(),
            est - values.len()
        );
        Ok(Some(BufferCursor::new(values)))
    }

    fn estimate_size(&self) -> usize {
        match self.est {
            Some(est) => est,
            None => self.source.read(|s| s.len()).unwrap_or(0),
        }
    }
}

// ============================================================================
// BufferCursor
// ============================================================================

/// Cursor over an owned buffer of elements.
#[derive(Debug, Clone)]
pub struct BufferCursor<T> {
    buf: VecDeque<T>,
}

impl<T> BufferCursor<T> {
    /// Wraps `values`.
    pub fn new(values: Vec<T>) -> Self {
        Self { buf: values.into() }
    }
}

impl<T> Partition for BufferCursor<T> {
    type Item = T;
    type Split = Self;

    fn try_advance(&mut self, mut action: impl FnMut(T)) -> Result<bool> {
        match self.buf.pop_front() {
            Some(value) => {
                action(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn for_each_remaining(&mut self, action: impl FnMut(T)) -> Result<()> {
        self.buf.drain(..).for_each(action);
        Ok(())
    }

    fn try_split(&mut self) -> Result<Option<Self>> {
        split_buffer(&mut self.buf).map_or(Ok(None), |buf| Ok(Some(Self { buf })))
    }

    fn estimate_size(&self) -> usize {
        self.buf.len()
    }
}

/// Splits `buf` at its midpoint, leaving the upper half in place.
fn split_buffer<T>(buf: &mut VecDeque<T>) -> Option<VecDeque<T>> {
    if buf.len() < 2 {
        return None;
    }
    let upper = buf.split_off(buf.len() / 2);
    Some(std::mem::replace(buf, upper))
}

// ============================================================================
// SnapshotCursor
// ============================================================================

/// Late-binding cursor over a set.
///
/// On first use it snapshots the set in iteration order and captures the
/// version; every later step is checked against the live set.
#[derive(Debug)]
pub struct SnapshotCursor<S: SetStorage> {
    source: LocalCell<S>,
    buf: Option<VecDeque<S::Item>>,
    expected: Version,
}

impl<S: SetStorage> SnapshotCursor<S> {
    pub(crate) fn new(source: LocalCell<S>) -> Self {
        Self {
            source,
            buf: None,
            expected: Version::new(),
        }
    }

    fn bind(&mut self) -> Result<&mut VecDeque<S::Item>>
    where
        S::Item: Clone,
    {
        if self.buf.is_none() {
            let (snapshot, version) = self.source.read(|s| (s.snapshot(), s.version()))?;
            trace!("set cursor bound: {} elements", snapshot.len());
            self.expected = version;
            self.buf = Some(snapshot.into());
        }
        Ok(self.buf.get_or_insert_with(VecDeque::new))
    }

    fn check(&self) -> Result<()> {
        self.expected.expect_live(self.source.read(|s| s.version())?)
    }
}

impl<S> Partition for SnapshotCursor<S>
where
    S: SetStorage,
    S::Item: Clone,
{
    type Item = S::Item;
    type Split = Self;

    fn try_advance(&mut self, mut action: impl FnMut(S::Item)) -> Result<bool> {
        let next = self.bind()?.pop_front();
        match next {
            Some(value) => {
                self.check()?;
                action(value);
                self.check()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn for_each_remaining(&mut self, action: impl FnMut(S::Item)) -> Result<()> {
        let values: Vec<S::Item> = self.bind()?.drain(..).collect();
        values.into_iter().for_each(action);
        self.check()
    }

    fn try_split(&mut self) -> Result<Option<Self>> {
        let lower = split_buffer(self.bind()?);
        Ok(lower.map(|buf| Self {
            source: self.source.clone(),
            buf: Some(buf),
            expected: self.expected,
        }))
    }

    fn estimate_size(&self) -> usize {
        match &self.buf {
            Some(buf) => buf.len(),
            None => self.source.read(|s| s.len()).unwrap_or(0),
        }
    }
}
