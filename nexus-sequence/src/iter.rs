//! Index-based, bidirectional, fail-fast list iterator.

use crate::positional::Positional;
use crate::{CollectionError, Result, Version};

/// Bidirectional iterator over any [`Positional`] source.
///
/// The structural version is captured at creation and compared before
/// every step. A mismatch yields one `Err(ConcurrentModification)` and the
/// iterator is fused afterwards. [`remove`](Self::remove),
/// [`set`](Self::set) and [`add`](Self::add) go through the source and
/// resynchronize the captured version, so traversal can continue.
///
/// Yields clones; no storage borrow is held between steps.
#[derive(Debug)]
pub struct Iter<P: Positional> {
    source: P,
    cursor: usize,
    last: Option<usize>,
    expected: Version,
    failed: bool,
}

impl<P: Positional> Iter<P> {
    /// Creates an iterator positioned before `index`.
    pub(crate) fn new(source: P, index: usize) -> Result<Self> {
        let expected = source.version()?;
        crate::error::check_position(index, source.len()?)?;
        Ok(Self {
            source,
            cursor: index,
            last: None,
            expected,
            failed: false,
        })
    }

    fn check(&self) -> Result<()> {
        if self.failed {
            return Err(CollectionError::ConcurrentModification);
        }
        self.expected.expect_live(self.source.version()?)
    }

    /// Reports `e` once; a failed iterator is exhausted afterwards.
    fn fail(&mut self, e: CollectionError) -> Option<Result<P::Item>> {
        if self.failed {
            return None;
        }
        self.failed = true;
        Some(Err(e))
    }

    /// Returns `true` if a forward step would yield an element.
    pub fn has_next(&self) -> bool {
        !self.failed && self.source.len().is_ok_and(|len| self.cursor < len)
    }

    /// Returns `true` if a backward step would yield an element.
    pub fn has_previous(&self) -> bool {
        !self.failed && self.cursor > 0
    }

    /// Index of the element a forward step would return.
    pub fn next_index(&self) -> usize {
        self.cursor
    }

    /// Index of the element a backward step would return, `None` at the
    /// front.
    pub fn previous_index(&self) -> Option<usize> {
        self.cursor.checked_sub(1)
    }

    /// Steps backward.
    pub fn previous(&mut self) -> Option<Result<P::Item>>
    where
        P::Item: Clone,
    {
        if self.failed {
            return None;
        }
        if let Err(e) = self.check() {
            return self.fail(e);
        }
        let index = self.cursor.checked_sub(1)?;
        match self.source.get(index) {
            Ok(value) => {
                self.cursor = index;
                self.last = Some(index);
                Some(Ok(value))
            }
            Err(e) => self.fail(e),
        }
    }

    /// Removes the element last returned by `next` or `previous`.
    pub fn remove(&mut self) -> Result<()> {
        let last = self
            .last
            .ok_or(CollectionError::IllegalState("remove without next/previous"))?;
        self.check()?;
        self.source.remove_at(last)?;
        self.cursor = last;
        self.last = None;
        self.expected = self.source.version()?;
        Ok(())
    }

    /// Replaces the element last returned by `next` or `previous`.
    pub fn set(&mut self, value: P::Item) -> Result<()> {
        let last = self
            .last
            .ok_or(CollectionError::IllegalState("set without next/previous"))?;
        self.check()?;
        self.source.set(last, value)?;
        Ok(())
    }

    /// Inserts before the element a forward step would return.
    pub fn add(&mut self, value: P::Item) -> Result<()> {
        self.check()?;
        self.source.insert(self.cursor, value)?;
        self.cursor += 1;
        self.last = None;
        self.expected = self.source.version()?;
        Ok(())
    }
}

impl<P> Iterator for Iter<P>
where
    P: Positional,
    P::Item: Clone,
{
    type Item = Result<P::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(e) = self.check() {
            return self.fail(e);
        }
        let len = match self.source.len() {
            Ok(len) => len,
            Err(e) => return self.fail(e),
        };
        if self.cursor >= len {
            return None;
        }
        match self.source.get(self.cursor) {
            Ok(value) => {
                self.last = Some(self.cursor);
                self.cursor += 1;
                Some(Ok(value))
            }
            Err(e) => self.fail(e),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self
            .source
            .len()
            .map(|len| len.saturating_sub(self.cursor))
            .unwrap_or(0);
        (0, Some(remaining))
    }
}
