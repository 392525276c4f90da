//! Live sub-range views.
//!
//! A [`SubRange`] is a window `{offset, extent, len}` onto a root container.
//! It owns no elements: every call translates local indices to root
//! indices (`root = offset + local`) and delegates to the root's storage.
//! Offsets are absolute, so a view of a view simply adds its `from`.
//!
//! After each structural call made through a view, the view and all of its
//! ancestors refresh their cached length and version from the root.
//! Insertions grow the extent of the view and its ancestors; removals leave
//! the extent as it was, so the elements following the window slide in:
//!
//! ```text
//! root  [10, 20, 30, 40]      view = root[1..3] -> [20, 30]
//! view.remove_at(0)
//! root  [10, 30, 40]          view             -> [30, 40]
//! ```
//!
//! A structural change that bypasses the view (made on the root, on a
//! sibling view, or on an ancestor) leaves it stale; its next operation
//! fails with `ConcurrentModification`. Views hold the root weakly and fail
//! with `Detached` once the root is dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::cursor::IndexCursor;
use crate::error::{check_index, check_position, check_range};
use crate::iter::Iter;
use crate::positional::Positional;
use crate::storage::{SequenceStorage, Shared};
use crate::{Result, Version};

#[derive(Debug)]
struct Window {
    offset: usize,
    extent: usize,
    len: usize,
    version: Version,
    parent: Option<Rc<RefCell<Window>>>,
}

/// A live window onto a range of a root container.
pub struct SubRange<H: Shared> {
    root: H::Weak,
    window: Rc<RefCell<Window>>,
}

impl<H: Shared> Clone for SubRange<H> {
    /// Another handle onto the same view (not a new view).
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            window: self.window.clone(),
        }
    }
}

impl<H: Shared> fmt::Debug for SubRange<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self.window.borrow();
        f.debug_struct("SubRange")
            .field("offset", &w.offset)
            .field("len", &w.len)
            .field("version", &w.version)
            .finish()
    }
}

impl<H> SubRange<H>
where
    H: Shared,
    H::Target: SequenceStorage,
{
    pub(crate) fn new(root: &H, from: usize, to: usize) -> Result<Self> {
        let (len, version) = root.read(|s| (s.len(), s.version()))?;
        check_range(from, to, len)?;
        Ok(Self {
            root: root.downgrade(),
            window: Rc::new(RefCell::new(Window {
                offset: from,
                extent: to - from,
                len: to - from,
                version,
                parent: None,
            })),
        })
    }

    /// Upgrades the root and checks that this view is current.
    ///
    /// Returns the root with the window's `(offset, len)`.
    fn live(&self) -> Result<(H, usize, usize)> {
        let root = H::upgrade(&self.root)?;
        let live = root.read(|s| s.version())?;
        let w = self.window.borrow();
        w.version.expect_live(live)?;
        Ok((root, w.offset, w.len))
    }

    /// Refreshes this view and its ancestors after a structural call.
    fn refresh(&self, root: &H, inserted: usize) -> Result<()> {
        let (root_len, version) = root.read(|s| (s.len(), s.version()))?;
        let mut node = Some(self.window.clone());
        while let Some(window) = node {
            let mut w = window.borrow_mut();
            w.extent += inserted;
            w.len = w.extent.min(root_len.saturating_sub(w.offset));
            w.version = version;
            node = w.parent.clone();
        }
        Ok(())
    }

    /// Number of elements in the window.
    pub fn len(&self) -> Result<usize> {
        self.live().map(|(_, _, len)| len)
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Root version this view is synchronized with.
    pub fn version(&self) -> Result<Version> {
        self.live()?;
        Ok(self.window.borrow().version)
    }

    /// Clone of the element at local `index`.
    pub fn get(&self, index: usize) -> Result<<H::Target as SequenceStorage>::Item>
    where
        <H::Target as SequenceStorage>::Item: Clone,
    {
        let (root, offset, len) = self.live()?;
        check_index(index, len)?;
        root.get(offset + index)
    }

    /// Replaces the element at local `index`. Not structural.
    pub fn set(
        &self,
        index: usize,
        value: <H::Target as SequenceStorage>::Item,
    ) -> Result<<H::Target as SequenceStorage>::Item> {
        let (root, offset, len) = self.live()?;
        check_index(index, len)?;
        root.set(offset + index, value)
    }

    /// Inserts at local `index` (`index <= len`).
    pub fn insert(&self, index: usize, value: <H::Target as SequenceStorage>::Item) -> Result<()> {
        let (root, offset, len) = self.live()?;
        check_position(index, len)?;
        root.insert(offset + index, value)?;
        self.refresh(&root, 1)
    }

    /// Appends at the end of the window.
    pub fn add(&self, value: <H::Target as SequenceStorage>::Item) -> Result<()> {
        let len = self.len()?;
        self.insert(len, value)
    }

    /// Inserts `values` at local `index`, in order.
    pub fn insert_all(
        &self,
        index: usize,
        values: impl IntoIterator<Item = <H::Target as SequenceStorage>::Item>,
    ) -> Result<bool> {
        let (root, offset, len) = self.live()?;
        check_position(index, len)?;
        let values: Vec<_> = values.into_iter().collect();
        let count = values.len();
        if count == 0 {
            return Ok(false);
        }
        root.insert_all(offset + index, values)?;
        self.refresh(&root, count)?;
        Ok(true)
    }

    /// Appends `values` at the end of the window.
    pub fn add_all(
        &self,
        values: impl IntoIterator<Item = <H::Target as SequenceStorage>::Item>,
    ) -> Result<bool> {
        let len = self.len()?;
        self.insert_all(len, values)
    }

    /// Removes the element at local `index`.
    pub fn remove_at(&self, index: usize) -> Result<<H::Target as SequenceStorage>::Item> {
        let (root, offset, len) = self.live()?;
        check_index(index, len)?;
        let value = root.remove_at(offset + index)?;
        self.refresh(&root, 0)?;
        Ok(value)
    }

    /// Removes local `[from, to)` through the root's range primitive.
    pub fn remove_range(&self, from: usize, to: usize) -> Result<()> {
        let (root, offset, len) = self.live()?;
        check_range(from, to, len)?;
        root.remove_range(offset + from, offset + to)?;
        self.refresh(&root, 0)
    }

    /// Removes the elements currently in the window.
    ///
    /// The extent is kept, so root elements that followed the window slide
    /// into it and the view is only empty afterwards if the root had
    /// nothing past the window:
    ///
    /// ```text
    /// root  [0, 1, 2, 3, 4, 5]    view = root[1..3] -> [1, 2]
    /// view.clear()
    /// root  [0, 3, 4, 5]          view             -> [3, 4]
    /// ```
    pub fn clear(&self) -> Result<()> {
        let len = self.len()?;
        self.remove_range(0, len)
    }

    /// Local position of the first element equal to `value`.
    pub fn index_of(&self, value: &<H::Target as SequenceStorage>::Item) -> Result<Option<usize>>
    where
        <H::Target as SequenceStorage>::Item: PartialEq,
    {
        let (root, offset, len) = self.live()?;
        root.read(|s| (0..len).position(|i| s.get(offset + i) == Some(value)))
    }

    /// Returns `true` if the window holds an element equal to `value`.
    pub fn contains(&self, value: &<H::Target as SequenceStorage>::Item) -> Result<bool>
    where
        <H::Target as SequenceStorage>::Item: PartialEq,
    {
        self.index_of(value).map(|found| found.is_some())
    }

    /// Snapshot of the window.
    pub fn to_vec(&self) -> Result<Vec<<H::Target as SequenceStorage>::Item>>
    where
        <H::Target as SequenceStorage>::Item: Clone,
    {
        let (root, offset, len) = self.live()?;
        root.copy_range(offset, offset + len)
    }

    /// Fail-fast list iterator over the window.
    ///
    /// Removals through the iterator slide following root elements into
    /// the window, as [`remove_at`](Self::remove_at) does. Draining a view
    /// with `next` plus `remove` therefore keeps pulling in root elements
    /// until the root ends at the window's offset.
    pub fn iter(&self) -> Result<Iter<Self>> {
        Iter::new(self.clone(), 0)
    }

    /// Fail-fast list iterator positioned before local `index`.
    pub fn list_iter(&self, index: usize) -> Result<Iter<Self>> {
        Iter::new(self.clone(), index)
    }

    /// Partitionable cursor over the window, bound immediately.
    pub fn cursor(&self) -> Result<IndexCursor<Self>> {
        IndexCursor::bound(self.clone())
    }

    /// Nested view over local `[from, to)`.
    pub fn sub_range(&self, from: usize, to: usize) -> Result<Self> {
        let (root, offset, len) = self.live()?;
        check_range(from, to, len)?;
        let version = root.read(|s| s.version())?;
        Ok(Self {
            root: self.root.clone(),
            window: Rc::new(RefCell::new(Window {
                offset: offset + from,
                extent: to - from,
                len: to - from,
                version,
                parent: Some(self.window.clone()),
            })),
        })
    }
}

impl<H> Positional for SubRange<H>
where
    H: Shared,
    H::Target: SequenceStorage,
{
    type Item = <H::Target as SequenceStorage>::Item;

    fn len(&self) -> Result<usize> {
        SubRange::len(self)
    }

    fn version(&self) -> Result<Version> {
        SubRange::version(self)
    }

    fn get(&self, index: usize) -> Result<Self::Item>
    where
        Self::Item: Clone,
    {
        SubRange::get(self, index)
    }

    fn set(&self, index: usize, value: Self::Item) -> Result<Self::Item> {
        SubRange::set(self, index, value)
    }

    fn insert(&self, index: usize, value: Self::Item) -> Result<()> {
        SubRange::insert(self, index, value)
    }

    fn remove_at(&self, index: usize) -> Result<Self::Item> {
        SubRange::remove_at(self, index)
    }

    fn remove_range(&self, from: usize, to: usize) -> Result<()> {
        SubRange::remove_range(self, from, to)
    }

    fn insert_all(&self, index: usize, values: Vec<Self::Item>) -> Result<()> {
        SubRange::insert_all(self, index, values).map(|_| ())
    }

    fn copy_range(&self, from: usize, to: usize) -> Result<Vec<Self::Item>>
    where
        Self::Item: Clone,
    {
        let (root, offset, len) = self.live()?;
        check_range(from, to, len)?;
        root.copy_range(offset + from, offset + to)
    }
}
