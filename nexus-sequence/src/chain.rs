//! Doubly linked node chain.
//!
//! Nodes live in a [`slab::Slab`] and link to each other by slab key, with
//! [`NIL`] marking an absent link. The slab owns every node; links are plain
//! keys, so there are no reference cycles.
//!
//! ```text
//!          head                               tail
//!           │                                  │
//!           ▼                                  ▼
//! NIL ◄── [ 0 ] ◄──► [ 1 ] ◄──► [ 2 ] ◄──► [ 3 ] ──► NIL
//! ```
//!
//! Invariants: `head.prev` and `tail.next` are [`NIL`], and walking `next`
//! from `head` visits exactly `len` nodes.
//!
//! End operations are O(1); removal through a [`NodeKey`] is O(1);
//! positional access walks from whichever end is closer, so it costs at
//! most `len / 2` steps.
//!
//! # Example
//!
//! ```
//! use nexus_sequence::LinkedSequence;
//!
//! let chain = LinkedSequence::new();
//! chain.push_front(1).unwrap();
//! chain.push_back(2).unwrap();
//! chain.push_front(0).unwrap();
//! assert_eq!(chain.to_vec().unwrap(), vec![0, 1, 2]);
//!
//! assert_eq!(chain.pop_back().unwrap(), Some(2));
//! assert_eq!(chain.to_vec().unwrap(), vec![0, 1]);
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use slab::Slab;

use crate::collection::{Collection, Membership, Sequence};
use crate::cursor::ChainCursor;
use crate::error::{check_index, check_position, check_range};
use crate::storage::{LocalCell, SequenceStorage, Shared};
use crate::view::SubRange;
use crate::{CollectionError, Result, Version};

/// Absent link.
pub(crate) const NIL: usize = usize::MAX;

/// Cell type behind a [`LinkedSequence`].
pub type ChainCell<T> = LocalCell<ChainStorage<T>>;

/// Stable handle to a node, returned by the push operations.
///
/// Valid until that node is removed; slab keys are reused afterwards, so a
/// stale key may name a node pushed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

// ============================================================================
// ListNode
// ============================================================================

#[derive(Debug, Clone)]
struct ListNode<T> {
    value: T,
    prev: usize,
    next: usize,
}

// ============================================================================
// ChainStorage
// ============================================================================

/// Node arena plus head/tail links.
#[derive(Debug)]
pub struct ChainStorage<T> {
    nodes: Slab<ListNode<T>>,
    head: usize,
    tail: usize,
    version: Version,
}

impl<T> ChainStorage<T> {
    /// Empty chain.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Empty chain with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            version: Version::new(),
        }
    }

    #[inline]
    pub(crate) fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub(crate) fn tail(&self) -> usize {
        self.tail
    }

    #[inline]
    pub(crate) fn value(&self, key: usize) -> &T {
        &self.nodes[key].value
    }

    #[inline]
    pub(crate) fn next_of(&self, key: usize) -> usize {
        self.nodes[key].next
    }

    #[inline]
    pub(crate) fn prev_of(&self, key: usize) -> usize {
        self.nodes[key].prev
    }

    // ------------------------------------------------------------------------
    // Linking (never bumps the version)
    // ------------------------------------------------------------------------

    fn attach_back(&mut self, value: T) -> usize {
        let key = self.nodes.insert(ListNode {
            value,
            prev: self.tail,
            next: NIL,
        });
        if self.tail != NIL {
            self.nodes[self.tail].next = key;
        } else {
            self.head = key;
        }
        self.tail = key;
        key
    }

    fn attach_front(&mut self, value: T) -> usize {
        let key = self.nodes.insert(ListNode {
            value,
            prev: NIL,
            next: self.head,
        });
        if self.head != NIL {
            self.nodes[self.head].prev = key;
        } else {
            self.tail = key;
        }
        self.head = key;
        key
    }

    /// Links `value` before `before`; a `before` of [`NIL`] appends.
    fn attach_before(&mut self, before: usize, value: T) -> usize {
        if before == NIL {
            return self.attach_back(value);
        }
        let prev = self.nodes[before].prev;
        let key = self.nodes.insert(ListNode {
            value,
            prev,
            next: before,
        });
        self.nodes[before].prev = key;
        if prev != NIL {
            self.nodes[prev].next = key;
        } else {
            self.head = key;
        }
        key
    }

    fn detach(&mut self, key: usize) -> T {
        let node = self.nodes.remove(key);
        if node.prev != NIL {
            self.nodes[node.prev].next = node.next;
        } else {
            self.head = node.next;
        }
        if node.next != NIL {
            self.nodes[node.next].prev = node.prev;
        } else {
            self.tail = node.prev;
        }
        node.value
    }

    /// Key of the node at `index` (`index < len`), walking from the
    /// closer end.
    fn node_at(&self, index: usize) -> usize {
        let len = self.nodes.len();
        if index < len >> 1 {
            let mut key = self.head;
            for _ in 0..index {
                key = self.nodes[key].next;
            }
            key
        } else {
            let mut key = self.tail;
            for _ in index + 1..len {
                key = self.nodes[key].prev;
            }
            key
        }
    }

    /// Clones up to `n` values from `from` forward; returns them with the
    /// key after the last one taken.
    pub(crate) fn walk(&self, from: usize, n: usize) -> (Vec<T>, usize)
    where
        T: Clone,
    {
        let mut values = Vec::with_capacity(n.min(self.nodes.len()));
        let mut key = from;
        while key != NIL && values.len() < n {
            match self.nodes.get(key) {
                Some(node) => {
                    values.push(node.value.clone());
                    key = node.next;
                }
                None => break,
            }
        }
        (values, key)
    }

    // ------------------------------------------------------------------------
    // Structural operations
    // ------------------------------------------------------------------------

    /// Links `value` at the front.
    pub fn push_front(&mut self, value: T) -> usize {
        let key = self.attach_front(value);
        self.version.bump();
        key
    }

    /// Links `value` at the back.
    pub fn push_back(&mut self, value: T) -> usize {
        let key = self.attach_back(value);
        self.version.bump();
        key
    }

    /// Links `value` before the node `before` ([`NIL`] appends).
    pub(crate) fn insert_before(&mut self, before: usize, value: T) -> usize {
        let key = self.attach_before(before, value);
        self.version.bump();
        key
    }

    /// Unlinks the node `key`.
    pub(crate) fn remove_key(&mut self, key: usize) -> T {
        let value = self.detach(key);
        self.version.bump();
        value
    }

    /// Unlinks the node `key` if it is live.
    pub fn remove_node(&mut self, key: usize) -> Option<T> {
        if !self.nodes.contains(key) {
            return None;
        }
        Some(self.remove_key(key))
    }

    /// Replaces the value of node `key`. Not structural.
    pub(crate) fn replace_key(&mut self, key: usize, value: T) -> T {
        std::mem::replace(&mut self.nodes[key].value, value)
    }

    /// Unlinks the first node.
    pub fn pop_front(&mut self) -> Option<T> {
        (self.head != NIL).then(|| self.remove_key(self.head))
    }

    /// Unlinks the last node.
    pub fn pop_back(&mut self) -> Option<T> {
        (self.tail != NIL).then(|| self.remove_key(self.tail))
    }

    /// First value.
    pub fn front(&self) -> Option<&T> {
        self.nodes.get(self.head).map(|n| &n.value)
    }

    /// Last value.
    pub fn back(&self) -> Option<&T> {
        self.nodes.get(self.tail).map(|n| &n.value)
    }

    /// Unlinks every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
        self.version.bump();
    }

    /// Sorts by relinking the values in sorted order. One version bump.
    pub fn sort_by(&mut self, compare: impl FnMut(&T, &T) -> Ordering) {
        let mut values = Vec::with_capacity(self.nodes.len());
        let mut key = self.head;
        while key != NIL {
            let next = self.nodes[key].next;
            values.push(self.nodes.remove(key).value);
            key = next;
        }
        self.head = NIL;
        self.tail = NIL;
        values.sort_by(compare);
        for value in values {
            self.attach_back(value);
        }
        self.version.bump();
    }

    /// Unlinks every node whose value matches `pred`; one bump per removal.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> bool {
        let mut removed = false;
        let mut key = self.head;
        while key != NIL {
            let next = self.nodes[key].next;
            if pred(&self.nodes[key].value) {
                self.remove_key(key);
                removed = true;
            }
            key = next;
        }
        removed
    }

    /// Keeps the nodes for which `keep` returns `Ok(true)`.
    ///
    /// Each rejected node is unlinked as it is found, so a failure part way
    /// leaves earlier removals in place.
    pub fn retain_checked(&mut self, mut keep: impl FnMut(&T) -> Result<bool>) -> Result<bool> {
        let mut removed = false;
        let mut key = self.head;
        while key != NIL {
            let next = self.nodes[key].next;
            if !keep(&self.nodes[key].value)? {
                self.remove_key(key);
                removed = true;
            }
            key = next;
        }
        Ok(removed)
    }

    /// Position of the first value equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.keys().position(|k| self.nodes[k].value == *value)
    }

    /// Position of the last value equal to `value`.
    pub fn last_index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let mut index = self.nodes.len();
        let mut key = self.tail;
        while key != NIL {
            index -= 1;
            if self.nodes[key].value == *value {
                return Some(index);
            }
            key = self.nodes[key].prev;
        }
        None
    }

    /// Unlinks the first node equal to `value`.
    pub fn remove_first_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let found = self.keys().find(|&k| self.nodes[k].value == *value);
        match found {
            Some(key) => {
                self.remove_key(key);
                true
            }
            None => false,
        }
    }

    /// Unlinks the last node equal to `value`.
    pub fn remove_last_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let mut key = self.tail;
        while key != NIL {
            if self.nodes[key].value == *value {
                self.remove_key(key);
                return true;
            }
            key = self.nodes[key].prev;
        }
        false
    }

    /// Node keys from head to tail.
    fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors((self.head != NIL).then_some(self.head), |&k| {
            let next = self.nodes[k].next;
            (next != NIL).then_some(next)
        })
    }

    /// Values from head to tail.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.keys().map(|k| &self.nodes[k].value)
    }
}

impl<T> Default for ChainStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for ChainStorage<T> {
    /// Relinks clones of the values into a fresh arena, with a fresh
    /// version.
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity(self.nodes.len());
        for value in self.values() {
            copy.attach_back(value.clone());
        }
        copy
    }
}

impl<T> SequenceStorage for ChainStorage<T> {
    type Item = T;

    #[inline]
    fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn version(&self) -> Version {
        self.version
    }

    fn get(&self, index: usize) -> Option<&T> {
        if index >= self.nodes.len() {
            return None;
        }
        Some(&self.nodes[self.node_at(index)].value)
    }

    fn replace(&mut self, index: usize, value: T) -> Result<T> {
        check_index(index, self.nodes.len())?;
        let key = self.node_at(index);
        Ok(self.replace_key(key, value))
    }

    fn insert(&mut self, index: usize, value: T) -> Result<()> {
        check_position(index, self.nodes.len())?;
        let before = if index == self.nodes.len() {
            NIL
        } else {
            self.node_at(index)
        };
        self.insert_before(before, value);
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<T> {
        check_index(index, self.nodes.len())?;
        let key = self.node_at(index);
        Ok(self.remove_key(key))
    }

    fn remove_range(&mut self, from: usize, to: usize) -> Result<()> {
        check_range(from, to, self.nodes.len())?;
        if from == to {
            return Ok(());
        }
        let mut key = self.node_at(from);
        for _ in from..to {
            let next = self.nodes[key].next;
            self.remove_key(key);
            key = next;
        }
        Ok(())
    }

    fn insert_all(&mut self, index: usize, values: Vec<T>) -> Result<()> {
        check_position(index, self.nodes.len())?;
        if values.is_empty() {
            return Ok(());
        }
        let before = if index == self.nodes.len() {
            NIL
        } else {
            self.node_at(index)
        };
        self.nodes.reserve(values.len());
        for value in values {
            self.attach_before(before, value);
        }
        self.version.bump();
        Ok(())
    }

    fn copy_range(&self, from: usize, to: usize) -> Vec<T>
    where
        T: Clone,
    {
        if from >= to {
            return Vec::new();
        }
        self.walk(self.node_at(from), to - from).0
    }
}

// ============================================================================
// LinkedSequence
// ============================================================================

/// Single-writer doubly linked sequence handle.
///
/// Offers the positional surface shared with
/// [`GrowableArray`](crate::GrowableArray) plus deque, stack and queue
/// adapters over the same chain:
///
/// | Family | On empty | Operations |
/// |--------|----------|------------|
/// | peek/poll/pop | `Ok(None)` | `peek_first`, `peek_last`, `poll_first`, `poll_last`, `pop_front`, `pop_back`, `peek`, `poll` |
/// | required | `Err(Empty)` | `first`, `last`, `remove_first`, `remove_last`, `pop`, `element` |
///
/// Stack: `push` = `push_front`, `pop` = `remove_first`. Queue: `offer` =
/// `push_back`, `poll` = `poll_first`.
#[derive(Debug)]
pub struct LinkedSequence<T> {
    inner: ChainCell<T>,
}

impl<T> LinkedSequence<T> {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::from_storage(ChainStorage::new())
    }

    fn from_storage(storage: ChainStorage<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(storage)),
        }
    }

    /// A second handle onto the same chain.
    pub fn share(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> Result<usize> {
        self.inner.read(|s| s.len())
    }

    /// Returns `true` if the sequence is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current structural version.
    pub fn version(&self) -> Result<Version> {
        self.inner.read(|s| s.version())
    }

    // ------------------------------------------------------------------------
    // Deque
    // ------------------------------------------------------------------------

    /// Links `value` at the front.
    pub fn push_front(&self, value: T) -> Result<NodeKey> {
        self.inner.write(|s| NodeKey(s.push_front(value)))
    }

    /// Links `value` at the back.
    pub fn push_back(&self, value: T) -> Result<NodeKey> {
        self.inner.write(|s| NodeKey(s.push_back(value)))
    }

    /// Removes the front element; `None` when empty.
    pub fn pop_front(&self) -> Result<Option<T>> {
        self.inner.write(|s| s.pop_front())
    }

    /// Removes the back element; `None` when empty.
    pub fn pop_back(&self) -> Result<Option<T>> {
        self.inner.write(|s| s.pop_back())
    }

    /// Same as [`pop_front`](Self::pop_front).
    pub fn poll_first(&self) -> Result<Option<T>> {
        self.pop_front()
    }

    /// Same as [`pop_back`](Self::pop_back).
    pub fn poll_last(&self) -> Result<Option<T>> {
        self.pop_back()
    }

    /// Clone of the front element; `None` when empty.
    pub fn peek_first(&self) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.front().cloned())
    }

    /// Clone of the back element; `None` when empty.
    pub fn peek_last(&self) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.back().cloned())
    }

    /// Clone of the front element.
    pub fn first(&self) -> Result<T>
    where
        T: Clone,
    {
        self.peek_first()?.ok_or(CollectionError::Empty)
    }

    /// Clone of the back element.
    pub fn last(&self) -> Result<T>
    where
        T: Clone,
    {
        self.peek_last()?.ok_or(CollectionError::Empty)
    }

    /// Removes the front element.
    pub fn remove_first(&self) -> Result<T> {
        self.pop_front()?.ok_or(CollectionError::Empty)
    }

    /// Removes the back element.
    pub fn remove_last(&self) -> Result<T> {
        self.pop_back()?.ok_or(CollectionError::Empty)
    }

    // ------------------------------------------------------------------------
    // Stack and queue adapters
    // ------------------------------------------------------------------------

    /// Stack push: links at the front.
    pub fn push(&self, value: T) -> Result<NodeKey> {
        self.push_front(value)
    }

    /// Stack pop: removes the front element.
    pub fn pop(&self) -> Result<T> {
        self.remove_first()
    }

    /// Stack/queue peek at the front element.
    pub fn peek(&self) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.peek_first()
    }

    /// Queue offer: links at the back.
    pub fn offer(&self, value: T) -> Result<NodeKey> {
        self.push_back(value)
    }

    /// Queue poll: removes the front element, `None` when empty.
    pub fn poll(&self) -> Result<Option<T>> {
        self.poll_first()
    }

    /// Queue head, failing with `Empty`.
    pub fn element(&self) -> Result<T>
    where
        T: Clone,
    {
        self.first()
    }

    // ------------------------------------------------------------------------
    // Node keys
    // ------------------------------------------------------------------------

    /// Removes the node behind `key` in O(1).
    ///
    /// # Hazards
    ///
    /// Keys are slab slots and are reused once their node is removed. A key
    /// kept past the removal of its node may name a node pushed later, and
    /// this call then removes that node instead of failing.
    pub fn remove_node(&self, key: NodeKey) -> Result<T> {
        self.inner
            .write(|s| s.remove_node(key.0))?
            .ok_or_else(|| CollectionError::IllegalArgument(format!("no live node {}", key.0)))
    }

    /// Clone of the value behind `key`.
    pub fn get_node(&self, key: NodeKey) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.nodes.get(key.0).map(|n| n.value.clone()))
    }

    // ------------------------------------------------------------------------
    // Positional and bulk
    // ------------------------------------------------------------------------

    /// Clone of the element at `index`.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        crate::positional::Positional::get(&self.inner, index)
    }

    /// Replaces the element at `index`. Not structural.
    pub fn set(&self, index: usize, value: T) -> Result<T> {
        self.inner.write(|s| s.replace(index, value))?
    }

    /// Inserts at `index`; `index == len` appends.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        self.inner.write(|s| s.insert(index, value))?
    }

    /// Removes and returns the element at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.inner.write(|s| s.remove_at(index))?
    }

    /// Appends `value`.
    pub fn add(&self, value: T) -> Result<()> {
        self.push_back(value).map(|_| ())
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.remove_first_occurrence(value)
    }

    /// Removes the first element equal to `value`.
    pub fn remove_first_occurrence(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.inner.write(|s| s.remove_first_occurrence(value))
    }

    /// Removes the last element equal to `value`.
    pub fn remove_last_occurrence(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.inner.write(|s| s.remove_last_occurrence(value))
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

    /// Removes `[from, to)`.
    pub fn remove_range(&self, from: usize, to: usize) -> Result<()> {
        self.inner.write(|s| s.remove_range(from, to))?
    }

    /// Removes every element.
    pub fn clear(&self) -> Result<()> {
        self.inner.write(|s| s.clear())
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
        self.inner.read(|s| s.index_of(value))
    }

    /// Last position of `value`.
    pub fn last_index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.inner.read(|s| s.last_index_of(value))
    }

    /// Snapshot of the elements, front to back.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.inner.read(|s| s.values().cloned().collect())
    }

    /// Independent copy of the chain, relinked into a fresh arena.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
    {
        self.inner.read(|s| Self::from_storage(s.clone()))
    }

    /// Fail-fast bidirectional iterator from the front.
    pub fn iter(&self) -> Result<ChainIter<T>> {
        ChainIter::new(self.inner.clone(), 0)
    }

    /// Fail-fast bidirectional iterator positioned before `index`.
    pub fn list_iter(&self, index: usize) -> Result<ChainIter<T>> {
        ChainIter::new(self.inner.clone(), index)
    }

    /// Fail-fast iterator from back to front.
    pub fn descending_iter(&self) -> Result<DescendingIter<T>> {
        let len = self.inner.read(|s| s.len())?;
        Ok(DescendingIter(ChainIter::new(self.inner.clone(), len)?))
    }

    /// Late-binding batching cursor.
    pub fn cursor(&self) -> ChainCursor<T> {
        ChainCursor::new(self.inner.clone())
    }

    /// Live view over `[from, to)`.
    pub fn sub_range(&self, from: usize, to: usize) -> Result<SubRange<ChainCell<T>>> {
        SubRange::new(&self.inner, from, to)
    }

    pub(crate) fn cell(&self) -> &ChainCell<T> {
        &self.inner
    }
}

impl<T> Default for LinkedSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for LinkedSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut storage = ChainStorage::new();
        for value in iter {
            storage.attach_back(value);
        }
        Self::from_storage(storage)
    }
}

impl<T: Clone + PartialEq> Collection<T> for LinkedSequence<T> {
    fn len(&self) -> Result<usize> {
        LinkedSequence::len(self)
    }

    fn contains(&self, value: &T) -> Result<bool> {
        LinkedSequence::contains(self, value)
    }

    fn add(&self, value: T) -> Result<bool> {
        LinkedSequence::add(self, value).map(|()| true)
    }

    fn remove(&self, value: &T) -> Result<bool> {
        LinkedSequence::remove(self, value)
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        LinkedSequence::to_vec(self)
    }
}

impl<T: Clone + PartialEq> Sequence<T> for LinkedSequence<T> {
    fn get(&self, index: usize) -> Result<T> {
        LinkedSequence::get(self, index)
    }

    fn set(&self, index: usize, value: T) -> Result<T> {
        LinkedSequence::set(self, index, value)
    }

    fn insert(&self, index: usize, value: T) -> Result<()> {
        LinkedSequence::insert(self, index, value)
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        LinkedSequence::remove_at(self, index)
    }

    fn index_of(&self, value: &T) -> Result<Option<usize>> {
        LinkedSequence::index_of(self, value)
    }

    fn last_index_of(&self, value: &T) -> Result<Option<usize>> {
        LinkedSequence::last_index_of(self, value)
    }
}

impl<T: PartialEq> Membership<T> for LinkedSequence<T> {
    fn is_member(&self, value: &T) -> Result<bool> {
        self.inner.read(|s| s.index_of(value).is_some())
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Node-walking, bidirectional, fail-fast iterator over a chain.
///
/// Each step checks the captured version before touching a node, then
/// follows one link. `remove`, `set` and `add` act on the chain and
/// resynchronize the captured version.
#[derive(Debug)]
pub struct ChainIter<T> {
    source: ChainCell<T>,
    next: usize,
    next_index: usize,
    last: Option<usize>,
    expected: Version,
    failed: bool,
}

impl<T> ChainIter<T> {
    fn new(source: ChainCell<T>, index: usize) -> Result<Self> {
        let (next, expected) = source.read(|s| {
            check_position(index, s.len())?;
            let next = if index == s.len() {
                NIL
            } else {
                s.node_at(index)
            };
            Ok::<_, CollectionError>((next, s.version()))
        })??;
        Ok(Self {
            source,
            next,
            next_index: index,
            last: None,
            expected,
            failed: false,
        })
    }

    fn fail(&mut self, e: CollectionError) -> Option<Result<T>> {
        if self.failed {
            return None;
        }
        self.failed = true;
        Some(Err(e))
    }

    /// Returns `true` if a forward step would yield an element.
    pub fn has_next(&self) -> bool {
        !self.failed
            && self
                .source
                .read(|s| self.next_index < s.len())
                .unwrap_or(false)
    }

    /// Returns `true` if a backward step would yield an element.
    pub fn has_previous(&self) -> bool {
        !self.failed && self.next_index > 0
    }

    /// Index of the element a forward step would return.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Steps backward.
    pub fn previous(&mut self) -> Option<Result<T>>
    where
        T: Clone,
    {
        if self.failed || self.next_index == 0 {
            return None;
        }
        let (expected, next) = (self.expected, self.next);
        let step = self.source.read(|s| {
            expected.expect_live(s.version())?;
            let prev = if next == NIL { s.tail() } else { s.prev_of(next) };
            Ok::<_, CollectionError>((s.value(prev).clone(), prev))
        });
        match step.and_then(|r| r) {
            Ok((value, prev)) => {
                self.next = prev;
                self.last = Some(prev);
                self.next_index -= 1;
                Some(Ok(value))
            }
            Err(e) => self.fail(e),
        }
    }

    /// Removes the element last returned by `next` or `previous`.
    pub fn remove(&mut self) -> Result<()> {
        if self.failed {
            return Err(CollectionError::ConcurrentModification);
        }
        let last = self
            .last
            .ok_or(CollectionError::IllegalState("remove without next/previous"))?;
        let expected = self.expected;
        let (after, version) = self.source.write(|s| {
            expected.expect_live(s.version())?;
            let after = s.next_of(last);
            s.remove_key(last);
            Ok::<_, CollectionError>((after, s.version()))
        })??;
        if self.next == last {
            self.next = after;
        } else {
            self.next_index -= 1;
        }
        self.last = None;
        self.expected = version;
        Ok(())
    }

    /// Replaces the element last returned by `next` or `previous`.
    pub fn set(&mut self, value: T) -> Result<()> {
        if self.failed {
            return Err(CollectionError::ConcurrentModification);
        }
        let last = self
            .last
            .ok_or(CollectionError::IllegalState("set without next/previous"))?;
        let expected = self.expected;
        self.source.write(|s| {
            expected.expect_live(s.version())?;
            s.replace_key(last, value);
            Ok(())
        })?
    }

    /// Inserts before the element a forward step would return.
    pub fn add(&mut self, value: T) -> Result<()> {
        if self.failed {
            return Err(CollectionError::ConcurrentModification);
        }
        let (expected, next) = (self.expected, self.next);
        let version = self.source.write(|s| {
            expected.expect_live(s.version())?;
            s.insert_before(next, value);
            Ok::<_, CollectionError>(s.version())
        })??;
        self.last = None;
        self.next_index += 1;
        self.expected = version;
        Ok(())
    }
}

impl<T: Clone> Iterator for ChainIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (expected, next, index) = (self.expected, self.next, self.next_index);
        let step = self.source.read(|s| {
            expected.expect_live(s.version())?;
            if index >= s.len() {
                return Ok(None);
            }
            Ok::<_, CollectionError>(Some((s.value(next).clone(), s.next_of(next))))
        });
        match step.and_then(|r| r) {
            Ok(Some((value, after))) => {
                self.last = Some(next);
                self.next = after;
                self.next_index += 1;
                Some(Ok(value))
            }
            Ok(None) => None,
            Err(e) => self.fail(e),
        }
    }
}

/// Back-to-front fail-fast iterator over a chain.
#[derive(Debug)]
pub struct DescendingIter<T>(ChainIter<T>);

impl<T> DescendingIter<T> {
    /// Removes the element last returned.
    pub fn remove(&mut self) -> Result<()> {
        self.0.remove()
    }
}

impl<T: Clone> Iterator for DescendingIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.previous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(values: &[i32]) -> LinkedSequence<i32> {
        values.iter().copied().collect()
    }

    fn check_links<T>(storage: &ChainStorage<T>) {
        if storage.head != NIL {
            assert_eq!(storage.nodes[storage.head].prev, NIL);
        }
        if storage.tail != NIL {
            assert_eq!(storage.nodes[storage.tail].next, NIL);
        }
        let forward = storage.keys().count();
        assert_eq!(forward, storage.len());
        let mut backward = 0;
        let mut key = storage.tail;
        while key != NIL {
            backward += 1;
            key = storage.nodes[key].prev;
        }
        assert_eq!(backward, storage.len());
    }

    #[test]
    fn push_pop_scenario() {
        let c = LinkedSequence::new();
        c.push_front(1).unwrap();
        c.push_back(2).unwrap();
        c.push_front(0).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![0, 1, 2]);
        assert_eq!(c.pop_back().unwrap(), Some(2));
        assert_eq!(c.to_vec().unwrap(), vec![0, 1]);
        check_links(&c.inner.borrow());
    }

    #[test]
    fn empty_indicator_vs_error() {
        let c: LinkedSequence<i32> = LinkedSequence::new();
        assert_eq!(c.peek_first().unwrap(), None);
        assert_eq!(c.peek_last().unwrap(), None);
        assert_eq!(c.poll_first().unwrap(), None);
        assert_eq!(c.pop_back().unwrap(), None);
        assert!(matches!(c.remove_first(), Err(CollectionError::Empty)));
        assert!(matches!(c.remove_last(), Err(CollectionError::Empty)));
        assert!(matches!(c.first(), Err(CollectionError::Empty)));
        assert!(matches!(c.element(), Err(CollectionError::Empty)));
        assert!(matches!(c.pop(), Err(CollectionError::Empty)));
    }

    #[test]
    fn stack_and_queue_share_chain() {
        let c = LinkedSequence::new();
        c.push(1).unwrap();
        c.push(2).unwrap();
        assert_eq!(c.pop().unwrap(), 2);
        c.offer(3).unwrap();
        c.offer(4).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![1, 3, 4]);
        assert_eq!(c.poll().unwrap(), Some(1));
        assert_eq!(c.peek().unwrap(), Some(3));
        assert_eq!(c.element().unwrap(), 3);
    }

    #[test]
    fn remove_node_by_key() {
        let c = LinkedSequence::new();
        let a = c.push_back(1).unwrap();
        let b = c.push_back(2).unwrap();
        let d = c.push_back(3).unwrap();
        assert_eq!(c.remove_node(b).unwrap(), 2);
        assert_eq!(c.to_vec().unwrap(), vec![1, 3]);
        assert!(c.remove_node(b).is_err());
        assert_eq!(c.get_node(d).unwrap(), Some(3));
        c.remove_node(a).unwrap();
        c.remove_node(d).unwrap();
        assert!(c.is_empty().unwrap());
        check_links(&c.inner.borrow());
    }

    #[test]
    fn removed_node_key_is_reused() {
        let c = LinkedSequence::new();
        let stale = c.push_back(1).unwrap();
        c.remove_node(stale).unwrap();
        let fresh = c.push_back(2).unwrap();
        // Same slot: the stale key now names the new node
        assert_eq!(stale, fresh);
        assert_eq!(c.get_node(stale).unwrap(), Some(2));
    }

    #[test]
    fn reads_from_retain_predicate_report_concurrent_modification() {
        let c = chain(&[0, 1, 2, 3]);
        let other = c.share();
        let err = c
            .retain_checked(|v| Ok(other.contains(v)? && *v > 1))
            .unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(c.to_vec().unwrap(), vec![0, 1, 2, 3]);
        check_links(&c.inner.borrow());
    }

    #[test]
    fn positional_walks_from_either_end() {
        let c = chain(&[0, 1, 2, 3, 4, 5, 6]);
        for i in 0..7 {
            assert_eq!(c.get(i).unwrap(), i as i32);
        }
        assert!(c.get(7).is_err());
        c.insert(3, 30).unwrap();
        c.insert(8, 80).unwrap();
        c.insert(0, -1).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![-1, 0, 1, 2, 30, 3, 4, 5, 6, 80]);
        assert_eq!(c.remove_at(4).unwrap(), 30);
        assert!(c.insert(11, 0).is_err());
        check_links(&c.inner.borrow());
    }

    #[test]
    fn remove_range_and_insert_all() {
        let c = chain(&[0, 1, 2, 3, 4, 5]);
        c.remove_range(1, 4).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![0, 4, 5]);
        c.insert_all(1, [1, 2, 3]).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        c.add_all([6]).unwrap();
        assert_eq!(c.len().unwrap(), 7);
        check_links(&c.inner.borrow());
    }

    #[test]
    fn occurrences() {
        let c = chain(&[1, 2, 1, 2]);
        assert_eq!(c.index_of(&2).unwrap(), Some(1));
        assert_eq!(c.last_index_of(&2).unwrap(), Some(3));
        assert!(c.remove_last_occurrence(&1).unwrap());
        assert_eq!(c.to_vec().unwrap(), vec![1, 2, 2]);
        assert!(c.remove_first_occurrence(&2).unwrap());
        assert_eq!(c.to_vec().unwrap(), vec![1, 2]);
        assert!(!c.remove(&9).unwrap());
    }

    #[test]
    fn sort_relinks_and_bumps_once() {
        let c = chain(&[3, 1, 2]);
        let v = c.version().unwrap();
        c.sort().unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![1, 2, 3]);
        assert_eq!(c.version().unwrap().get(), v.get() + 1);
        check_links(&c.inner.borrow());
    }

    #[test]
    fn bulk_removal() {
        let c = chain(&[1, 2, 3, 4, 5, 6]);
        assert!(c.remove_if(|v| v % 2 == 0).unwrap());
        assert_eq!(c.to_vec().unwrap(), vec![1, 3, 5]);
        assert!(c.remove_all(&vec![3]).unwrap());
        assert!(c.retain_all(&vec![5]).unwrap());
        assert_eq!(c.to_vec().unwrap(), vec![5]);
        let err = c.remove_all(&c).unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[test]
    fn iterator_remove_and_add() {
        let c = chain(&[1, 2, 3]);
        let mut it = c.iter().unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 1);
        it.remove().unwrap();
        assert!(matches!(it.remove(), Err(CollectionError::IllegalState(_))));
        assert_eq!(it.next().unwrap().unwrap(), 2);
        it.add(25).unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 3);
        assert!(it.next().is_none());
        assert_eq!(c.to_vec().unwrap(), vec![2, 25, 3]);
        check_links(&c.inner.borrow());
    }

    #[test]
    fn iterator_backward_remove() {
        let c = chain(&[1, 2, 3]);
        let mut it = c.list_iter(3).unwrap();
        assert_eq!(it.previous().unwrap().unwrap(), 3);
        assert_eq!(it.previous().unwrap().unwrap(), 2);
        it.remove().unwrap();
        assert_eq!(it.next_index(), 1);
        assert_eq!(it.previous().unwrap().unwrap(), 1);
        assert!(it.previous().is_none());
        it.set(10).unwrap();
        assert_eq!(c.to_vec().unwrap(), vec![10, 3]);
    }

    #[test]
    fn descending() {
        let c = chain(&[1, 2, 3]);
        let items: Vec<i32> = c.descending_iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(items, vec![3, 2, 1]);
    }

    #[test]
    fn fail_fast_through_other_handle() {
        let c = chain(&[1, 2, 3]);
        let other = c.share();
        let mut it = c.iter().unwrap();
        assert_eq!(it.next().unwrap().unwrap(), 1);
        other.push_back(4).unwrap();
        assert!(it.next().unwrap().unwrap_err().is_concurrent_modification());
        assert!(it.next().is_none());
    }

    #[test]
    fn clone_is_deep() {
        let c = chain(&[1, 2]);
        let copy = c.try_clone().unwrap();
        c.push_back(3).unwrap();
        assert_eq!(copy.to_vec().unwrap(), vec![1, 2]);
        check_links(&copy.inner.borrow());
    }
}
