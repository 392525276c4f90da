//! Comparator-driven skip list map.
//!
//! O(log n) expected insert, lookup and removal with no rebalancing. Nodes
//! live in a [`Slab`] and link by key; [`NIL`] ends a lane.
//!
//! ```text
//! Level 2:  HEAD ─────────────────────► 50 ──────────► NIL
//!             │                          │
//! Level 1:  HEAD ────────► 20 ──────────► 50 ──────────► NIL
//!             │            │              │
//! Level 0:  HEAD ──► 10 ──► 20 ──► 30 ──► 50 ──► 60 ──► NIL
//!                    ◄──────◄──────◄──────◄──────◄ back
//! ```
//!
//! Level 0 is doubly linked through `back`, so descending traversal and
//! `last` are O(1) per step.

use std::cmp::Ordering;
use std::ops::Bound;

use rand::rngs::SmallRng;
use rand_core::RngCore;
use slab::Slab;

use super::comparator::Comparator;

const NIL: usize = usize::MAX;

/// Node: key, value, forward lanes and the level-0 back link.
#[derive(Debug, Clone)]
struct SkipNode<K, V, const MAX_LEVEL: usize> {
    key: K,
    value: V,
    forward: [usize; MAX_LEVEL],
    back: usize,
    /// Participates in lanes `0..=level`.
    level: u8,
}

/// Sorted map ordered by a [`Comparator`].
///
/// Keys equal under the comparator are the same key; inserting one keeps
/// the stored key and replaces the value.
#[derive(Debug, Clone)]
pub struct SkipMap<K, V, C, const MAX_LEVEL: usize = 24> {
    nodes: Slab<SkipNode<K, V, MAX_LEVEL>>,
    head: [usize; MAX_LEVEL],
    tail: usize,
    /// Highest lane in use.
    level: usize,
    /// log2 of the level ratio.
    level_divisor: u8,
    rng: SmallRng,
    comparator: C,
}

impl<K, V, C, const MAX_LEVEL: usize> SkipMap<K, V, C, MAX_LEVEL>
where
    C: Comparator<K>,
{
    /// Empty map with level ratio 2 (p = 0.5).
    pub fn new(comparator: C, rng: SmallRng) -> Self {
        Self::with_level_ratio(comparator, rng, 2)
    }

    /// Empty map with a custom level ratio.
    ///
    /// Higher ratios build fewer lanes: 2 is standard, 4 is Redis-style.
    /// Values are rounded up to a power of two, minimum 2.
    pub fn with_level_ratio(comparator: C, rng: SmallRng, level_ratio: u32) -> Self {
        let level_ratio = level_ratio.max(2).next_power_of_two();
        Self {
            nodes: Slab::new(),
            head: [NIL; MAX_LEVEL],
            tail: NIL,
            level: 0,
            level_divisor: level_ratio.trailing_zeros() as u8,
            rng,
            comparator,
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The ordering in use.
    #[inline]
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Level ratio in use.
    pub fn level_ratio(&self) -> u32 {
        1 << self.level_divisor
    }

    /// Compares two keys with the map's ordering.
    #[inline]
    pub fn compare(&self, a: &K, b: &K) -> Ordering {
        self.comparator.compare(a, b)
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Entry for `key`.
    pub fn get(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(self.find(key))
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key) != NIL
    }

    /// Smallest entry.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.entry(self.head[0])
    }

    /// Largest entry.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entry(self.tail)
    }

    /// Greatest entry strictly below `key`.
    pub fn lower(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(self.last_before(key, false))
    }

    /// Greatest entry at or below `key`.
    pub fn floor(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(self.last_before(key, true))
    }

    /// Least entry at or above `key`.
    pub fn ceiling(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(self.after(self.last_before(key, false)))
    }

    /// Least entry strictly above `key`.
    pub fn higher(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(self.after(self.last_before(key, true)))
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Inserts `key`; an existing equal key keeps its place and gets
    /// `value`, returning the old one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let mut update = [NIL; MAX_LEVEL];
        self.fill_update(&key, &mut update);
        let next = self.after(update[0]);
        if next != NIL && self.compare(&self.nodes[next].key, &key) == Ordering::Equal {
            return Some(std::mem::replace(&mut self.nodes[next].value, value));
        }

        let new_level = self.random_level();
        let idx = self.nodes.insert(SkipNode {
            key,
            value,
            forward: [NIL; MAX_LEVEL],
            back: NIL,
            level: new_level,
        });
        self.link_node(idx, new_level as usize, &update);
        None
    }

    /// Removes the entry for `key`.
    pub fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let idx = self.find(key);
        if idx == NIL {
            return None;
        }
        Some(self.unlink(idx))
    }

    /// Removes the smallest entry.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        (self.head[0] != NIL).then(|| self.unlink(self.head[0]))
    }

    /// Removes the largest entry.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        (self.tail != NIL).then(|| self.unlink(self.tail))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = [NIL; MAX_LEVEL];
        self.tail = NIL;
        self.level = 0;
    }

    /// Removes every entry for which `pred` returns `true`.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&K, &V) -> bool) -> usize {
        let mut removed = 0;
        let mut idx = self.head[0];
        while idx != NIL {
            let next = self.nodes[idx].forward[0];
            let node = &self.nodes[idx];
            if pred(&node.key, &node.value) {
                self.unlink(idx);
                removed += 1;
            }
            idx = next;
        }
        removed
    }

    // ------------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------------

    /// Entries in ascending order.
    pub fn iter(&self) -> Iter<'_, K, V, C, MAX_LEVEL> {
        Iter {
            map: self,
            current: self.head[0],
            descending: false,
        }
    }

    /// Entries in descending order.
    pub fn iter_rev(&self) -> Iter<'_, K, V, C, MAX_LEVEL> {
        Iter {
            map: self,
            current: self.tail,
            descending: true,
        }
    }

    /// Ascending entries between two bounds.
    pub fn range<'a>(&'a self, lo: Bound<&K>, hi: Bound<&'a K>) -> Range<'a, K, V, C, MAX_LEVEL> {
        let current = match lo {
            Bound::Included(k) => self.after(self.last_before(k, false)),
            Bound::Excluded(k) => self.after(self.last_before(k, true)),
            Bound::Unbounded => self.head[0],
        };
        Range {
            map: self,
            current,
            hi,
        }
    }

    // ------------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------------

    #[inline]
    fn entry(&self, idx: usize) -> Option<(&K, &V)> {
        self.nodes.get(idx).map(|n| (&n.key, &n.value))
    }

    #[inline]
    fn forward_of(&self, idx: usize, lane: usize) -> usize {
        if idx == NIL {
            self.head[lane]
        } else {
            self.nodes[idx].forward[lane]
        }
    }

    /// Successor on lane 0; the successor of `NIL` is the first node.
    #[inline]
    fn after(&self, idx: usize) -> usize {
        self.forward_of(idx, 0)
    }

    /// Last node whose key is below `key` (or equal, if `inclusive`).
    fn last_before(&self, key: &K, inclusive: bool) -> usize {
        let mut current = NIL;
        for lane in (0..=self.level).rev() {
            let mut next = self.forward_of(current, lane);
            while next != NIL {
                let ord = self.compare(&self.nodes[next].key, key);
                if ord == Ordering::Greater || (ord == Ordering::Equal && !inclusive) {
                    break;
                }
                current = next;
                next = self.nodes[next].forward[lane];
            }
        }
        current
    }

    fn find(&self, key: &K) -> usize {
        let idx = self.after(self.last_before(key, false));
        if idx != NIL && self.compare(&self.nodes[idx].key, key) == Ordering::Equal {
            idx
        } else {
            NIL
        }
    }

    /// Fills `update` with the strict predecessor of `key` on every lane.
    fn fill_update(&self, key: &K, update: &mut [usize; MAX_LEVEL]) {
        let mut current = NIL;
        for lane in (0..=self.level).rev() {
            let mut next = self.forward_of(current, lane);
            while next != NIL && self.compare(&self.nodes[next].key, key) == Ordering::Less {
                current = next;
                next = self.nodes[next].forward[lane];
            }
            update[lane] = current;
        }
    }

    /// Geometric level: trailing ones of a random word, scaled by the
    /// level ratio.
    #[inline]
    fn random_level(&mut self) -> u8 {
        let r = self.rng.next_u32();
        let level = (r.trailing_ones() as usize) / (self.level_divisor as usize);
        level.min(MAX_LEVEL - 1) as u8
    }

    fn link_node(&mut self, idx: usize, new_level: usize, update: &[usize; MAX_LEVEL]) {
        for lane in 0..=new_level {
            let next = self.forward_of(update[lane], lane);
            self.nodes[idx].forward[lane] = next;
            if update[lane] == NIL {
                self.head[lane] = idx;
            } else {
                self.nodes[update[lane]].forward[lane] = idx;
            }
        }

        self.nodes[idx].back = update[0];
        let next = self.nodes[idx].forward[0];
        if next == NIL {
            self.tail = idx;
        } else {
            self.nodes[next].back = idx;
        }

        if new_level > self.level {
            self.level = new_level;
        }
    }

    fn unlink(&mut self, idx: usize) -> (K, V) {
        let mut update = [NIL; MAX_LEVEL];
        self.fill_update(&self.nodes[idx].key, &mut update);

        let node_level = self.nodes[idx].level as usize;
        let forward = self.nodes[idx].forward;
        for lane in 0..=node_level {
            if update[lane] == NIL {
                self.head[lane] = forward[lane];
            } else {
                self.nodes[update[lane]].forward[lane] = forward[lane];
            }
        }

        let back = self.nodes[idx].back;
        if forward[0] == NIL {
            self.tail = back;
        } else {
            self.nodes[forward[0]].back = back;
        }

        while self.level > 0 && self.head[self.level] == NIL {
            self.level -= 1;
        }

        let node = self.nodes.remove(idx);
        (node.key, node.value)
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Entries in lane-0 order, either direction.
pub struct Iter<'a, K, V, C, const MAX_LEVEL: usize> {
    map: &'a SkipMap<K, V, C, MAX_LEVEL>,
    current: usize,
    descending: bool,
}

impl<'a, K, V, C, const MAX_LEVEL: usize> Iterator for Iter<'a, K, V, C, MAX_LEVEL> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.map.nodes.get(self.current)?;
        self.current = if self.descending {
            node.back
        } else {
            node.forward[0]
        };
        Some((&node.key, &node.value))
    }
}

/// Ascending entries up to an upper bound.
pub struct Range<'a, K, V, C, const MAX_LEVEL: usize> {
    map: &'a SkipMap<K, V, C, MAX_LEVEL>,
    current: usize,
    hi: Bound<&'a K>,
}

impl<'a, K, V, C, const MAX_LEVEL: usize> Iterator for Range<'a, K, V, C, MAX_LEVEL>
where
    C: Comparator<K>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.map.nodes.get(self.current)?;
        let within = match self.hi {
            Bound::Included(hi) => self.map.compare(&node.key, hi) != Ordering::Greater,
            Bound::Excluded(hi) => self.map.compare(&node.key, hi) == Ordering::Less,
            Bound::Unbounded => true,
        };
        if !within {
            self.current = NIL;
            return None;
        }
        self.current = node.forward[0];
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordered::comparator::{Natural, Reverse};
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn make_map() -> SkipMap<u64, u64, Natural> {
        SkipMap::new(Natural, SmallRng::seed_from_u64(12345))
    }

    fn check_invariants<K, V, C: Comparator<K>, const N: usize>(map: &SkipMap<K, V, C, N>) {
        // Lane 0 strictly ascending and back links mirror forward links.
        let mut prev = NIL;
        let mut idx = map.head[0];
        let mut count = 0;
        while idx != NIL {
            let node = &map.nodes[idx];
            assert_eq!(node.back, prev);
            if prev != NIL {
                assert_eq!(map.compare(&map.nodes[prev].key, &node.key), Ordering::Less);
            }
            prev = idx;
            idx = node.forward[0];
            count += 1;
        }
        assert_eq!(map.tail, prev);
        assert_eq!(count, map.len());
        for lane in map.level + 1..N {
            assert_eq!(map.head[lane], NIL);
        }
    }

    #[test]
    fn new_is_empty() {
        let map = make_map();
        assert!(map.is_empty());
        assert!(map.first().is_none());
        assert!(map.last().is_none());
    }

    #[test]
    fn insert_multiple_maintains_order() {
        let mut map = make_map();
        for k in [50, 10, 30, 20, 40] {
            assert_eq!(map.insert(k, k * 10), None);
        }
        let keys: Vec<u64> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![10, 20, 30, 40, 50]);
        let rev: Vec<u64> = map.iter_rev().map(|(k, _)| *k).collect();
        assert_eq!(rev, vec![50, 40, 30, 20, 10]);
        check_invariants(&map);
    }

    #[test]
    fn insert_existing_replaces_value() {
        let mut map = make_map();
        map.insert(1, 10);
        assert_eq!(map.insert(1, 11), Some(10));
        assert_eq!(map.get(&1), Some((&1, &11)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_updates_head_and_tail() {
        let mut map = make_map();
        for k in 1..=5 {
            map.insert(k, k);
        }
        assert_eq!(map.remove(&1), Some((1, 1)));
        assert_eq!(map.first(), Some((&2, &2)));
        assert_eq!(map.remove(&5), Some((5, 5)));
        assert_eq!(map.last(), Some((&4, &4)));
        assert_eq!(map.remove(&9), None);
        check_invariants(&map);
    }

    #[test]
    fn pop_both_ends() {
        let mut map = make_map();
        for k in 1..=4 {
            map.insert(k, k);
        }
        assert_eq!(map.pop_first(), Some((1, 1)));
        assert_eq!(map.pop_last(), Some((4, 4)));
        assert_eq!(map.pop_last(), Some((3, 3)));
        assert_eq!(map.pop_first(), Some((2, 2)));
        assert_eq!(map.pop_first(), None);
        check_invariants(&map);
    }

    #[test]
    fn navigation() {
        let mut map = make_map();
        for k in [10, 20, 30] {
            map.insert(k, 0);
        }
        assert_eq!(map.lower(&20).map(|e| *e.0), Some(10));
        assert_eq!(map.floor(&20).map(|e| *e.0), Some(20));
        assert_eq!(map.floor(&25).map(|e| *e.0), Some(20));
        assert_eq!(map.ceiling(&20).map(|e| *e.0), Some(20));
        assert_eq!(map.ceiling(&21).map(|e| *e.0), Some(30));
        assert_eq!(map.higher(&20).map(|e| *e.0), Some(30));
        assert_eq!(map.lower(&10), None);
        assert_eq!(map.higher(&30), None);
        assert_eq!(map.floor(&5), None);
        assert_eq!(map.ceiling(&31), None);
    }

    #[test]
    fn range_bounds() {
        let mut map = make_map();
        for k in 0..10 {
            map.insert(k, 0);
        }
        let keys = |lo, hi| map.range(lo, hi).map(|(k, _)| *k).collect::<Vec<_>>();
        assert_eq!(keys(Bound::Included(&3), Bound::Excluded(&6)), vec![3, 4, 5]);
        assert_eq!(keys(Bound::Excluded(&3), Bound::Included(&6)), vec![4, 5, 6]);
        assert_eq!(keys(Bound::Unbounded, Bound::Excluded(&2)), vec![0, 1]);
        assert_eq!(keys(Bound::Included(&8), Bound::Unbounded), vec![8, 9]);
        assert!(keys(Bound::Included(&6), Bound::Excluded(&3)).is_empty());
    }

    #[test]
    fn reverse_comparator() {
        let mut map: SkipMap<u64, (), Reverse> = SkipMap::new(Reverse, SmallRng::seed_from_u64(7));
        for k in [1, 3, 2] {
            map.insert(k, ());
        }
        let keys: Vec<u64> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![3, 2, 1]);
        assert_eq!(map.higher(&3).map(|e| *e.0), Some(2));
        check_invariants(&map);
    }

    #[test]
    fn level_ratio_rounded() {
        let map: SkipMap<u64, u64, Natural> =
            SkipMap::with_level_ratio(Natural, SmallRng::seed_from_u64(1), 3);
        assert_eq!(map.level_ratio(), 4);
        assert_eq!(make_map().level_ratio(), 2);
    }

    #[test]
    fn remove_where_sweep() {
        let mut map = make_map();
        for k in 0..100 {
            map.insert(k, k);
        }
        assert_eq!(map.remove_where(|k, _| k % 2 == 0), 50);
        assert!(map.iter().all(|(k, _)| k % 2 == 1));
        check_invariants(&map);
    }

    #[test]
    fn stress_random_operations() {
        let mut map = make_map();
        let mut reference = BTreeMap::new();
        let mut rng = SmallRng::seed_from_u64(99);
        for _ in 0..5_000 {
            let key = rng.gen_range(0..500u64);
            match rng.gen_range(0..4) {
                0 | 1 => assert_eq!(map.insert(key, key), reference.insert(key, key)),
                2 => assert_eq!(
                    map.remove(&key).map(|(_, v)| v),
                    reference.remove(&key)
                ),
                _ => assert_eq!(map.pop_last(), reference.pop_last()),
            }
        }
        check_invariants(&map);
        let keys: Vec<u64> = map.iter().map(|(k, _)| *k).collect();
        let expected: Vec<u64> = reference.keys().copied().collect();
        assert_eq!(keys, expected);
    }
}
