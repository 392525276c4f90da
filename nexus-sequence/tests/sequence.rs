use nexus_sequence::{
    CollectionError, GrowableArray, HashedSet, LinkedSequence, OrderedSet, Sequence, SyncArray,
};
use proptest::prelude::*;

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn array_add_insert_remove() {
    let array: GrowableArray<u32> = GrowableArray::new();
    array.add(5).unwrap();
    array.add(10).unwrap();
    array.insert(1, 7).unwrap();
    assert_eq!(array.remove_at(0).unwrap(), 5);
    assert_eq!(array.to_vec().unwrap(), vec![7, 10]);
}

#[test]
fn chain_push_both_ends_then_pop_back() {
    let chain: LinkedSequence<u32> = LinkedSequence::new();
    chain.push_front(1).unwrap();
    chain.push_back(2).unwrap();
    chain.push_front(0).unwrap();
    assert_eq!(chain.to_vec().unwrap(), vec![0, 1, 2]);

    assert_eq!(chain.pop_back().unwrap(), Some(2));
    assert_eq!(chain.to_vec().unwrap(), vec![0, 1]);
}

// =============================================================================
// Boundaries
// =============================================================================

fn check_boundaries<S: Sequence<u32>>(seq: &S) {
    for v in [1, 2, 3] {
        seq.insert(seq.len().unwrap(), v).unwrap();
    }
    let len = seq.len().unwrap();

    assert!(matches!(
        seq.get(len),
        Err(CollectionError::OutOfBounds { index: 3, len: 3 })
    ));
    assert!(matches!(
        seq.get(usize::MAX),
        Err(CollectionError::OutOfBounds { .. })
    ));

    seq.insert(len, 4).unwrap();
    assert_eq!(seq.to_vec().unwrap(), vec![1, 2, 3, 4]);

    let len = seq.len().unwrap();
    assert!(matches!(
        seq.insert(len + 1, 5),
        Err(CollectionError::OutOfBounds { .. })
    ));
    assert_eq!(seq.len().unwrap(), 4);
}

#[test]
fn boundaries_array() {
    check_boundaries(&GrowableArray::<u32>::new());
}

#[test]
fn boundaries_chain() {
    check_boundaries(&LinkedSequence::<u32>::new());
}

#[test]
fn boundaries_sync() {
    check_boundaries(&SyncArray::<u32>::new());
}

// =============================================================================
// Fail-fast
// =============================================================================

#[test]
fn array_iterator_fails_after_mutation_through_other_handle() {
    let array: GrowableArray<u32> = (0..4).collect();
    let other = array.share();

    let mut iter = array.iter().unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), 0);
    other.add(4).unwrap();

    let err = iter.next().unwrap().unwrap_err();
    assert!(err.is_concurrent_modification());
    // Reported once, then exhausted
    assert!(iter.next().is_none());
}

#[test]
fn chain_iterator_fails_after_mutation_through_other_handle() {
    let chain: LinkedSequence<u32> = (0..4).collect();
    let other = chain.share();

    let mut iter = chain.iter().unwrap();
    iter.next().unwrap().unwrap();
    other.remove_at(3).unwrap();

    assert!(iter.next().unwrap().unwrap_err().is_concurrent_modification());
}

#[test]
fn set_replacement_does_not_trip_iterator() {
    let array: GrowableArray<u32> = (0..4).collect();
    let other = array.share();

    let mut iter = array.iter().unwrap();
    iter.next().unwrap().unwrap();
    other.set(3, 30).unwrap();

    let rest: Vec<u32> = iter.map(|r| r.unwrap()).collect();
    assert_eq!(rest, vec![1, 2, 30]);
}

#[test]
fn hashed_set_iterator_fails_after_add() {
    let set: HashedSet<u32> = (0..8).collect();
    let other = set.share();

    let mut iter = set.iter().unwrap();
    iter.next().unwrap().unwrap();
    other.add(100).unwrap();

    assert!(iter.next().unwrap().unwrap_err().is_concurrent_modification());
}

#[test]
fn ordered_set_iterator_fails_after_remove() {
    let set: OrderedSet<u32> = (0..8).collect();
    let other = set.share();

    let mut iter = set.iter().unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), 0);
    other.remove(&7).unwrap();

    assert!(iter.next().unwrap().unwrap_err().is_concurrent_modification());
}

#[test]
fn iterator_remove_keeps_iterating() {
    let chain: LinkedSequence<u32> = (0..6).collect();
    let mut iter = chain.iter().unwrap();
    while let Some(value) = iter.next() {
        if value.unwrap() % 2 == 0 {
            iter.remove().unwrap();
        }
    }
    assert_eq!(chain.to_vec().unwrap(), vec![1, 3, 5]);
}

// =============================================================================
// Views
// =============================================================================

#[test]
fn view_removal_slides_window() {
    let array: GrowableArray<u32> = [10, 20, 30, 40].into_iter().collect();
    let view = array.sub_range(1, 3).unwrap();
    assert_eq!(view.to_vec().unwrap(), vec![20, 30]);

    assert_eq!(view.remove_at(0).unwrap(), 20);
    assert_eq!(array.to_vec().unwrap(), vec![10, 30, 40]);
    assert_eq!(view.to_vec().unwrap(), vec![30, 40]);
}

#[test]
fn chain_view_removal_slides_window() {
    let chain: LinkedSequence<u32> = [10, 20, 30, 40].into_iter().collect();
    let view = chain.sub_range(1, 3).unwrap();

    view.remove_at(0).unwrap();
    assert_eq!(chain.to_vec().unwrap(), vec![10, 30, 40]);
    assert_eq!(view.to_vec().unwrap(), vec![30, 40]);
}

#[test]
fn view_insert_grows_window() {
    let array: GrowableArray<u32> = [10, 20, 30, 40].into_iter().collect();
    let view = array.sub_range(1, 3).unwrap();

    view.add(35).unwrap();
    assert_eq!(view.to_vec().unwrap(), vec![20, 30, 35]);
    assert_eq!(array.to_vec().unwrap(), vec![10, 20, 30, 35, 40]);
}

#[test]
fn view_goes_stale_after_root_mutation() {
    let array: GrowableArray<u32> = (0..5).collect();
    let view = array.sub_range(1, 4).unwrap();
    array.remove_at(0).unwrap();

    assert!(matches!(view.len(), Err(CollectionError::ConcurrentModification)));
    assert!(matches!(view.get(0), Err(CollectionError::ConcurrentModification)));
}

#[test]
fn view_detaches_when_root_dropped() {
    let array: GrowableArray<u32> = (0..5).collect();
    let view = array.sub_range(0, 2).unwrap();
    drop(array);

    assert!(matches!(view.len(), Err(CollectionError::Detached)));
}

#[test]
fn view_bounds() {
    let array: GrowableArray<u32> = (0..5).collect();
    assert!(matches!(
        array.sub_range(3, 2),
        Err(CollectionError::IllegalArgument(_)) | Err(CollectionError::OutOfBounds { .. })
    ));
    assert!(array.sub_range(0, 6).is_err());

    let view = array.sub_range(1, 4).unwrap();
    assert!(matches!(view.get(3), Err(CollectionError::OutOfBounds { .. })));
}

// =============================================================================
// Clear
// =============================================================================

#[test]
fn clear_is_idempotent() {
    let array: GrowableArray<u32> = GrowableArray::new();
    array.clear().unwrap();
    assert_eq!(array.len().unwrap(), 0);
    array.clear().unwrap();
    assert_eq!(array.len().unwrap(), 0);

    let chain: LinkedSequence<u32> = (0..3).collect();
    chain.clear().unwrap();
    chain.clear().unwrap();
    assert!(chain.is_empty().unwrap());

    let hashed: HashedSet<u32> = (0..3).collect();
    hashed.clear().unwrap();
    hashed.clear().unwrap();
    assert!(hashed.is_empty().unwrap());

    let ordered: OrderedSet<u32> = (0..3).collect();
    ordered.clear().unwrap();
    ordered.clear().unwrap();
    assert!(ordered.is_empty().unwrap());
}

// =============================================================================
// Partial compaction
// =============================================================================

#[test]
fn retain_checked_keeps_removals_before_failure() {
    let array: GrowableArray<u32> = (0..6).collect();
    let result = array.retain_checked(|&v| {
        if v == 4 {
            Err(CollectionError::IllegalState("predicate failed"))
        } else {
            Ok(v % 2 == 1)
        }
    });

    assert!(matches!(result, Err(CollectionError::IllegalState(_))));
    // 0 and 2 were already dropped; 4 and 5 are untouched
    assert_eq!(array.to_vec().unwrap(), vec![1, 3, 4, 5]);
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(u16),
    Insert(usize, u16),
    RemoveAt(usize),
    Remove(u16),
    RemoveRange(usize, usize),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u16>().prop_map(Op::Add),
        3 => (any::<usize>(), any::<u16>()).prop_map(|(i, v)| Op::Insert(i, v)),
        3 => any::<usize>().prop_map(Op::RemoveAt),
        1 => (0u16..64).prop_map(Op::Remove),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::RemoveRange(a, b)),
        1 => Just(Op::Clear),
    ]
}

/// Applies `op` with indices reduced into range, so both sides see the
/// same valid operation.
fn apply<S: Sequence<u16>>(seq: &S, op: &Op) {
    let len = seq.len().unwrap();
    match *op {
        Op::Add(v) => {
            seq.add(v).unwrap();
        }
        Op::Insert(i, v) => seq.insert(i % (len + 1), v).unwrap(),
        Op::RemoveAt(i) => {
            if len > 0 {
                seq.remove_at(i % len).unwrap();
            }
        }
        Op::Remove(v) => {
            seq.remove(&v).unwrap();
        }
        Op::RemoveRange(..) | Op::Clear => {}
    }
}

proptest! {
    #[test]
    fn array_and_chain_replay_identically(ops in proptest::collection::vec(op(), 0..200)) {
        let array: GrowableArray<u16> = GrowableArray::new();
        let chain: LinkedSequence<u16> = LinkedSequence::new();
        for op in &ops {
            match *op {
                Op::RemoveRange(a, b) => {
                    let len = array.len().unwrap();
                    let (a, b) = (a % (len + 1), b % (len + 1));
                    let (from, to) = (a.min(b), a.max(b));
                    array.remove_range(from, to).unwrap();
                    chain.remove_range(from, to).unwrap();
                }
                Op::Clear => {
                    array.clear().unwrap();
                    chain.clear().unwrap();
                }
                _ => {
                    apply(&array, op);
                    apply(&chain, op);
                }
            }
            prop_assert_eq!(array.len().unwrap(), chain.len().unwrap());
            prop_assert_eq!(array.to_vec().unwrap(), chain.to_vec().unwrap());
        }
    }

    #[test]
    fn capacity_covers_len_and_only_trim_shrinks(ops in proptest::collection::vec(op(), 0..200)) {
        let array: GrowableArray<u16> = GrowableArray::new();
        let mut last = array.capacity().unwrap();
        for op in &ops {
            match *op {
                Op::RemoveRange(..) => {
                    array.trim_to_size().unwrap();
                    let capacity = array.capacity().unwrap();
                    prop_assert_eq!(capacity, array.len().unwrap());
                    last = capacity;
                    continue;
                }
                Op::Clear => array.clear().unwrap(),
                _ => apply(&array, op),
            }
            let capacity = array.capacity().unwrap();
            prop_assert!(capacity >= array.len().unwrap());
            prop_assert!(capacity >= last);
            last = capacity;
        }
    }

    #[test]
    fn ordered_set_matches_btree(values in proptest::collection::vec(0u16..512, 0..300)) {
        let set: OrderedSet<u16> = OrderedSet::new();
        let mut reference = std::collections::BTreeSet::new();
        for (i, v) in values.iter().enumerate() {
            if i % 3 == 2 {
                prop_assert_eq!(set.remove(v).unwrap(), reference.remove(v));
            } else {
                prop_assert_eq!(set.add(*v).unwrap(), reference.insert(*v));
            }
        }
        prop_assert_eq!(set.to_vec().unwrap(), reference.into_iter().collect::<Vec<_>>());
    }
}
