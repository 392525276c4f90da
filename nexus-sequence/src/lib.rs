//! Sequential collections with fail-fast traversal, live sub-range views and
//! splittable cursors.
//!
//! Every container separates its storage from its handle:
//!
//! ```text
//! Storage (ArrayStorage, ChainStorage, ...)  - owns elements and the version
//! Handle  (GrowableArray, LinkedSequence, ...) - shares the storage cell
//! ```
//!
//! Handles take `&self` and reach the storage through a cell, so a second
//! handle ([`share`](GrowableArray::share)), a view, an iterator and a cursor
//! can all observe the same storage. Every structural modification bumps a
//! [`Version`]; iterators, views and cursors capture it and fail with
//! [`CollectionError::ConcurrentModification`] once it moves under them.
//!
//! # Quick Start
//!
//! ```
//! use nexus_sequence::{CollectionError, GrowableArray};
//!
//! let array: GrowableArray<u32> = [10, 20, 30, 40].into_iter().collect();
//!
//! // A live window over [1, 3)
//! let view = array.sub_range(1, 3).unwrap();
//! view.remove_at(0).unwrap();
//! assert_eq!(array.to_vec().unwrap(), vec![10, 30, 40]);
//! assert_eq!(view.to_vec().unwrap(), vec![30, 40]);
//!
//! // Mutating the root directly leaves the view stale
//! array.add(50).unwrap();
//! assert!(matches!(view.len(), Err(CollectionError::ConcurrentModification)));
//! ```
//!
//! # Fail-fast traversal
//!
//! ```
//! use nexus_sequence::LinkedSequence;
//!
//! let chain: LinkedSequence<u32> = (0..3).collect();
//! let other = chain.share();
//!
//! let mut iter = chain.iter().unwrap();
//! assert_eq!(iter.next().unwrap().unwrap(), 0);
//! other.push_back(3).unwrap();
//! assert!(iter.next().unwrap().unwrap_err().is_concurrent_modification());
//! ```
//!
//! # Containers
//!
//! | Container | Storage | Order | Key operations |
//! |-----------|---------|-------|----------------|
//! | [`GrowableArray`] | contiguous | insertion | O(1) get/set, amortized O(1) append |
//! | [`LinkedSequence`] | slab node chain | insertion | O(1) end and node-key operations |
//! | [`HashedSet`] | hash map | none | O(1) add/remove/contains |
//! | [`OrderedSet`] | skip list | comparator | O(log n) add/remove, navigation, range views |
//! | [`SyncArray`] | contiguous, locked | insertion | per-call locking, `Send + Sync` |
//! | [`Stack`] | over `SyncArray` | LIFO | push/pop/peek/search |
//!
//! # Traversal
//!
//! | Type | Source | Notes |
//! |------|--------|-------|
//! | [`Iter`] | arrays, views | index-based, bidirectional, `remove`/`set`/`add` |
//! | [`ChainIter`] | linked sequence | node-walking, bidirectional, `remove`/`set`/`add` |
//! | [`SetIter`] | sets | snapshot-based, `remove` |
//! | [`Partition`] cursors | all | late-binding, recursively splittable |
//!
//! # Persisted form
//!
//! Every container implements [`Persist`]: a big-endian header, an `i32`
//! count, then the elements in iteration order encoded with `bincode`.

#![warn(missing_docs)]

pub mod array;
pub mod chain;
pub mod collection;
pub mod cursor;
pub mod error;
pub mod hashed;
pub mod iter;
pub mod ordered;
pub mod persist;
pub mod positional;
pub mod set;
pub mod storage;
pub mod sync;
pub mod version;
pub mod view;

pub use array::{ArrayCell, ArrayStorage, DEFAULT_CAPACITY, GrowableArray, Growth, MAX_ARRAY_LENGTH};
pub use chain::{ChainCell, ChainIter, ChainStorage, DescendingIter, LinkedSequence, NodeKey};
pub use collection::{Collection, Membership, Sequence};
pub use cursor::{BATCH_UNIT, BufferCursor, ChainCursor, IndexCursor, MAX_BATCH, Partition, SnapshotCursor};
pub use error::{CollectionError, Result};
pub use hashed::{DEFAULT_LOAD_FACTOR, HashedSet, HashedStorage, MAXIMUM_CAPACITY};
pub use iter::Iter;
pub use ordered::comparator::{ByKey, Comparator, Natural, Reverse};
pub use ordered::skiplist::SkipMap;
pub use ordered::{OrderedRange, OrderedSet, OrderedStorage};
pub use persist::Persist;
pub use positional::Positional;
pub use set::{SetIter, SetStorage};
pub use storage::{LocalCell, SequenceStorage, Shared, SyncCell};
pub use sync::{Stack, SyncArray, SyncArrayCell};
pub use version::Version;
