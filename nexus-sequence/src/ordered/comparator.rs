//! Total-order comparators.
//!
//! A comparator carries a stable [`descriptor`](Comparator::descriptor)
//! naming the order it imposes. The persisted form of an ordered set records
//! it, and decoding refuses a set written under a different order.

use std::cmp::Ordering;
use std::fmt;

/// A total order over `T`.
pub trait Comparator<T: ?Sized> {
    /// Compares two values.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Stable name of this order.
    fn descriptor(&self) -> &str;
}

/// Natural order (`Ord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Natural;

impl<T: Ord + ?Sized> Comparator<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }

    fn descriptor(&self) -> &str {
        "natural"
    }
}

/// Reverse of the natural order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reverse;

impl<T: Ord + ?Sized> Comparator<T> for Reverse {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        b.cmp(a)
    }

    fn descriptor(&self) -> &str {
        "reverse"
    }
}

/// Orders by a key extracted from each value.
///
/// ```
/// use nexus_sequence::{ByKey, Comparator};
///
/// let by_len = ByKey::new("len", |s: &&str| s.len());
/// assert!(by_len.compare(&"ab", &"abc").is_lt());
/// assert_eq!(by_len.descriptor(), "len");
/// ```
#[derive(Clone)]
pub struct ByKey<F> {
    name: String,
    key: F,
}

impl<F> ByKey<F> {
    /// Comparator named `name` ordering by `key`.
    pub fn new(name: impl Into<String>, key: F) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

impl<F> fmt::Debug for ByKey<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByKey").field("name", &self.name).finish()
    }
}

impl<T, K, F> Comparator<T> for ByKey<F>
where
    F: Fn(&T) -> K,
    K: Ord,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.key)(a).cmp(&(self.key)(b))
    }

    fn descriptor(&self) -> &str {
        &self.name
    }
}
