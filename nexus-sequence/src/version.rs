//! Structural-modification counter.
//!
//! Every container embeds a [`Version`]. Operations that change the element
//! count or the element order bump it; replacing a value in place does not.
//! Iterators, views and cursors capture the version and compare it by value
//! on each step.

use crate::{CollectionError, Result};

/// Per-container structural-modification counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(u64);

impl Version {
    /// Creates a counter at zero.
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw counter value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Records one structural modification.
    #[inline]
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Records `n` structural modifications at once.
    #[inline]
    pub fn bump_by(&mut self, n: usize) {
        self.0 = self.0.wrapping_add(n as u64);
    }

    /// Fails with [`CollectionError::ConcurrentModification`] unless `live`
    /// equals this captured value.
    #[inline]
    pub fn expect_live(self, live: Version) -> Result<()> {
        if self == live {
            Ok(())
        } else {
            Err(CollectionError::ConcurrentModification)
        }
    }
}
