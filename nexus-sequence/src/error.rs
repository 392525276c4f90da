//! Error types shared by every container.

use thiserror::Error;

/// Errors surfaced by container, view, iterator and cursor operations.
///
/// Errors are raised immediately; nothing is retried internally. With one
/// documented exception (the bulk membership removals, see
/// [`GrowableArray::retain_checked`](crate::GrowableArray::retain_checked))
/// an operation that fails leaves its container untouched.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Index outside the valid range for the operation.
    ///
    /// Access requires `index < len`, insertion requires `index <= len`.
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds {
        /// The rejected index.
        index: usize,
        /// Length the index was checked against.
        len: usize,
    },

    /// Removal or required-element access on an empty container.
    #[error("collection is empty")]
    Empty,

    /// The container was structurally modified behind a traversal or view.
    #[error("collection was structurally modified during traversal")]
    ConcurrentModification,

    /// Requested capacity exceeds the maximum representable element count.
    #[error("requested capacity {requested} exceeds maximum {max}")]
    CapacityExceeded {
        /// Capacity that was asked for.
        requested: usize,
        /// Largest supported capacity.
        max: usize,
    },

    /// Malformed constructor or range argument.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Iterator mutation without a preceding `next`/`previous`.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// The parent of a view or weak cursor has been dropped.
    #[error("parent collection has been dropped")]
    Detached,

    /// I/O failure while reading or writing the persisted form.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Element encoding or decoding failure.
    #[error("element codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Persisted form failed validation.
    #[error("corrupt persisted form: {0}")]
    Corrupt(String),
}

impl CollectionError {
    /// Shorthand for an [`OutOfBounds`](Self::OutOfBounds) error.
    #[inline]
    pub(crate) fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::OutOfBounds { index, len }
    }

    /// Returns `true` for [`ConcurrentModification`](Self::ConcurrentModification).
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = CollectionError> = core::result::Result<T, E>;

/// Validates an access index (`index < len`).
#[inline]
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(CollectionError::out_of_bounds(index, len))
    }
}

/// Validates an insertion index (`index <= len`).
#[inline]
pub(crate) fn check_position(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(CollectionError::out_of_bounds(index, len))
    }
}

/// Validates a half-open range `[from, to)` against `len`.
pub(crate) fn check_range(from: usize, to: usize, len: usize) -> Result<()> {
    if from > to {
        return Err(CollectionError::IllegalArgument(format!(
            "from ({from}) > to ({to})"
        )));
    }
    if to > len {
        return Err(CollectionError::out_of_bounds(to, len));
    }
    Ok(())
}
