//! Persisted form.
//!
//! Every container encodes as a big-endian header, a count, then the
//! elements in iteration order, each one a `bincode` encoding of its
//! `serde` representation:
//!
//! | Container | Header |
//! |-----------|--------|
//! | [`GrowableArray`], [`LinkedSequence`], [`SyncArray`] | none |
//! | [`HashedSet`] | `capacity: i32`, `load_factor: f32` |
//! | [`OrderedSet`] | `descriptor_len: i32`, `descriptor: utf8` |
//!
//! followed by `count: i32` and `count` elements.
//!
//! Decoding validates the header and the count before allocating. The
//! count is untrusted, so at most [`MAX_PREALLOC_BYTES`] worth of slots are
//! reserved up front; the rest grow as elements actually decode, and a
//! stream that ends early fails instead of allocating for its claim.
//!
//! # Example
//!
//! ```
//! use nexus_sequence::{GrowableArray, Persist};
//!
//! let array: GrowableArray<u32> = (0..4).collect();
//! let mut bytes = Vec::new();
//! array.encode(&mut bytes).unwrap();
//!
//! let decoded = GrowableArray::<u32>::decode(&mut bytes.as_slice()).unwrap();
//! assert_eq!(decoded.to_vec().unwrap(), vec![0, 1, 2, 3]);
//! ```

use std::hash::Hash;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::array::MAX_ARRAY_LENGTH;
use crate::hashed::{HashedStorage, MAXIMUM_CAPACITY};
use crate::ordered::OrderedStorage;
use crate::ordered::comparator::Comparator;
use crate::set::SetStorage;
use crate::storage::{SequenceStorage, Shared};
use crate::{
    CollectionError, GrowableArray, HashedSet, LinkedSequence, OrderedSet, Result, SyncArray,
};

/// Longest comparator descriptor accepted on decode.
const MAX_DESCRIPTOR_LEN: usize = 1 << 16;

/// Upper bound on the element buffer reserved from a persisted count.
pub const MAX_PREALLOC_BYTES: usize = 1 << 20;

/// Byte-stream encoding of a container.
pub trait Persist: Sized {
    /// Writes the persisted form.
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Reads a container back.
    fn decode<R: Read>(reader: &mut R) -> Result<Self>;
}

// ============================================================================
// Wire helpers
// ============================================================================

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len).map_err(|_| CollectionError::CapacityExceeded {
        requested: len,
        max: i32::MAX as usize,
    })?;
    writer.write_i32::<BigEndian>(len)?;
    Ok(())
}

fn read_count<R: Read>(reader: &mut R) -> Result<usize> {
    let count = reader.read_i32::<BigEndian>()?;
    if count < 0 {
        return Err(CollectionError::Corrupt(format!("negative count: {count}")));
    }
    let count = count as usize;
    if count > MAX_ARRAY_LENGTH {
        return Err(CollectionError::CapacityExceeded {
            requested: count,
            max: MAX_ARRAY_LENGTH,
        });
    }
    Ok(count)
}

fn write_elements<'a, T, W>(writer: &mut W, len: usize, values: impl Iterator<Item = &'a T>) -> Result<()>
where
    T: Serialize + 'a,
    W: Write,
{
    write_len(writer, len)?;
    for value in values {
        bincode::serialize_into(&mut *writer, value)?;
    }
    Ok(())
}

fn read_elements<T, R>(reader: &mut R) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let count = read_count(reader)?;
    let slot = std::mem::size_of::<T>().max(1);
    let mut values = Vec::with_capacity(count.min(MAX_PREALLOC_BYTES / slot));
    for _ in 0..count {
        values.push(bincode::deserialize_from(&mut *reader)?);
    }
    Ok(values)
}

// ============================================================================
// Sequences
// ============================================================================

impl<T: Serialize + DeserializeOwned> Persist for GrowableArray<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.cell()
            .read(|s| write_elements(writer, s.len(), s.as_slice().iter()))?
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        GrowableArray::from_vec(read_elements(reader)?)
    }
}

impl<T: Serialize + DeserializeOwned> Persist for LinkedSequence<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.cell()
            .read(|s| write_elements(writer, s.len(), s.values()))?
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(read_elements(reader)?.into_iter().collect())
    }
}

impl<T: Serialize + DeserializeOwned> Persist for SyncArray<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.cell()
            .read(|s| write_elements(writer, s.len(), s.as_slice().iter()))?
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        SyncArray::from_vec(read_elements(reader)?)
    }
}

// ============================================================================
// Sets
// ============================================================================

impl<T> Persist for HashedSet<T>
where
    T: Eq + Hash + Serialize + DeserializeOwned,
{
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.cell().read(|s| {
            write_len(writer, s.capacity())?;
            writer.write_f32::<BigEndian>(s.load_factor())?;
            write_elements(writer, s.len(), s.values())
        })?
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let capacity = reader.read_i32::<BigEndian>()?;
        if capacity < 0 {
            return Err(CollectionError::Corrupt(format!(
                "negative capacity: {capacity}"
            )));
        }
        let load_factor = reader.read_f32::<BigEndian>()?;
        if !(load_factor > 0.0) {
            return Err(CollectionError::Corrupt(format!(
                "illegal load factor: {load_factor}"
            )));
        }
        let values: Vec<T> = read_elements(reader)?;

        let capacity = (values.len() as f64 * (1.0 / load_factor as f64).min(4.0))
            .min(MAXIMUM_CAPACITY as f64) as usize;
        let mut storage = HashedStorage::with_capacity_and_load_factor(capacity, load_factor)?;
        for value in values {
            storage.insert(value);
        }
        Ok(HashedSet::from_storage(storage))
    }
}

impl<T, C> OrderedSet<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Comparator<T>,
{
    /// Decodes a set written under the order `comparator` describes.
    ///
    /// Fails with `IllegalArgument` when the persisted descriptor names a
    /// different order.
    pub fn decode_with<R: Read>(reader: &mut R, comparator: C) -> Result<Self> {
        let len = reader.read_i32::<BigEndian>()?;
        if len < 0 || len as usize > MAX_DESCRIPTOR_LEN {
            return Err(CollectionError::Corrupt(format!(
                "bad descriptor length: {len}"
            )));
        }
        let mut bytes = vec![0; len as usize];
        reader.read_exact(&mut bytes)?;
        let descriptor = String::from_utf8(bytes)
            .map_err(|e| CollectionError::Corrupt(format!("descriptor is not utf-8: {e}")))?;
        if descriptor != comparator.descriptor() {
            return Err(CollectionError::IllegalArgument(format!(
                "comparator mismatch: persisted {descriptor:?}, supplied {:?}",
                comparator.descriptor()
            )));
        }

        let values: Vec<T> = read_elements(reader)?;
        let mut storage = OrderedStorage::new(comparator, 2);
        for value in values {
            storage.insert(value);
        }
        Ok(OrderedSet::from_storage(storage))
    }

    /// Writes the persisted form. Unlike [`Persist::encode`] this does not
    /// need a comparator with a `Default`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.cell().read(|s| {
            let descriptor = s.comparator().descriptor().as_bytes();
            write_len(writer, descriptor.len())?;
            writer.write_all(descriptor)?;
            write_elements(writer, s.len(), s.values())
        })?
    }
}

impl<T, C> Persist for OrderedSet<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Comparator<T> + Default,
{
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.write_to(writer)
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Self::decode_with(reader, C::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordered::comparator::{ByKey, Reverse};

    fn encode<P: Persist>(p: &P) -> Vec<u8> {
        let mut bytes = Vec::new();
        p.encode(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn sequence_layout() {
        let array: GrowableArray<u8> = vec![7, 8].into_iter().collect();
        let bytes = encode(&array);
        assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[4..], &[7, 8]);
    }

    #[test]
    fn chain_and_sync_round_trip() {
        let chain: LinkedSequence<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let back = LinkedSequence::<String>::decode(&mut encode(&chain).as_slice()).unwrap();
        assert_eq!(back.to_vec().unwrap(), chain.to_vec().unwrap());

        let sync: SyncArray<i64> = (-3..3).collect();
        let back = SyncArray::<i64>::decode(&mut encode(&sync).as_slice()).unwrap();
        assert_eq!(back.to_vec().unwrap(), sync.to_vec().unwrap());
    }

    #[test]
    fn empty_round_trip() {
        let array: GrowableArray<u32> = GrowableArray::new();
        let back = GrowableArray::<u32>::decode(&mut encode(&array).as_slice()).unwrap();
        assert!(back.is_empty().unwrap());
    }

    #[test]
    fn negative_count_rejected() {
        let bytes = (-1i32).to_be_bytes();
        assert!(matches!(
            GrowableArray::<u32>::decode(&mut bytes.as_slice()),
            Err(CollectionError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let bytes = 5i32.to_be_bytes();
        assert!(matches!(
            LinkedSequence::<u32>::decode(&mut bytes.as_slice()),
            Err(CollectionError::Codec(_)) | Err(CollectionError::Io(_))
        ));
    }

    #[test]
    fn huge_count_fails_without_reserving_it() {
        let bytes = (MAX_ARRAY_LENGTH as i32).to_be_bytes();
        assert!(matches!(
            GrowableArray::<[u64; 4]>::decode(&mut bytes.as_slice()),
            Err(CollectionError::Codec(_)) | Err(CollectionError::Io(_))
        ));
    }

    #[test]
    fn hashed_header_and_round_trip() {
        let set: HashedSet<u32> = (0..20).collect();
        let bytes = encode(&set);
        assert_eq!(&bytes[..4], &32i32.to_be_bytes());
        assert_eq!(&bytes[4..8], &0.75f32.to_be_bytes());
        assert_eq!(&bytes[8..12], &20i32.to_be_bytes());

        let back = HashedSet::<u32>::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(back.len().unwrap(), 20);
        assert!((0..20).all(|v| back.contains(&v).unwrap()));
        assert_eq!(back.load_factor().unwrap(), 0.75);
    }

    #[test]
    fn hashed_bad_header_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16i32.to_be_bytes());
        bytes.extend_from_slice(&f32::NAN.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes());
        assert!(matches!(
            HashedSet::<u32>::decode(&mut bytes.as_slice()),
            Err(CollectionError::Corrupt(_))
        ));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-4i32).to_be_bytes());
        bytes.extend_from_slice(&0.75f32.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes());
        assert!(matches!(
            HashedSet::<u32>::decode(&mut bytes.as_slice()),
            Err(CollectionError::Corrupt(_))
        ));
    }

    #[test]
    fn ordered_round_trip_keeps_order() {
        let set: OrderedSet<u32, Reverse> = (0..10).collect();
        let bytes = encode(&set);
        assert_eq!(&bytes[..4], &7i32.to_be_bytes());
        assert_eq!(&bytes[4..11], b"reverse");
        let back = OrderedSet::<u32, Reverse>::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(back.to_vec().unwrap(), (0..10).rev().collect::<Vec<_>>());
    }

    #[test]
    fn ordered_comparator_mismatch() {
        let set: OrderedSet<u32> = (0..3).collect();
        let bytes = encode(&set);
        assert!(matches!(
            OrderedSet::<u32, Reverse>::decode(&mut bytes.as_slice()),
            Err(CollectionError::IllegalArgument(_))
        ));
        let by_key = ByKey::new("natural", |v: &u32| *v);
        let back = OrderedSet::decode_with(&mut bytes.as_slice(), by_key).unwrap();
        assert_eq!(back.to_vec().unwrap(), vec![0, 1, 2]);
    }
}
