//! Generic field encoding, decoding and sizing.
//!
//! Every wire-visible value kind implements [`Field`]. Composite kinds
//! (options, sequences, maps, nested records) are built purely from the
//! primitive kinds plus recursion, so arbitrarily nested shapes come out of
//! the same small set of impls.
//!
//! The value kinds map to the wire as follows:
//!
//! - unsigned integers: VARINT
//! - signed integers: ZigZag, then VARINT
//! - `bool`: one byte, 0 or 1
//! - `f32`/`f64`: the native byte image, *not* VARINT — floats are written
//!   raw by design, and in native byte order (see the crate docs for the
//!   endianness caveat)
//! - `String` and [`Bytes`]: VARINT byte length, then the raw bytes
//! - `Option<T>`: presence byte, then `T` iff present
//! - `Vec<T>`: VARINT count, then `count` elements
//! - maps: VARINT count, then `(key, value)` pairs in the container's own
//!   iteration order
//! - bit containers and records: see [`bits`](crate::bits) and
//!   [`record`](crate::record)

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;

use crate::error::{Error, Result, eof};
use crate::io::{Sink, Source};
use crate::varint;

/// A value that can be stored in a record field.
///
/// [`decode`](Self::decode) is the change-tracking entry point: it reads a
/// fresh value, compares it to the current one, and reports whether anything
/// differed. [`read`](Self::read) constructs a value without a prior state.
pub trait Field: Sized + Default + PartialEq {
    /// Exact encoded byte count of this value.
    fn size(&self) -> usize;

    /// Encodes this value.
    ///
    /// # Errors
    ///
    /// Fails if the sink does.
    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()>;

    /// Reads a value from the source.
    ///
    /// # Errors
    ///
    /// Fails on a short read or malformed data. The source position is
    /// unspecified after a failure.
    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self>;

    /// Reads a value into `self`, reporting whether it differed from the
    /// prior value.
    ///
    /// # Errors
    ///
    /// Fails like [`read`](Self::read); `self` is left untouched then.
    fn decode<S: Source + ?Sized>(&mut self, src: &mut S) -> Result<bool> {
        let new = Self::read(src)?;
        let changed = new != *self;
        *self = new;
        Ok(changed)
    }
}

/// Reads `len` raw bytes into a fresh buffer.
///
/// The up-front allocation is capped so incorrect length prefixes can't
/// balloon memory before the short read surfaces.
pub(crate) fn read_vec<S: Source + ?Sized>(src: &mut S, len: usize) -> Result<Vec<u8>> {
    const CHUNK: usize = 0x1000;

    let mut buf = Vec::with_capacity(len.min(CHUNK));
    let mut remaining = len;
    while remaining > 0 {
        let step = remaining.min(CHUNK);
        let start = buf.len();
        buf.resize(start + step, 0);
        src.read(&mut buf[start..])?;
        remaining -= step;
    }

    Ok(buf)
}

macro_rules! impl_field_uint {
    ($($Ty:ty),* $(,)?) => { $(
        impl Field for $Ty {
            fn size(&self) -> usize {
                varint::size(u64::from(*self))
            }

            fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
                varint::write(sink, u64::from(*self))
            }

            fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
                Self::try_from(varint::read(src)?).map_err(|_| Error::IntegerOverflow)
            }
        }
    )* };
}

macro_rules! impl_field_sint {
    ($($Ty:ty),* $(,)?) => { $(
        impl Field for $Ty {
            fn size(&self) -> usize {
                varint::size(varint::zigzag(i64::from(*self)))
            }

            fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
                varint::write(sink, varint::zigzag(i64::from(*self)))
            }

            fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
                let wide = varint::unzigzag(varint::read(src)?);
                Self::try_from(wide).map_err(|_| Error::IntegerOverflow)
            }
        }
    )* };
}

macro_rules! impl_field_float {
    ($($Ty:ty),* $(,)?) => { $(
        impl Field for $Ty {
            fn size(&self) -> usize {
                size_of::<Self>()
            }

            fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
                sink.write(&self.to_ne_bytes())
            }

            fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
                let mut buf = [0u8; size_of::<Self>()];
                src.read(&mut buf)?;
                Ok(Self::from_ne_bytes(buf))
            }
        }
    )* };
}

impl_field_uint!(u8, u16, u32, u64);
impl_field_sint!(i8, i16, i32, i64);
impl_field_float!(f32, f64);

impl Field for bool {
    fn size(&self) -> usize {
        1
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        sink.put((*self).into())
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        match src.get()?.ok_or_else(eof)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::InvalidBool),
        }
    }
}

impl Field for String {
    fn size(&self) -> usize {
        varint::size(self.len() as u64) + self.len()
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, self.len() as u64)?;
        sink.write(self.as_bytes())
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let len = varint::read_len(src)?;
        let buf = read_vec(src, len)?;
        Self::from_utf8(buf).map_err(|_| Error::InvalidUtf8)
    }
}

/// Raw byte string.
///
/// Encoded like a [`String`] but without the UTF-8 requirement. A plain
/// `Vec<u8>` would instead be a sequence of `u8` *fields*, where bytes above
/// `0x7F` take two wire bytes each.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    /// Unwraps into the inner buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Bytes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Field for Bytes {
    fn size(&self) -> usize {
        varint::size(self.0.len() as u64) + self.0.len()
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, self.0.len() as u64)?;
        sink.write(&self.0)
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let len = varint::read_len(src)?;
        read_vec(src, len).map(Self)
    }
}

impl<T: Field> Field for Option<T> {
    fn size(&self) -> usize {
        match self {
            Some(value) => 1 + value.size(),
            None => 1,
        }
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        match self {
            Some(value) => {
                sink.put(1)?;
                value.encode(sink)
            },
            None => sink.put(0),
        }
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        match src.get()?.ok_or_else(eof)? {
            0 => Ok(None),
            1 => T::read(src).map(Some),
            _ => Err(Error::InvalidPresence),
        }
    }
}

impl<T: Field> Field for Vec<T> {
    fn size(&self) -> usize {
        let content: usize = self.iter().map(Field::size).sum();
        varint::size(self.len() as u64) + content
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, self.len() as u64)?;
        for element in self {
            element.encode(sink)?;
        }

        Ok(())
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let count = varint::read_len(src)?;
        let mut vec = Self::with_capacity(count.min(0x1000));
        for _ in 0..count {
            vec.push(T::read(src)?);
        }

        Ok(vec)
    }
}

macro_rules! impl_field_map {
    ($(($Map:ident, $($Bound:ident),+)),* $(,)?) => { $(
        impl<K: Field + $($Bound+)+, V: Field> Field for $Map<K, V> {
            fn size(&self) -> usize {
                let content: usize = self
                    .iter()
                    .map(|(key, value)| key.size() + value.size())
                    .sum();
                varint::size(self.len() as u64) + content
            }

            fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
                varint::write(sink, self.len() as u64)?;
                for (key, value) in self {
                    key.encode(sink)?;
                    value.encode(sink)?;
                }

                Ok(())
            }

            fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
                let count = varint::read_len(src)?;
                let mut map = Self::default();
                for _ in 0..count {
                    let key = K::read(src)?;
                    let value = V::read(src)?;
                    // repeated insertion: a later duplicate key overwrites
                    map.insert(key, value);
                }

                Ok(map)
            }
        }
    )* };
}

impl_field_map!((BTreeMap, Ord), (HashMap, Eq, Hash), (IndexMap, Eq, Hash));

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn round_trip<T: Field + std::fmt::Debug>(value: &T) -> Vec<u8> {
        let mut buf = Vec::new();
        value.encode(&mut buf).expect("encoding works");
        assert_eq!(buf.len(), value.size(), "size must predict the encoding");

        let mut src: &[u8] = &buf;
        let back = T::read(&mut src).expect("decoding works");
        assert_eq!(*value, back, "round trip must preserve the value");
        assert!(src.is_empty(), "decode must consume the whole encoding");
        buf
    }

    #[test]
    fn integer_fields() {
        round_trip(&0u8);
        round_trip(&200u8);
        round_trip(&0x1234u16);
        round_trip(&u64::MAX);
        round_trip(&-1i8);
        round_trip(&i32::MIN);
        round_trip(&i64::MAX);
    }

    #[test]
    fn integer_overflow_detected() {
        // u64::MAX is a valid varint but not a valid u16
        let buf = round_trip(&u64::MAX);
        let mut src: &[u8] = &buf;
        let err = u16::read(&mut src).expect_err("must not fit");
        assert!(matches!(err, Error::IntegerOverflow), "got: {err:?}");
    }

    #[test]
    fn small_negative_ints_stay_short() {
        assert_eq!((-1i64).size(), 1);
        assert_eq!((-64i64).size(), 1);
        assert_eq!((-65i64).size(), 2);
    }

    #[test]
    fn bool_field() {
        assert_eq!(round_trip(&true), [1]);
        assert_eq!(round_trip(&false), [0]);

        let mut src: &[u8] = &[2];
        assert!(matches!(
            bool::read(&mut src).expect_err("2 is not a bool"),
            Error::InvalidBool
        ));
    }

    #[test]
    fn string_allows_embedded_nul() {
        let buf = round_trip(&String::from("a\0b"));
        assert_eq!(buf, [3, b'a', 0, b'b']);
    }

    #[test]
    fn bytes_are_raw() {
        let buf = round_trip(&Bytes::from(&[0xFF, 0x00, 0x80][..]));
        assert_eq!(buf, [3, 0xFF, 0x00, 0x80]);

        // the same data as a u8 sequence costs more: high bytes split in two
        let as_seq = round_trip(&vec![0xFFu8, 0x00, 0x80]);
        assert_eq!(as_seq.len(), 6);
    }

    #[test]
    fn option_field() {
        assert_eq!(round_trip(&None::<u32>), [0]);
        assert_eq!(round_trip(&Some(5u32)), [1, 5]);
        round_trip(&Some(String::from("hi")));
    }

    #[test]
    fn option_absence_resets_and_reports_change() {
        let mut value = Some(17u32);
        let mut src: &[u8] = &[0];
        let changed = value.decode(&mut src).expect("decoding works");
        assert!(changed, "dropping a present value is a change");
        assert_eq!(value, None);

        let mut src: &[u8] = &[0];
        let changed = value.decode(&mut src).expect("decoding works");
        assert!(!changed, "still absent is not a change");
    }

    #[test]
    fn nested_composites() {
        round_trip(&vec![vec![1u32, 2], vec![], vec![3]]);
        round_trip(&Some(vec![String::from("a"), String::from("b")]));
        round_trip(&vec![None, Some(-5i32), None]);

        let map: BTreeMap<String, Vec<u16>> = BTreeMap::from_iter([
            (String::from("a"), vec![1, 2]),
            (String::from("b"), vec![]),
        ]);
        round_trip(&map);
    }

    #[test]
    fn index_map_keeps_insertion_order() {
        let map: IndexMap<String, u32> = IndexMap::from_iter([
            (String::from("z"), 1),
            (String::from("a"), 2),
        ]);
        let buf = round_trip(&map);
        // "z" first: iteration order is insertion order, not key order
        assert_eq!(buf[1], 1);
        assert_eq!(buf[2], b'z');
    }
}
