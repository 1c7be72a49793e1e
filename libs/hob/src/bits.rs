//! Packed bit containers.
//!
//! Both containers pack bits LSB-first: bit `j` lives in byte `j >> 3` at
//! position `j & 7`. [`Bitset`] has a bit count fixed by its type and only
//! writes a byte-count prefix; [`BitVec`] grows at runtime and writes its
//! bit count *and* byte count, a deliberate double prefix that lets a reader
//! validate the framing.

use std::fmt;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::io::{Sink, Source};
use crate::varint;

/// Fixed-width set of `N` bits.
///
/// On the wire: `VARINT(ceil(N / 8))` then that many packed bytes. Decoding
/// fails with [`Error::FrameMismatch`] if the declared byte count disagrees
/// with `N`, which makes framing corruption detectable.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bitset<const N: usize> {
    bytes: Box<[u8]>,
}

impl<const N: usize> Bitset<N> {
    const BYTES: usize = N.div_ceil(8);

    /// Creates a set with all bits cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: vec![0; Self::BYTES].into_boxed_slice(),
        }
    }

    /// Count of bits, i.e. `N`.
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// Whether `N` is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Gets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < N, "bit index out of range");
        self.bytes[index >> 3] & (1 << (index & 7)) != 0
    }

    /// Sets the bit at `index` to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < N, "bit index out of range");
        let mask = 1 << (index & 7);
        if value {
            self.bytes[index >> 3] |= mask;
        } else {
            self.bytes[index >> 3] &= !mask;
        }
    }

    /// Clears all bits.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Packed byte view, LSB-first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> Default for Bitset<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for Bitset<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries((0..N).filter(|i| self.get(*i))).finish()
    }
}

impl<const N: usize> Field for Bitset<N> {
    fn size(&self) -> usize {
        varint::size(Self::BYTES as u64) + Self::BYTES
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, Self::BYTES as u64)?;
        sink.write(&self.bytes)
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let actual = varint::read_len(src)?;
        if actual != Self::BYTES {
            return Err(Error::FrameMismatch {
                expected: Self::BYTES,
                actual,
            });
        }

        let mut value = Self::new();
        src.read(&mut value.bytes)?;
        Ok(value)
    }
}

/// Dynamically sized vector of bits.
///
/// On the wire: `VARINT(bit count)`, `VARINT(ceil(bit count / 8))`, then the
/// packed bytes.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct BitVec {
    len: usize,
    bytes: Vec<u8>,
}

impl BitVec {
    /// Creates an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector holds no bits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a bit.
    pub fn push(&mut self, value: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }

        if value {
            self.bytes[self.len >> 3] |= 1 << (self.len & 7);
        }

        self.len += 1;
    }

    /// Gets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index out of range");
        self.bytes[index >> 3] & (1 << (index & 7)) != 0
    }

    /// Sets the bit at `index` to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit index out of range");
        let mask = 1 << (index & 7);
        if value {
            self.bytes[index >> 3] |= mask;
        } else {
            self.bytes[index >> 3] &= !mask;
        }
    }

    /// Removes all bits.
    pub fn clear(&mut self) {
        self.len = 0;
        self.bytes.clear();
    }

    /// Packed byte view, LSB-first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.len).map(|i| u8::from(self.get(i))))
            .finish()
    }
}

impl FromIterator<bool> for BitVec {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut vec = Self::new();
        for bit in iter {
            vec.push(bit);
        }

        vec
    }
}

impl Field for BitVec {
    fn size(&self) -> usize {
        varint::size(self.len as u64)
            + varint::size(self.bytes.len() as u64)
            + self.bytes.len()
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, self.len as u64)?;
        varint::write(sink, self.bytes.len() as u64)?;
        sink.write(&self.bytes)
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let len = varint::read_len(src)?;
        let expected = len.div_ceil(8);
        let actual = varint::read_len(src)?;
        if actual != expected {
            return Err(Error::FrameMismatch { expected, actual });
        }

        let mut bytes = crate::field::read_vec(src, expected)?;

        // trailing padding bits in the last byte are not meaningful
        if len % 8 != 0
            && let Some(last) = bytes.last_mut()
        {
            *last &= (1u16 << (len % 8)).wrapping_sub(1) as u8;
        }

        Ok(Self { len, bytes })
    }
}
