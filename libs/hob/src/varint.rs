//! Variable-length integer encoding with a unary length prefix.
//!
//! Unsigned 64-bit values occupy 1 to 9 bytes. A value stored in `b` bytes
//! (`b < 9`) starts with `b - 1` one-bits and a zero-bit; the remaining bits
//! of byte 0 plus all following bytes hold the value big-endian, for `7 * b`
//! value bits total. `b = 9` is the all-ones marker byte `0xFF` followed by
//! the full value as 8 big-endian bytes.
//!
//! Signed integers are mapped onto the unsigned range with ZigZag first so
//! that small magnitudes stay short in either sign.

use crate::error::{Error, Result, eof};
use crate::io::{Sink, Source};

/// Maximum encoded length of a single VARINT.
pub const MAX_LEN: usize = 9;

/// Returns the exact encoded byte count for a value.
#[must_use]
pub const fn size(value: u64) -> usize {
    let bits = (64 - value.leading_zeros()) as usize;
    if bits > 56 {
        MAX_LEN
    } else if bits <= 7 {
        1
    } else {
        bits.div_ceil(7)
    }
}

/// Writes a value as a VARINT.
///
/// # Errors
///
/// Fails if the sink does.
pub fn write<S: Sink + ?Sized>(sink: &mut S, value: u64) -> Result<()> {
    let len = size(value);
    let mut buf = [0u8; MAX_LEN];

    if len == MAX_LEN {
        buf[0] = 0xFF;
        buf[1..].copy_from_slice(&value.to_be_bytes());
    } else {
        let mut i = 0;
        while i < len {
            buf[len - 1 - i] = (value >> (8 * i)) as u8;
            i += 1;
        }

        // the value's top bits fit under the prefix by choice of `len`
        if len > 1 {
            buf[0] |= 0xFFu8 << (9 - len);
        }
    }

    sink.write(&buf[..len])
}

/// Reads a VARINT value.
///
/// # Errors
///
/// Fails if the source ends before the encoding does.
pub fn read<S: Source + ?Sized>(src: &mut S) -> Result<u64> {
    let first = src.get()?.ok_or_else(eof)?;
    read_rest(first, src)
}

/// Reads the remainder of a VARINT whose first byte was already consumed.
///
/// Record framing uses this to probe for a clean end of stream before
/// committing to a header read.
///
/// # Errors
///
/// Fails if the source ends before the encoding does.
pub fn read_rest<S: Source + ?Sized>(first: u8, src: &mut S) -> Result<u64> {
    let ones = first.leading_ones() as usize;
    if ones == 8 {
        let mut rest = [0u8; 8];
        src.read(&mut rest)?;
        return Ok(u64::from_be_bytes(rest));
    }

    // the mask is computed in u32 because an 8-byte encoding leaves no value
    // bits in byte 0 and the shift would overflow u8
    let mut value = u64::from(first) & u64::from(0xFF_u32 >> (ones + 1));
    let mut rest = [0u8; 8];
    let rest = &mut rest[..ones];
    src.read(rest)?;
    for byte in rest {
        value = (value << 8) | u64::from(*byte);
    }

    Ok(value)
}

/// Reads a VARINT value and converts it to a length.
///
/// # Errors
///
/// Fails like [`read`], or with [`Error::LengthOverflow`] if the value does
/// not fit [`usize`].
pub fn read_len<S: Source + ?Sized>(src: &mut S) -> Result<usize> {
    usize::try_from(read(src)?).map_err(|_| Error::LengthOverflow)
}

/// Maps a signed value onto the unsigned range, keeping small magnitudes
/// small: `0, -1, 1, -2, 2, ..` become `0, 1, 2, 3, 4, ..`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverts [`zigzag`].
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn round_trip(value: u64, expected_len: usize) {
        let mut buf = Vec::new();
        write(&mut buf, value).expect("encoding works");
        assert_eq!(buf.len(), expected_len, "encoded length for {value}");
        assert_eq!(size(value), expected_len, "predicted length for {value}");

        let mut src: &[u8] = &buf;
        let back = read(&mut src).expect("decoding works");
        assert_eq!(back, value, "round trip for {value}");
        assert!(src.is_empty(), "decode must consume the whole encoding");
    }

    #[test]
    fn boundary_lengths() {
        round_trip(0, 1);
        round_trip(127, 1);
        round_trip(128, 2);
        round_trip(16383, 2);
        round_trip(16384, 3);
        round_trip((1 << 21) - 1, 3);
        round_trip(1 << 21, 4);
        round_trip((1 << 56) - 1, 8);
        round_trip(1 << 56, 9);
        round_trip(u64::MAX, 9);
    }

    #[test]
    fn zero_is_a_single_zero_byte() {
        let mut buf = Vec::new();
        write(&mut buf, 0).expect("encoding works");
        assert_eq!(buf, [0x00]);
    }

    #[test]
    fn max_is_marker_plus_value() {
        let mut buf = Vec::new();
        write(&mut buf, u64::MAX).expect("encoding works");
        assert_eq!(buf[0], 0xFF);
        assert_eq!(&buf[1..], &[0xFF; 8]);
    }

    #[test]
    fn short_input_fails() {
        let mut src: &[u8] = &[0xC0, 0x12]; // declares 3 bytes, has 2
        assert!(read(&mut src).is_err(), "short read must fail");
    }

    #[test]
    fn zigzag_boundaries() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(2), 4);

        for v in [0, -1, 1, i64::MIN, i64::MAX] {
            assert_eq!(unzigzag(zigzag(v)), v, "zigzag round trip for {v}");
        }
    }
}
