//! Error handling types.
//!
//! The whole crate shares one error type and a matching result alias. UID
//! mismatches during multi-candidate probing are deliberately *not* errors;
//! see [`Envelope::decode_into`](crate::Envelope::decode_into).

use std::io;

use crate::uid::Uid;

pub type Result<T> = std::result::Result<T, Error>;

/// Potential errors to encounter when encoding or decoding binary records.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The error originated from the underlying [`io::Write`] or [`io::Read`]
    /// implementation. Short reads surface as
    /// [`io::ErrorKind::UnexpectedEof`].
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A decoded VARINT does not fit the target integer type.
    #[error("VARINT encoded integer overflows target type")]
    IntegerOverflow,
    /// A wire length or element count does not fit [`usize`].
    #[error("length prefix overflows usize")]
    LengthOverflow,

    /// Tried to decode a [`bool`] value but it wasn't 0 or 1.
    #[error("invalid bool value")]
    InvalidBool,
    /// Tried to decode an optional with an invalid presence flag.
    #[error("invalid optional presence flag")]
    InvalidPresence,
    /// Tried to decode a string but its data contained invalid UTF-8.
    #[error("invalid utf-8 in data for string")]
    InvalidUtf8,

    /// A fixed-size container's declared byte count disagrees with its
    /// statically expected size. This usually indicates framing corruption.
    #[error("declared byte count {actual} does not match expected {expected}")]
    FrameMismatch {
        /// Byte count the local type expects.
        expected: usize,
        /// Byte count declared on the wire.
        actual: usize,
    },

    /// A strict single-type decode found a record with a different UID.
    #[error("record uid {actual} does not match expected {expected}")]
    UidMismatch {
        /// UID of the expected record type.
        expected: Uid,
        /// UID found on the wire.
        actual: Uid,
    },

    /// A variant tag byte names no decodable shape.
    #[error("invalid variant tag byte {0:#04x}")]
    InvalidVariantTag(u8),

    /// Past the expected end of a decoded record were trailing bytes.
    #[error("trailing bytes past the end of the decoded record")]
    TrailingBytes,
}

/// Returns an [`io::Error`] with kind [`io::ErrorKind::UnexpectedEof`].
///
/// The message isn't always a perfect fit, but it doesn't allocate and every
/// short read ends up as the same condition anyway.
pub(crate) fn eof() -> Error {
    io::Error::from(io::ErrorKind::UnexpectedEof).into()
}
