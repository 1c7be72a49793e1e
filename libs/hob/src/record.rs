//! Record types and the self-delimiting envelope framing.
//!
//! On the wire a record is `VARINT(uid)`, then — iff the UID's payload flag
//! is set — `VARINT(payload length)` and exactly that many payload bytes
//! holding the field encodings. The length makes every record skippable
//! without being understood.
//!
//! Decoding buffers the payload into an [`Envelope`] first, so any number of
//! candidate types can probe the same bytes without touching the transport
//! again. A UID mismatch is routine and signalled without an error; a decode
//! failure against a matching UID is how hash collisions surface and means
//! "not actually this type", not "corrupt stream".

use crate::changes::ChangeSet;
use crate::error::{Error, Result, eof};
use crate::field::{Field, read_vec};
use crate::io::{Sink, Source};
use crate::uid::Uid;
use crate::varint;

/// A declared record type.
///
/// Usually implemented through [`record!`](crate::record!), which derives
/// the UID from the declared names at compile time and generates the field
/// plumbing. `FIELDS` lists the declared field names in declaration order;
/// change-bit indices follow that order.
pub trait Record: Default + PartialEq {
    /// Declared wire name.
    const NAME: &'static str;
    /// Declared field names, in declaration order.
    const FIELDS: &'static [&'static str];
    /// Count of declared fields of any kind.
    const FIELD_COUNT: usize = Self::FIELDS.len();
    /// Structural identity of this type.
    const UID: Uid;

    /// Exact byte count of the serialized fields.
    fn payload_size(&self) -> usize;

    /// Encodes all fields, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails if the sink does.
    fn encode_fields<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()>;

    /// Decodes fields from a payload window, updating change bits.
    ///
    /// Mandatory fields must be present; optional and dynamic fields decode
    /// only while window bytes remain, and keep their prior value otherwise.
    ///
    /// # Errors
    ///
    /// Fails on a short window or malformed field data; the record is in an
    /// unspecified intermediate state then and must not be trusted.
    fn decode_fields(&mut self, window: &mut &[u8]) -> Result<()>;

    /// Change bits of the most recent decode.
    fn changes(&self) -> &ChangeSet;

    /// Mutable access to the change bits, e.g. to reset them.
    fn changes_mut(&mut self) -> &mut ChangeSet;

    /// Resolves a declared field name to its change-bit index.
    #[must_use]
    fn field_index(name: &str) -> Option<usize> {
        Self::FIELDS.iter().position(|field| *field == name)
    }

    /// Whether the most recent decode changed the field at `index`.
    #[must_use]
    fn changed(&self, index: usize) -> bool {
        self.changes().test(index)
    }
}

/// Exact byte count of a record's full envelope.
#[must_use]
pub fn encoded_size<R: Record>(record: &R) -> usize {
    let mut size = varint::size(R::UID.raw());
    if R::UID.has_payload() {
        let payload = record.payload_size();
        size += varint::size(payload as u64) + payload;
    }

    size
}

/// Encodes a record as a full envelope.
///
/// # Errors
///
/// Fails if the sink does.
pub fn encode<R: Record, S: Sink + ?Sized>(record: &R, sink: &mut S) -> Result<()> {
    varint::write(sink, R::UID.raw())?;
    if R::UID.has_payload() {
        varint::write(sink, record.payload_size() as u64)?;
        record.encode_fields(sink)?;
    }

    Ok(())
}

/// Encodes a record to a [`Vec<u8>`].
///
/// The resulting buffer has exactly the length required.
///
/// # Errors
///
/// Never fails in practice; the signature matches [`encode`].
pub fn to_vec<R: Record>(record: &R) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_size(record));
    encode(record, &mut buf)?;
    Ok(buf)
}

/// Decodes exactly one record of a known type from a byte slice.
///
/// This is the strict single-type form: the UID must match and the slice
/// must hold exactly one envelope. Multi-candidate probing goes through
/// [`Envelope`] instead.
///
/// # Errors
///
/// Fails with [`Error::UidMismatch`] on a different record type and
/// [`Error::TrailingBytes`] if data follows the envelope.
pub fn from_slice<R: Record>(buf: &[u8]) -> Result<R> {
    let mut src = buf;
    let envelope = Envelope::read(&mut src)?.ok_or_else(eof)?;
    if !src.is_empty() {
        return Err(Error::TrailingBytes);
    }

    let mut record = R::default();
    if !envelope.decode_into(&mut record)? {
        return Err(Error::UidMismatch {
            expected: R::UID,
            actual: envelope.uid(),
        });
    }

    Ok(record)
}

/// One record read off the wire, with its payload buffered.
///
/// Buffering is what allows several candidate types to attempt a decode
/// against the same bytes; an unmatched envelope is skipped by dropping it,
/// leaving the source positioned exactly at the next record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    uid: Uid,
    payload: Vec<u8>,
}

impl Envelope {
    /// Reads the next envelope, buffering its payload.
    ///
    /// Returns [`None`] on a clean end of stream, i.e. when not even the
    /// first UID byte is available.
    ///
    /// # Errors
    ///
    /// Fails if the stream ends inside an envelope: that is a truncated
    /// record, and the stream position can no longer be trusted.
    pub fn read<S: Source + ?Sized>(src: &mut S) -> Result<Option<Self>> {
        let Some(first) = src.get()? else {
            return Ok(None);
        };

        let uid = Uid::from_raw(varint::read_rest(first, src)?);
        let payload = if uid.has_payload() {
            let len = varint::read(src)?;
            let len = usize::try_from(len).map_err(|_| Error::LengthOverflow)?;
            read_vec(src, len)?
        } else {
            Vec::new()
        };

        Ok(Some(Self { uid, payload }))
    }

    /// Skips the next record without buffering its payload.
    ///
    /// Returns `false` on a clean end of stream.
    ///
    /// # Errors
    ///
    /// Fails like [`read`](Self::read).
    pub fn skip<S: Source + ?Sized>(src: &mut S) -> Result<bool> {
        let Some(first) = src.get()? else {
            return Ok(false);
        };

        let uid = Uid::from_raw(varint::read_rest(first, src)?);
        if uid.has_payload() {
            let len = varint::read(src)?;
            src.skip(len)?;
        }

        Ok(true)
    }

    /// UID found on the wire.
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Buffered payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the wire UID matches the candidate type's UID.
    #[must_use]
    pub fn is<R: Record>(&self) -> bool {
        self.uid == R::UID
    }

    /// Attempts to decode this envelope as `R`, from its defaults.
    ///
    /// Returns [`None`] on a UID mismatch.
    ///
    /// # Errors
    ///
    /// Fails like [`decode_into`](Self::decode_into).
    pub fn decode<R: Record>(&self) -> Result<Option<R>> {
        let mut record = R::default();
        Ok(self.decode_into(&mut record)?.then_some(record))
    }

    /// Attempts to decode this envelope into an existing record.
    ///
    /// Returns `false` without touching `record` if the UID doesn't match;
    /// the caller then probes another candidate type against the same
    /// envelope or drops it to skip the record.
    ///
    /// Change bits are reset first, so afterwards they describe exactly this
    /// decode. Payload bytes past the fields the local type declares are
    /// discarded: a record encoded with extra trailing optional fields still
    /// decodes (additive schema evolution).
    ///
    /// # Errors
    ///
    /// Fails if the payload is malformed for `R`'s shape. After a UID match
    /// this usually means a hash collision with a structurally different
    /// type; the envelope stays intact, so the caller may treat it like a
    /// mismatch. `record` must not be trusted after a failure.
    pub fn decode_into<R: Record>(&self, record: &mut R) -> Result<bool> {
        if !self.is::<R>() {
            return Ok(false);
        }

        record.changes_mut().clear_all();
        let mut window: &[u8] = &self.payload;
        record.decode_fields(&mut window)?;
        // any remainder is unknown trailing data and is deliberately dropped
        Ok(true)
    }
}

/// An un-interpreted record: its UID plus raw payload bytes.
///
/// Useful to carry records of types the local process doesn't know, and as
/// the record shape inside [`Variant`](crate::Variant) values. Re-encoding
/// reproduces the original envelope byte-exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    uid: Uid,
    payload: Vec<u8>,
}

impl RawRecord {
    /// Captures a typed record into its raw form.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the encode path.
    pub fn capture<R: Record>(record: &R) -> Result<Self> {
        let mut payload = Vec::with_capacity(record.payload_size());
        record.encode_fields(&mut payload)?;
        Ok(Self {
            uid: R::UID,
            payload,
        })
    }

    /// Attempts to reopen the raw record as a typed one.
    ///
    /// Returns [`None`] on a UID mismatch.
    ///
    /// # Errors
    ///
    /// Fails if the payload is malformed for `R`'s shape.
    pub fn open<R: Record>(&self) -> Result<Option<R>> {
        if self.uid != R::UID {
            return Ok(None);
        }

        let mut record = R::default();
        let mut window: &[u8] = &self.payload;
        record.decode_fields(&mut window)?;
        Ok(Some(record))
    }

    /// UID of the captured record.
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Raw payload bytes of the captured record.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Envelope> for RawRecord {
    fn from(envelope: Envelope) -> Self {
        Self {
            uid: envelope.uid,
            payload: envelope.payload,
        }
    }
}

impl Field for RawRecord {
    fn size(&self) -> usize {
        let mut size = varint::size(self.uid.raw());
        if self.uid.has_payload() {
            size += varint::size(self.payload.len() as u64) + self.payload.len();
        }

        size
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, self.uid.raw())?;
        if self.uid.has_payload() {
            varint::write(sink, self.payload.len() as u64)?;
            sink.write(&self.payload)?;
        }

        Ok(())
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let uid = Uid::from_raw(varint::read(src)?);
        let payload = if uid.has_payload() {
            let len = varint::read_len(src)?;
            read_vec(src, len)?
        } else {
            Vec::new()
        };

        Ok(Self { uid, payload })
    }
}

/// Reads a nested record envelope of a known type.
///
/// Backs the generated [`Field`] impls of record types: a nested record is a
/// full envelope inside the parent payload. The UID must match; a window
/// remainder is tolerated like at the top level.
///
/// # Errors
///
/// Fails with [`Error::UidMismatch`] on a different record type, or if the
/// payload is malformed.
pub fn read_nested<R: Record, S: Source + ?Sized>(src: &mut S) -> Result<R> {
    let uid = Uid::from_raw(varint::read(src)?);
    if uid != R::UID {
        return Err(Error::UidMismatch {
            expected: R::UID,
            actual: uid,
        });
    }

    let mut record = R::default();
    if uid.has_payload() {
        let len = varint::read_len(src)?;
        let payload = read_vec(src, len)?;
        let mut window: &[u8] = &payload;
        record.decode_fields(&mut window)?;
    }

    Ok(record)
}
