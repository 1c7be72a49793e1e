//! Minimal octet-stream abstraction consumed by the codec.
//!
//! Transports implement [`Sink`] and [`Source`]; the codec never talks to
//! [`std::io`] directly. Byte slices act as both the in-memory backend and
//! the decode window handed out by [`Envelope`](crate::Envelope): reading
//! from a `&[u8]` source advances the slice in place, so "remaining window"
//! is just the remaining slice.
//!
//! [`IoSource`] and [`IoSink`] adapt arbitrary [`io::Read`]/[`io::Write`]
//! backends (files, sockets, cursors). Seeking is not part of the trait;
//! backends that support it expose it through [`io::Seek`].

use std::io;

use crate::error::{Result, eof};

/// Write half of the octet-stream abstraction.
///
/// Implemented for [`Vec<u8>`], [`IoSink`] and mutable references to other
/// implementations.
pub trait Sink {
    /// Writes all given bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Writes a single byte.
    fn put(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn put(&mut self, byte: u8) -> Result<()> {
        (**self).put(byte)
    }
}

impl Sink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn put(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }
}

/// Read half of the octet-stream abstraction.
///
/// Implemented for `&[u8]` (advancing the slice in place), [`IoSource`] and
/// mutable references to other implementations.
pub trait Source {
    /// Reads exactly `buf.len()` bytes. A short read is an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads a single byte, or [`None`] at the end of the stream.
    fn get(&mut self) -> Result<Option<u8>>;

    /// Pushes a single byte back so the next read returns it again.
    ///
    /// Returns `false` if this source doesn't support pushback or its
    /// one-byte pushback slot is already occupied.
    fn unget(&mut self, byte: u8) -> bool {
        let _ = byte;
        false
    }

    /// Discards exactly `len` bytes.
    fn skip(&mut self, len: u64) -> Result<()>;

    /// Current stream position, if this source tracks one.
    fn tell(&self) -> Option<u64> {
        None
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn get(&mut self) -> Result<Option<u8>> {
        (**self).get()
    }

    fn unget(&mut self, byte: u8) -> bool {
        (**self).unget(byte)
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        (**self).skip(len)
    }

    fn tell(&self) -> Option<u64> {
        (**self).tell()
    }
}

impl Source for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let (out, rem) = self.split_at_checked(buf.len()).ok_or_else(eof)?;
        buf.copy_from_slice(out);
        *self = rem;
        Ok(())
    }

    fn get(&mut self) -> Result<Option<u8>> {
        match self.split_first() {
            Some((byte, rem)) => {
                *self = rem;
                Ok(Some(*byte))
            },
            None => Ok(None),
        }
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        let len = usize::try_from(len).map_err(|_| eof())?;
        let (_, rem) = self.split_at_checked(len).ok_or_else(eof)?;
        *self = rem;
        Ok(())
    }
}

/// Wraps an [`io::Write`] implementation so it can be used as a [`Sink`].
///
/// Tracks the count of bytes written so far.
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
    pos: u64,
}

impl<W: io::Write> IoSink<W> {
    /// Creates a new sink over a writer.
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Unwraps the sink into its inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Count of bytes written so far.
    pub fn tell(&self) -> u64 {
        self.pos
    }
}

impl<W: io::Write> Sink for IoSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}

/// Wraps an [`io::Read`] implementation so it can be used as a [`Source`].
///
/// Supports single-byte pushback, used by lookahead in header reads and by
/// textual front-ends layered on top of this crate.
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    pushback: Option<u8>,
    pos: u64,
}

impl<R: io::Read> IoSource<R> {
    /// Creates a new source over a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushback: None,
            pos: 0,
        }
    }

    /// Unwraps the source into its inner reader.
    ///
    /// A pushed-back byte, if any, is lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> Source for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut rest = &mut *buf;
        if let Some(byte) = self.pushback.take()
            && let Some((first, tail)) = std::mem::take(&mut rest).split_first_mut()
        {
            *first = byte;
            rest = tail;
        }

        self.inner.read_exact(rest)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn get(&mut self) -> Result<Option<u8>> {
        if let Some(byte) = self.pushback.take() {
            self.pos += 1;
            return Ok(Some(byte));
        }

        let mut buf = [0u8];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(buf[0]));
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn unget(&mut self, byte: u8) -> bool {
        if self.pushback.is_some() {
            return false;
        }

        self.pushback = Some(byte);
        self.pos = self.pos.saturating_sub(1);
        true
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        let mut remaining = len;
        if remaining > 0 && self.pushback.take().is_some() {
            remaining -= 1;
            self.pos += 1;
        }

        // discard in bounded chunks so a bogus length can't allocate much
        let mut buf = [0u8; 0x1000];
        while remaining > 0 {
            let chunk = usize::try_from(remaining.min(buf.len() as u64)).unwrap_or(buf.len());
            self.inner.read_exact(&mut buf[..chunk])?;
            self.pos += chunk as u64;
            remaining -= chunk as u64;
        }

        Ok(())
    }

    fn tell(&self) -> Option<u64> {
        Some(self.pos)
    }
}
