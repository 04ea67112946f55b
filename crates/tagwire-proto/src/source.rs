//! Origins of bytes to decode.
//!
//! A [`Source`] hands out contiguous chunks the way `std::io::BufRead` does:
//! [`Source::fill`] exposes what is buffered, [`Source::consume`] advances
//! past a prefix of it. [`WireReader`](crate::WireReader) layers limits,
//! size accounting and position tracking on top; a source only knows how to
//! produce the next bytes.

use std::io::{BufRead, BufReader, ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};

use crate::errors::{Result, WireError};

/// Upper bound on the up-front allocation for a length-delimited value read
/// from a source that cannot tell how many bytes it still holds. Larger
/// values grow as their bytes actually arrive.
const MAX_PREALLOC: usize = 64 * 1024;

/// Sequential byte origin with an internal buffer.
pub trait Source {
    /// Return the currently buffered bytes, refilling if the buffer is empty.
    ///
    /// An empty slice means the source is exhausted.
    ///
    /// # Errors
    ///
    /// Stream sources propagate read failures as [`WireError::Io`].
    fn fill(&mut self) -> Result<&[u8]>;

    /// Mark `n` bytes of the last [`Source::fill`] result as read.
    ///
    /// `n` must not exceed the length of that slice.
    fn consume(&mut self, n: usize);

    /// Take exactly `len` bytes as an owned buffer.
    ///
    /// # Errors
    ///
    /// [`WireError::TruncatedInput`] if the source ends first.
    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(len.min(MAX_PREALLOC));
        while out.len() < len {
            let chunk = self.fill()?;
            if chunk.is_empty() {
                return Err(WireError::TruncatedInput);
            }
            let take = chunk.len().min(len - out.len());
            out.extend_from_slice(&chunk[..take]);
            self.consume(take);
        }
        Ok(out.freeze())
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn fill(&mut self) -> Result<&[u8]> {
        (**self).fill()
    }

    fn consume(&mut self, n: usize) {
        (**self).consume(n);
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        (**self).read_bytes(len)
    }
}

/// Source over any in-memory `bytes::Buf`: a byte slice, `Bytes`, or a
/// chain of chunks.
///
/// Reading a length-delimited value out of `Bytes` is zero-copy.
#[derive(Debug)]
pub struct BufSource<B> {
    inner: B,
}

impl<B: Buf> BufSource<B> {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Bytes not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }

    /// Unwrap the buffer, positioned after the last consumed byte
    #[must_use]
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Buf> Source for BufSource<B> {
    fn fill(&mut self) -> Result<&[u8]> {
        Ok(self.inner.chunk())
    }

    fn consume(&mut self, n: usize) {
        self.inner.advance(n);
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.inner.remaining() < len {
            return Err(WireError::TruncatedInput);
        }
        Ok(self.inner.copy_to_bytes(len))
    }
}

/// Blocking source over `std::io::Read`, buffered in chunks of
/// [`ReaderConfig::stream_buffer_size`](crate::ReaderConfig) bytes.
///
/// Interrupted reads are retried; every other stream error surfaces as
/// [`WireError::Io`] and an early end of stream as
/// [`WireError::TruncatedInput`] at the point a value needed more bytes.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: BufReader<R>,
}

impl<R: Read> StreamSource<R> {
    /// Wrap `inner` with a read buffer of `buffer_size` bytes (at least 1).
    #[must_use]
    pub fn new(inner: R, buffer_size: usize) -> Self {
        Self { inner: BufReader::with_capacity(buffer_size.max(1), inner) }
    }

    /// Unwrap the stream. Bytes already buffered but not consumed are lost.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Source for StreamSource<R> {
    fn fill(&mut self) -> Result<&[u8]> {
        loop {
            match self.inner.fill_buf() {
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(self.inner.buffer())
    }

    fn consume(&mut self, n: usize) {
        self.inner.consume(n);
    }
}
