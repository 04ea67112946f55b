//! Destinations for encoded bytes.
//!
//! [`WireWriter`](crate::WireWriter) stages bytes in its own block and hands
//! them to a [`Sink`] when the block fills or on flush. Four sinks cover the
//! embedder surface:
//!
//! - `Vec<u8>` / `BytesMut`: growable, never out of space
//! - [`SliceSink`]: a fixed-capacity `&mut [u8]`
//! - [`BufMutSink`]: any external `bytes::BufMut`, bounded by its
//!   `remaining_mut()`
//! - [`StreamSink`]: a blocking `std::io::Write`

use std::io::Write;

use bytes::{BufMut, BytesMut};

use crate::errors::{Result, WireError};

/// Sequential, append-only byte destination.
pub trait Sink {
    /// Append all of `bytes` or fail without a partial success.
    ///
    /// # Errors
    ///
    /// [`WireError::OutOfSpace`] for bounded sinks, [`WireError::Io`] for
    /// streams.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Bytes that can still be appended; `None` when unbounded.
    fn remaining(&self) -> Option<usize>;

    /// Push anything the sink buffers internally to its destination.
    ///
    /// # Errors
    ///
    /// Stream sinks propagate the stream's flush error.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl Sink for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn remaining(&self) -> Option<usize> {
        None
    }
}

impl Sink for BytesMut {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Fixed-capacity sink over a caller-owned byte slice.
#[derive(Debug)]
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    position: usize,
}

impl<'a> SliceSink<'a> {
    /// Wrap `buf`; writing starts at offset 0.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// Bytes written so far
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The written prefix of the slice
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.position]
    }
}

impl Sink for SliceSink<'_> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let remaining = self.buf.len() - self.position;
        if bytes.len() > remaining {
            return Err(WireError::OutOfSpace { needed: bytes.len(), remaining });
        }
        self.buf[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.buf.len() - self.position)
    }
}

/// Sink over an external `BufMut` (a `&mut [u8]` cursor, a pooled buffer...).
///
/// Capacity is whatever `remaining_mut()` reports, so growable `BufMut`s
/// behave as effectively unbounded.
#[derive(Debug)]
pub struct BufMutSink<B> {
    inner: B,
}

impl<B: BufMut> BufMutSink<B> {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Unwrap the buffer
    #[must_use]
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: BufMut> Sink for BufMutSink<B> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let remaining = self.inner.remaining_mut();
        if bytes.len() > remaining {
            return Err(WireError::OutOfSpace { needed: bytes.len(), remaining });
        }
        self.inner.put_slice(bytes);
        Ok(())
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.inner.remaining_mut())
    }
}

/// Blocking sink over `std::io::Write`.
///
/// Writes may block for as long as the stream blocks; there is no timeout
/// or cancellation at this layer.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
}

impl<W: Write> StreamSink<W> {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Borrow the stream
    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the stream. Bytes still staged in a writer are not included;
    /// flush the writer first.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for StreamSink<W> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(WireError::from)
    }

    fn remaining(&self) -> Option<usize> {
        None
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(WireError::from)
    }
}
