//! Base-128 variable-length integers and the zigzag transform.
//!
//! A varint stores 7 value bits per byte, least significant group first, and
//! sets bit 7 on every byte except the last. A `u64` takes 1 to 10 bytes.
//!
//! Signed `sint32`/`sint64` fields are zigzag-mapped first so that values
//! close to zero stay short: `0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...`.
//! Plain `int32` fields are not: a negative `int32` is sign-extended to 64
//! bits and always takes 10 bytes, which is why [`decode_varint32`] keeps the
//! low 32 bits of a wider varint instead of rejecting it.

use bytes::{Buf, BufMut};

use crate::errors::{Result, WireError};

/// Longest possible encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Longest possible encoding of a `u32`.
pub const MAX_VARINT32_LEN: usize = 5;

/// Number of bytes [`encode_varint`] emits for `value`.
#[inline]
#[must_use]
pub const fn encoded_len_varint(value: u64) -> usize {
    // Bits needed, rounded up to groups of 7: (bits * 9 + 64) / 64 == ceil(bits / 7)
    // for 1..=64 bits. `| 1` keeps zero at one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits * 9 + 64) / 64
}

/// Encode `value` into a stack array, returning the array and the used length.
#[inline]
#[must_use]
pub fn encode_varint_array(mut value: u64) -> ([u8; MAX_VARINT_LEN], usize) {
    let mut out = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let low = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out[len] = low;
            len += 1;
            return (out, len);
        }
        out[len] = low | 0x80;
        len += 1;
    }
}

/// Append the varint encoding of `value` to `buf`.
#[inline]
pub fn encode_varint(value: u64, buf: &mut impl BufMut) {
    let (bytes, len) = encode_varint_array(value);
    buf.put_slice(&bytes[..len]);
}

/// Decode a varint from the front of `bytes`, returning the value and the
/// number of bytes it occupied.
///
/// # Errors
///
/// - [`WireError::TruncatedInput`] if `bytes` ends before the terminating byte
/// - [`WireError::MalformedVarint`] if ten bytes all carry the continuation bit
pub fn decode_varint_slice(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(WireError::MalformedVarint)
    } else {
        Err(WireError::TruncatedInput)
    }
}

/// Decode a varint from a possibly non-contiguous buffer, advancing it.
///
/// Reads byte-by-byte across chunk boundaries; the buffer is advanced past
/// every byte inspected, including on error.
///
/// # Errors
///
/// Same as [`decode_varint_slice`].
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64> {
    let chunk = buf.chunk();
    if chunk.len() >= MAX_VARINT_LEN || chunk.len() == buf.remaining() {
        let decoded = decode_varint_slice(chunk);
        let consumed = match decoded {
            Ok((_, len)) => len,
            Err(_) => chunk.len().min(MAX_VARINT_LEN),
        };
        buf.advance(consumed);
        return decoded.map(|(value, _)| value);
    }

    let mut result: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(WireError::TruncatedInput);
        }
        let byte = buf.get_u8();
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(WireError::MalformedVarint)
}

/// Decode a varint and keep its low 32 bits.
///
/// A negative `int32` written by a conforming encoder is sign-extended to a
/// 10-byte varint; truncation recovers the original value.
///
/// # Errors
///
/// Same as [`decode_varint_slice`].
#[inline]
pub fn decode_varint32(buf: &mut impl Buf) -> Result<u32> {
    #[allow(clippy::cast_possible_truncation)]
    decode_varint(buf).map(|value| value as u32)
}

/// Map a signed 32-bit value onto an unsigned one, small magnitudes first.
#[inline]
#[must_use]
pub const fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`].
#[inline]
#[must_use]
pub const fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Map a signed 64-bit value onto an unsigned one, small magnitudes first.
#[inline]
#[must_use]
pub const fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`].
#[inline]
#[must_use]
pub const fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
