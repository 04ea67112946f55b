//! Little-endian fixed-width values.
//!
//! `fixed32`, `sfixed32` and `float` travel as 4 raw bytes; `fixed64`,
//! `sfixed64` and `double` as 8. Byte 0 is the least significant. Floats are
//! carried by their IEEE-754 bit pattern.

use bytes::{Buf, BufMut};

use crate::errors::{Result, WireError};

/// Encoded size of a 32-bit fixed value.
pub const FIXED32_LEN: usize = 4;

/// Encoded size of a 64-bit fixed value.
pub const FIXED64_LEN: usize = 8;

/// Append `value` as 4 little-endian bytes.
#[inline]
pub fn encode_fixed32(value: u32, buf: &mut impl BufMut) {
    buf.put_u32_le(value);
}

/// Append `value` as 8 little-endian bytes.
#[inline]
pub fn encode_fixed64(value: u64, buf: &mut impl BufMut) {
    buf.put_u64_le(value);
}

/// Read 4 little-endian bytes.
///
/// # Errors
///
/// Returns [`WireError::TruncatedInput`] if fewer than 4 bytes remain. The
/// buffer is not advanced in that case.
#[inline]
pub fn decode_fixed32(buf: &mut impl Buf) -> Result<u32> {
    if buf.remaining() < FIXED32_LEN {
        return Err(WireError::TruncatedInput);
    }
    Ok(buf.get_u32_le())
}

/// Read 8 little-endian bytes.
///
/// # Errors
///
/// Returns [`WireError::TruncatedInput`] if fewer than 8 bytes remain. The
/// buffer is not advanced in that case.
#[inline]
pub fn decode_fixed64(buf: &mut impl Buf) -> Result<u64> {
    if buf.remaining() < FIXED64_LEN {
        return Err(WireError::TruncatedInput);
    }
    Ok(buf.get_u64_le())
}

/// Bit pattern of a `float` field.
#[inline]
#[must_use]
pub fn float_to_fixed32(value: f32) -> u32 {
    value.to_bits()
}

/// `float` from its wire bit pattern.
#[inline]
#[must_use]
pub fn fixed32_to_float(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Bit pattern of a `double` field.
#[inline]
#[must_use]
pub fn double_to_fixed64(value: f64) -> u64 {
    value.to_bits()
}

/// `double` from its wire bit pattern.
#[inline]
#[must_use]
pub fn fixed64_to_double(bits: u64) -> f64 {
    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn fixed32_byte_order() {
        let mut buf = Vec::new();
        encode_fixed32(0x1234_5678, &mut buf);
        assert_eq!(buf, [0x78, 0x56, 0x34, 0x12]);

        let mut buf = Vec::new();
        encode_fixed32(0x9abc_def0, &mut buf);
        assert_eq!(buf, [0xf0, 0xde, 0xbc, 0x9a]);
        assert_eq!(decode_fixed32(&mut &buf[..]).unwrap(), 0x9abc_def0);
    }

    #[test]
    fn fixed64_byte_order() {
        let mut buf = Vec::new();
        encode_fixed64(0x1234_5678_9abc_def0, &mut buf);
        assert_eq!(buf, [0xf0, 0xde, 0xbc, 0x9a, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(decode_fixed64(&mut &buf[..]).unwrap(), 0x1234_5678_9abc_def0);
    }

    #[test]
    fn short_input_is_truncated_and_not_consumed() {
        let mut slice: &[u8] = &[1, 2, 3];
        assert_eq!(decode_fixed32(&mut slice), Err(WireError::TruncatedInput));
        assert_eq!(slice.len(), 3);

        let mut slice: &[u8] = &[1, 2, 3, 4, 5, 6, 7];
        assert_eq!(decode_fixed64(&mut slice), Err(WireError::TruncatedInput));
        assert_eq!(slice.len(), 7);
    }

    #[test]
    fn floats_use_ieee_bits() {
        assert_eq!(float_to_fixed32(1.0), 0x3f80_0000);
        assert_eq!(double_to_fixed64(-2.5), 0xc004_0000_0000_0000);
        assert!(fixed64_to_double(double_to_fixed64(f64::NAN)).is_nan());
    }

    proptest! {
        #[test]
        fn fixed32_round_trip(value in any::<u32>()) {
            let mut buf = Vec::new();
            encode_fixed32(value, &mut buf);
            prop_assert_eq!(buf.len(), FIXED32_LEN);
            prop_assert_eq!(decode_fixed32(&mut &buf[..]).unwrap(), value);
        }

        #[test]
        fn fixed64_round_trip(value in any::<u64>()) {
            let mut buf = Vec::new();
            encode_fixed64(value, &mut buf);
            prop_assert_eq!(buf.len(), FIXED64_LEN);
            prop_assert_eq!(decode_fixed64(&mut &buf[..]).unwrap(), value);
        }

        #[test]
        fn float_bits_round_trip(value in any::<f32>()) {
            prop_assert_eq!(fixed32_to_float(float_to_fixed32(value)).to_bits(), value.to_bits());
        }
    }
}
