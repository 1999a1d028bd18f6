//! This module contains the pure, stateless kernels for classifying and
//! decoding final-storage byte pairs, plus the matching encoders used to
//! synthesize conforming streams in tests and tools.
//!
//! Units are big-endian byte pairs. The first byte carries the tag: pairs
//! whose bits 4..2 are not all set are low-resolution values; the reserved
//! `0x1C` patterns subdivide into the special units below.

use crate::error::SiloError;

//==================================================================================
// 1. Classification
//==================================================================================

/// The semantic kind of one byte pair, as seen by the decode loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// A self-contained low-resolution value.
    Value,
    /// First half of a high-resolution value; the next pair must classify as
    /// `FourByteSecond`.
    FourByteFirst,
    /// Second half of a high-resolution value; invalid on its own.
    FourByteSecond,
    /// Start of a record; the pair embeds the record kind (array id).
    RecordStart,
    /// Filler (dummy) word padding a storage page.
    Filler,
    /// Unclassifiable pair.
    Unknown,
}

/// The filler word: reserved first byte with all remaining bits set.
pub const FILLER_UNIT: [u8; 2] = [0x7F, 0xFF];

/// Largest magnitude a low-resolution value can carry.
pub const MAX_LOW_RES_MAGNITUDE: u16 = 0x1BFF;

/// Largest mantissa a high-resolution value can carry.
pub const MAX_HIGH_RES_MANTISSA: u32 = 0x1_FFFF;

/// Largest record kind a record-start unit can embed.
pub const MAX_RECORD_KIND: i32 = 0x3FF;

const POW10: [f64; 4] = [1.0, 10.0, 100.0, 1000.0];

/// Determine the kind of the byte pair at the cursor.
pub fn classify(pair: [u8; 2]) -> UnitKind {
    let b0 = pair[0];
    if b0 & 0x1C != 0x1C {
        return UnitKind::Value;
    }
    if b0 == FILLER_UNIT[0] {
        if pair[1] == FILLER_UNIT[1] {
            return UnitKind::Filler;
        }
        return UnitKind::Unknown;
    }
    match b0 & 0xE0 {
        0x00 => UnitKind::FourByteFirst,
        0x20 => UnitKind::FourByteSecond,
        0xE0 => UnitKind::RecordStart,
        _ => UnitKind::Unknown,
    }
}

//==================================================================================
// 2. Decoding
//==================================================================================

/// Decode a low-resolution pair: sign bit, 2-bit decimal locator, 13-bit
/// magnitude.
pub fn decode_low_resolution(pair: [u8; 2]) -> f64 {
    let magnitude = (((pair[0] & 0x1F) as u16) << 8 | pair[1] as u16) as f64;
    let locator = ((pair[0] >> 5) & 0x03) as usize;
    let value = magnitude / POW10[locator];
    if pair[0] & 0x80 != 0 {
        -value
    } else {
        value
    }
}

/// Decode a high-resolution value from its two halves. The caller must have
/// classified `first` as `FourByteFirst` and `second` as `FourByteSecond`.
pub fn decode_high_resolution(first: [u8; 2], second: [u8; 2]) -> f64 {
    let hi = ((first[0] & 0x03) as u32) << 8 | first[1] as u32;
    let lo = ((second[0] & 0x03) as u32) << 8 | second[1] as u32;
    let mantissa = ((hi & 0x7F) << 10 | lo) as f64;
    let exponent = ((hi >> 7) & 0x03) as usize;
    let value = mantissa / POW10[exponent];
    if hi & 0x200 != 0 {
        -value
    } else {
        value
    }
}

/// Extract the record kind embedded in a record-start pair.
pub fn record_kind(pair: [u8; 2]) -> i32 {
    (((pair[0] & 0x03) as i32) << 8) | pair[1] as i32
}

//==================================================================================
// 3. Encoding (fixture synthesis)
//==================================================================================

/// Encode a record-start unit for the given record kind.
pub fn encode_record_start(kind: i32) -> Result<[u8; 2], SiloError> {
    if !(0..=MAX_RECORD_KIND).contains(&kind) {
        return Err(SiloError::Unrepresentable(kind as f64));
    }
    Ok([0xFC | ((kind >> 8) as u8 & 0x03), (kind & 0xFF) as u8])
}

/// Encode a low-resolution value from its raw components.
pub fn encode_low_resolution_parts(
    magnitude: u16,
    locator: u8,
    negative: bool,
) -> Result<[u8; 2], SiloError> {
    if magnitude > MAX_LOW_RES_MAGNITUDE || locator > 3 {
        return Err(SiloError::Unrepresentable(magnitude as f64));
    }
    let mut b0 = ((magnitude >> 8) as u8 & 0x1F) | (locator << 5);
    if negative {
        b0 |= 0x80;
    }
    // The reserved patterns are unreachable: magnitude <= 0x1BFF keeps
    // bits 4..2 of b0 below 0x1C.
    Ok([b0, (magnitude & 0xFF) as u8])
}

/// Encode a value as a low-resolution pair, choosing the largest decimal
/// locator that represents it exactly.
pub fn encode_low_resolution(value: f64) -> Result<[u8; 2], SiloError> {
    let negative = value.is_sign_negative();
    let abs = value.abs();
    for locator in (0..=3u8).rev() {
        let scaled = abs * POW10[locator as usize];
        let magnitude = scaled.round();
        if magnitude > MAX_LOW_RES_MAGNITUDE as f64 {
            continue;
        }
        if magnitude / POW10[locator as usize] == abs {
            return encode_low_resolution_parts(magnitude as u16, locator, negative);
        }
    }
    Err(SiloError::Unrepresentable(value))
}

/// Encode a high-resolution value from its raw components.
pub fn encode_high_resolution_parts(
    mantissa: u32,
    exponent: u8,
    negative: bool,
) -> Result<[u8; 4], SiloError> {
    if mantissa > MAX_HIGH_RES_MANTISSA || exponent > 3 {
        return Err(SiloError::Unrepresentable(mantissa as f64));
    }
    let mut hi = ((exponent as u32) << 7) | (mantissa >> 10);
    if negative {
        hi |= 0x200;
    }
    let lo = mantissa & 0x3FF;
    Ok([
        0x1C | (hi >> 8) as u8,
        (hi & 0xFF) as u8,
        0x3C | (lo >> 8) as u8,
        (lo & 0xFF) as u8,
    ])
}

/// Encode a value as a high-resolution pair of units, choosing the largest
/// exponent that represents it exactly.
pub fn encode_high_resolution(value: f64) -> Result<[u8; 4], SiloError> {
    let negative = value.is_sign_negative();
    let abs = value.abs();
    for exponent in (0..=3u8).rev() {
        let scaled = abs * POW10[exponent as usize];
        let mantissa = scaled.round();
        if mantissa > MAX_HIGH_RES_MANTISSA as f64 {
            continue;
        }
        if mantissa / POW10[exponent as usize] == abs {
            return encode_high_resolution_parts(mantissa as u32, exponent, negative);
        }
    }
    Err(SiloError::Unrepresentable(value))
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_low_resolution_pairs() {
        assert_eq!(classify([0x00, 0x00]), UnitKind::Value);
        assert_eq!(classify([0x1B, 0xFF]), UnitKind::Value);
        assert_eq!(classify([0x80, 0x01]), UnitKind::Value);
        assert_eq!(classify([0xE3, 0x12]), UnitKind::Value);
    }

    #[test]
    fn classify_special_pairs() {
        assert_eq!(classify([0x1C, 0x00]), UnitKind::FourByteFirst);
        assert_eq!(classify([0x1F, 0xAB]), UnitKind::FourByteFirst);
        assert_eq!(classify([0x3C, 0x00]), UnitKind::FourByteSecond);
        assert_eq!(classify([0xFC, 0x01]), UnitKind::RecordStart);
        assert_eq!(classify([0xFF, 0xFF]), UnitKind::RecordStart);
        assert_eq!(classify(FILLER_UNIT), UnitKind::Filler);
        assert_eq!(classify([0x7F, 0x00]), UnitKind::Unknown);
        assert_eq!(classify([0x5C, 0x00]), UnitKind::Unknown);
        assert_eq!(classify([0x9C, 0x00]), UnitKind::Unknown);
    }

    #[test]
    fn low_resolution_roundtrip() {
        for &v in &[0.0, 1.0, -1.0, 7.5, -123.4, 7167.0, -7.167, 0.001] {
            let pair = encode_low_resolution(v).unwrap();
            assert_eq!(classify(pair), UnitKind::Value, "value {v}");
            assert_eq!(decode_low_resolution(pair), v, "value {v}");
        }
    }

    #[test]
    fn low_resolution_rejects_out_of_range() {
        assert!(encode_low_resolution(7168.0).is_err());
        assert!(encode_low_resolution(0.0001).is_err());
    }

    #[test]
    fn high_resolution_roundtrip_bit_for_bit() {
        // Representative magnitudes, including the maximum representable value.
        for &v in &[
            0.0,
            7.0,
            -7.0,
            49500.0,
            131.071,
            -0.003,
            99999.0,
            131071.0,
            -131071.0,
        ] {
            let bytes = encode_high_resolution(v).unwrap();
            let first = [bytes[0], bytes[1]];
            let second = [bytes[2], bytes[3]];
            assert_eq!(classify(first), UnitKind::FourByteFirst);
            assert_eq!(classify(second), UnitKind::FourByteSecond);
            let decoded = decode_high_resolution(first, second);
            assert_eq!(decoded.to_bits(), v.to_bits(), "value {v}");
        }
    }

    #[test]
    fn high_resolution_component_roundtrip() {
        let bytes = encode_high_resolution_parts(MAX_HIGH_RES_MANTISSA, 0, false).unwrap();
        let decoded = decode_high_resolution([bytes[0], bytes[1]], [bytes[2], bytes[3]]);
        assert_eq!(decoded, 131071.0);

        let bytes = encode_high_resolution_parts(12345, 2, true).unwrap();
        let decoded = decode_high_resolution([bytes[0], bytes[1]], [bytes[2], bytes[3]]);
        assert_eq!(decoded, -123.45);
    }

    #[test]
    fn record_start_roundtrip() {
        for kind in [0, 1, 2, 101, 255, 256, MAX_RECORD_KIND] {
            let pair = encode_record_start(kind).unwrap();
            assert_eq!(classify(pair), UnitKind::RecordStart);
            assert_eq!(record_kind(pair), kind);
        }
        assert!(encode_record_start(MAX_RECORD_KIND + 1).is_err());
    }
}
