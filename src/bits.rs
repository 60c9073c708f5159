//! Byte ↔ bit conversion used by every carrier.
//!
//! Bits are ordered MSB-first within each byte, so the first bit written into
//! a carrier is the high bit of the first frame byte.

use thiserror::Error;

/// Errors that can occur while rebuilding bytes from bits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitError {
    #[error("Bit count {bits} is not a multiple of 8")]
    LengthMismatch { bits: usize },
}

/// Number of bits needed to carry `bytes`.
pub fn bit_len(bytes: &[u8]) -> usize {
    bytes.len() * 8
}

/// Expands bytes into an ordered bit sequence (MSB-first per byte).
pub fn to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bit_len(bytes));
    for byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// Packs an ordered bit sequence back into bytes.
///
/// Fails with [`BitError::LengthMismatch`] unless `bits.len()` is a multiple of 8.
pub fn from_bits(bits: &[bool]) -> Result<Vec<u8>, BitError> {
    if bits.len() % 8 != 0 {
        return Err(BitError::LengthMismatch { bits: bits.len() });
    }

    Ok(bits
        .chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first_order() {
        let bits = to_bits(&[0b1000_0001, 0x40]);
        assert_eq!(bits.len(), 16);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[7]);
        assert!(!bits[8]);
        assert!(bits[9]);
    }

    #[test]
    fn test_roundtrip() {
        let data = b"hi there";
        assert_eq!(from_bits(&to_bits(data)).unwrap(), data);
    }

    #[test]
    fn test_empty() {
        assert!(to_bits(&[]).is_empty());
        assert!(from_bits(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let result = from_bits(&[true, false, true]);
        assert_eq!(result, Err(BitError::LengthMismatch { bits: 3 }));
    }
}
