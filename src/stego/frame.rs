//! Frame construction and parsing.
//!
//! The frame is what every carrier actually stores: a fixed header followed
//! by the (possibly encrypted) payload.
//!
//! ```text
//! [4 bytes] MAGIC    0x564D4B31 ("VMK1")
//! [1 byte ] FLAGS    high nibble = version, bit 0 = encrypted
//! [3 bytes] LENGTH   payload byte count (big-endian u24)
//! [4 bytes] CHECKSUM CRC-32 of FLAGS || LENGTH || payload (big-endian)
//! [N bytes] payload
//! ```
//!
//! The magic allows fast "nothing here" detection, LENGTH tells the extractor
//! exactly how many bits to read, and the CRC catches corruption or tampering.

use thiserror::Error;

use super::ExtractResult;
use crate::bits;

/// Frame magic ("VMK1").
pub const MAGIC: u32 = 0x564D_4B31;

/// Current frame format version.
pub const FRAME_VERSION: u8 = 1;

/// Header length in bytes.
pub const HEADER_LEN: usize = 12;

/// Header length in bits.
pub const HEADER_BITS: usize = HEADER_LEN * 8;

/// Largest payload the 24-bit LENGTH field can describe.
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

const FLAG_ENCRYPTED: u8 = 0x01;
const FLAG_RESERVED: u8 = 0x0E;

/// A magic word within this Hamming distance of [`MAGIC`] is a damaged header.
///
/// Random data lands this close with probability ~1.2e-7.
const MAGIC_TOLERANCE: u32 = 2;

/// Why a frame was found but could not be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptionReason {
    #[error("header magic is damaged")]
    DamagedMagic,

    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),

    #[error("reserved flag bits set: {0:#04x}")]
    ReservedFlags(u8),

    #[error("frame declares {declared} payload bytes but the carrier holds only {available}")]
    Truncated { declared: usize, available: usize },

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Errors that can occur while building a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes.
    pub length: usize,
    /// Whether the payload is a cipher envelope.
    pub encrypted: bool,
    /// Stored CRC-32.
    pub checksum: u32,
    flags: u8,
}

/// Outcome of looking for a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderScan {
    Found(Header),
    Absent,
    Damaged(CorruptionReason),
}

/// Total frame size for a payload of `payload_len` bytes.
pub const fn frame_len(payload_len: usize) -> usize {
    HEADER_LEN + payload_len
}

/// Builds a frame around `payload`.
pub fn build_frame(payload: &[u8], encrypted: bool) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let flags = (FRAME_VERSION << 4) | if encrypted { FLAG_ENCRYPTED } else { 0 };
    let length = length_bytes(payload.len());
    let checksum = checksum(flags, &length, payload);

    let mut frame = Vec::with_capacity(frame_len(payload.len()));
    frame.extend_from_slice(&MAGIC.to_be_bytes());
    frame.push(flags);
    frame.extend_from_slice(&length);
    frame.extend_from_slice(&checksum.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Inspects the first [`HEADER_LEN`] bytes read from a carrier.
pub fn scan_header(bytes: &[u8; HEADER_LEN]) -> HeaderScan {
    let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let distance = (magic ^ MAGIC).count_ones();
    if distance > MAGIC_TOLERANCE {
        return HeaderScan::Absent;
    }
    if distance > 0 {
        return HeaderScan::Damaged(CorruptionReason::DamagedMagic);
    }

    let flags = bytes[4];
    let version = flags >> 4;
    if version != FRAME_VERSION {
        return HeaderScan::Damaged(CorruptionReason::UnsupportedVersion(version));
    }
    if flags & FLAG_RESERVED != 0 {
        return HeaderScan::Damaged(CorruptionReason::ReservedFlags(flags & FLAG_RESERVED));
    }

    let length = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]) as usize;
    let checksum = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    HeaderScan::Found(Header {
        length,
        encrypted: flags & FLAG_ENCRYPTED != 0,
        checksum,
        flags,
    })
}

/// Returns true if `bytes` starts with the frame magic or a damaged copy of it.
pub fn resembles_frame(bytes: &[u8]) -> bool {
    match bytes.get(..4) {
        Some(prefix) => {
            let magic = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
            (magic ^ MAGIC).count_ones() <= MAGIC_TOLERANCE
        }
        None => false,
    }
}

impl Header {
    /// Verifies the stored checksum against `payload`.
    pub fn verify(&self, payload: &[u8]) -> Result<(), CorruptionReason> {
        let computed = checksum(self.flags, &length_bytes(self.length), payload);
        if computed != self.checksum {
            return Err(CorruptionReason::ChecksumMismatch {
                stored: self.checksum,
                computed,
            });
        }
        Ok(())
    }
}

/// Opens a complete frame held in memory.
///
/// The returned [`ExtractResult::Found`] carries the raw payload, which is
/// still a cipher envelope when `encrypted` is set.
pub fn open_frame(bytes: &[u8]) -> ExtractResult {
    let Some(header_bytes) = bytes.get(..HEADER_LEN) else {
        return ExtractResult::NotFound;
    };
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(header_bytes);

    match scan_header(&header) {
        HeaderScan::Absent => ExtractResult::NotFound,
        HeaderScan::Damaged(reason) => ExtractResult::Corrupted(reason),
        HeaderScan::Found(header) => {
            let body = &bytes[HEADER_LEN..];
            if header.length > body.len() {
                return ExtractResult::Corrupted(CorruptionReason::Truncated {
                    declared: header.length,
                    available: body.len(),
                });
            }
            let payload = &body[..header.length];
            match header.verify(payload) {
                Ok(()) => ExtractResult::Found {
                    message: payload.to_vec(),
                    encrypted: header.encrypted,
                },
                Err(reason) => ExtractResult::Corrupted(reason),
            }
        }
    }
}

/// Reads a frame from a carrier's bit stream.
///
/// Only the header and the declared payload are consumed; anything after
/// them is never read.
pub fn read_frame(mut stream: impl Iterator<Item = bool>) -> ExtractResult {
    let mut frame = take_bytes(&mut stream, HEADER_LEN);
    if frame.len() < HEADER_LEN {
        return ExtractResult::NotFound;
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&frame);
    if let HeaderScan::Found(found) = scan_header(&header) {
        frame.extend(take_bytes(&mut stream, found.length));
    }
    open_frame(&frame)
}

/// Takes up to `count` whole bytes from a bit stream.
fn take_bytes(stream: &mut impl Iterator<Item = bool>, count: usize) -> Vec<u8> {
    let mut taken: Vec<bool> = stream.take(count * 8).collect();
    taken.truncate(taken.len() / 8 * 8);
    bits::from_bits(&taken).unwrap_or_default()
}

fn length_bytes(length: usize) -> [u8; 3] {
    let be = (length as u32).to_be_bytes();
    [be[1], be[2], be[3]]
}

fn checksum(flags: u8, length: &[u8; 3], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[flags]);
    hasher.update(length);
    hasher.update(payload);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = build_frame(b"hi", false).unwrap();
        assert_eq!(frame.len(), HEADER_LEN + 2);
        assert_eq!(&frame[..4], b"VMK1");
        assert_eq!(frame[4], 0x10);
        assert_eq!(&frame[5..8], &[0, 0, 2]);
        assert_eq!(&frame[12..], b"hi");
    }

    #[test]
    fn test_open_roundtrip() {
        let frame = build_frame(b"payload", true).unwrap();
        assert_eq!(
            open_frame(&frame),
            ExtractResult::Found {
                message: b"payload".to_vec(),
                encrypted: true
            }
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut frame = build_frame(b"abc", false).unwrap();
        frame.extend_from_slice(&[0xAA; 20]);
        assert!(matches!(open_frame(&frame), ExtractResult::Found { .. }));
    }

    #[test]
    fn test_no_magic_is_not_found() {
        assert_eq!(open_frame(&[0u8; 32]), ExtractResult::NotFound);
        assert_eq!(open_frame(b"short"), ExtractResult::NotFound);
    }

    #[test]
    fn test_every_single_bit_flip_is_detected() {
        let frame = build_frame(b"tamper evident", false).unwrap();
        for bit in 0..frame.len() * 8 {
            let mut tampered = frame.clone();
            tampered[bit / 8] ^= 0x80 >> (bit % 8);
            assert!(
                matches!(open_frame(&tampered), ExtractResult::Corrupted(_)),
                "bit {} flip went undetected",
                bit
            );
        }
    }

    #[test]
    fn test_truncated_frame() {
        let frame = build_frame(b"0123456789", false).unwrap();
        let result = open_frame(&frame[..HEADER_LEN + 4]);
        assert_eq!(
            result,
            ExtractResult::Corrupted(CorruptionReason::Truncated {
                declared: 10,
                available: 4
            })
        );
    }

    #[test]
    fn test_payload_too_large() {
        let big = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            build_frame(&big, false),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_resembles_frame() {
        let frame = build_frame(b"", false).unwrap();
        assert!(resembles_frame(&frame));
        assert!(resembles_frame(b"VMK0"));
        assert!(!resembles_frame(b"VMK"));
        assert!(!resembles_frame(b"hello world"));
    }

    #[test]
    fn test_read_frame_from_bits() {
        let frame = build_frame(b"bits", false).unwrap();
        let mut stream = bits::to_bits(&frame);
        stream.extend([true; 13]);
        assert_eq!(
            read_frame(stream.into_iter()),
            ExtractResult::Found {
                message: b"bits".to_vec(),
                encrypted: false
            }
        );
        assert_eq!(read_frame([false; 40].into_iter()), ExtractResult::NotFound);
    }
}
