//! Steganography module for hiding data in various carriers.
//!
//! Supports:
//! - Image LSB steganography (PNG, BMP and other lossless formats)
//! - URL query-parameter steganography
//! - Emoji zero-width marker steganography
//!
//! All carriers share the same frame format ([`frame`]) and payload cipher,
//! and walk the same phase machine ([`state`]).

pub mod emoji;
pub mod frame;
pub mod image;
pub mod state;
pub mod url;

pub use emoji::EmojiStego;
pub use frame::{CorruptionReason, Header, HeaderScan};
pub use image::ImageStego;
pub use state::{Operation, Phase, PhaseTracker};
pub use url::UrlStego;

use thiserror::Error;
use tracing::warn;

use crate::capacity::CapacityError;
use crate::crypto::{self, CipherError, KeyAlgorithm, KeyHandle, KeyId, KeyVault, VaultError};
use frame::FrameError;

/// Errors that can occur during embedding or extraction.
///
/// `NotFound` and `Corrupted` are not errors: they are [`ExtractResult`] variants.
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("Insufficient capacity: need {required} bits, carrier holds {available}")]
    InsufficientCapacity { required: usize, available: usize },

    #[error("Message too large: {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge { len: usize, max: usize },

    #[error("Key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("Decryption failed: wrong key or corrupted ciphertext")]
    DecryptionFailed,

    #[error("Payload is encrypted; a key is required to read it")]
    KeyRequired,

    #[error("Invalid carrier: {0}")]
    InvalidCarrier(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

impl From<CapacityError> for StegoError {
    fn from(err: CapacityError) -> Self {
        match err {
            CapacityError::InsufficientCapacity { required, available } => {
                Self::InsufficientCapacity { required, available }
            }
        }
    }
}

impl From<CipherError> for StegoError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::KeyNotFound(id) => Self::KeyNotFound(id),
            CipherError::DecryptionFailed => Self::DecryptionFailed,
            CipherError::EncryptionFailed(msg) => Self::EncryptionFailed(msg),
        }
    }
}

impl From<FrameError> for StegoError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { len, max } => Self::MessageTooLarge { len, max },
        }
    }
}

impl From<VaultError> for StegoError {
    fn from(err: VaultError) -> Self {
        CipherError::from(err).into()
    }
}

/// Result of embedding a message into a carrier.
#[derive(Debug, Clone)]
pub struct EmbedResult<C> {
    /// The modified carrier.
    pub carrier: C,
    /// True if the output keeps the carrier's native format and every sample
    /// outside the embedded region is untouched.
    pub lossless: bool,
    /// Bits written (header + payload).
    pub used_bits: usize,
    /// Bits the carrier could hold.
    pub available_bits: usize,
}

impl<C> EmbedResult<C> {
    /// Consumes the result and returns the modified carrier.
    pub fn into_carrier(self) -> C {
        self.carrier
    }
}

/// Result of looking for a message in a carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractResult {
    /// A valid frame was found.
    Found { message: Vec<u8>, encrypted: bool },
    /// No frame or marker is present.
    NotFound,
    /// A frame is present but cannot be trusted.
    Corrupted(CorruptionReason),
}

impl ExtractResult {
    /// Returns the message if one was found.
    pub fn message(&self) -> Option<&[u8]> {
        match self {
            Self::Found { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Returns true if a message was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Size in bits of the frame that [`prepare_frame`] will produce.
///
/// Used for the capacity check, which must happen before encryption.
pub(crate) fn planned_frame_bits(
    message_len: usize,
    vault: &KeyVault,
    key: Option<&KeyHandle>,
) -> Result<usize, StegoError> {
    let payload_len = match key {
        Some(handle) => {
            let algorithm: KeyAlgorithm = vault.record(handle)?.algorithm;
            crypto::sealed_len(algorithm, message_len)
        }
        None => message_len,
    };
    if payload_len > frame::MAX_PAYLOAD_LEN {
        return Err(StegoError::MessageTooLarge {
            len: payload_len,
            max: frame::MAX_PAYLOAD_LEN,
        });
    }
    Ok(frame::frame_len(payload_len) * 8)
}

/// Encrypts (if a key is given) and frames `message`.
pub(crate) fn prepare_frame(
    message: &[u8],
    vault: &KeyVault,
    key: Option<&KeyHandle>,
) -> Result<Vec<u8>, StegoError> {
    match key {
        Some(handle) => {
            let envelope = crypto::encrypt(message, vault, handle)?;
            Ok(frame::build_frame(&envelope, true)?)
        }
        None => Ok(frame::build_frame(message, false)?),
    }
}

/// Decrypts a found payload if needed.
///
/// Plain payloads are returned as-is even when a key is supplied.
pub(crate) fn finish_extraction(
    raw: ExtractResult,
    vault: &KeyVault,
    key: Option<&KeyHandle>,
) -> Result<ExtractResult, StegoError> {
    match raw {
        ExtractResult::Found {
            message,
            encrypted: true,
        } => {
            let handle = key.ok_or(StegoError::KeyRequired)?;
            let plaintext = crypto::decrypt(&message, vault, handle)?;
            Ok(ExtractResult::Found {
                message: plaintext,
                encrypted: true,
            })
        }
        ExtractResult::Corrupted(reason) => {
            warn!(%reason, "embedded frame is corrupted");
            Ok(ExtractResult::Corrupted(reason))
        }
        other => Ok(other),
    }
}
