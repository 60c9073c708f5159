//! RSA-OAEP hybrid encryption.
//!
//! RSA cannot encrypt arbitrary-length payloads, so:
//! 1. Generate an ephemeral AES-256 key
//! 2. Encrypt the payload with it (AES-256-GCM)
//! 3. Wrap the ephemeral key with RSA-OAEP (SHA-256)
//! 4. Concatenate wrapped key, nonce and ciphertext

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::keys::{AES_KEY_LEN, RSA_BITS};
use super::symmetric::{self, NONCE_SIZE, TAG_SIZE};

/// Size of an RSA-2048 OAEP block (the wrapped ephemeral key).
pub const WRAPPED_KEY_LEN: usize = RSA_BITS / 8;

/// Errors that can occur during asymmetric encryption operations.
#[derive(Error, Debug)]
pub enum AsymmetricError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid ciphertext: too short")]
    CiphertextTooShort,
}

/// Encrypted data bundle: wrapped ephemeral key, nonce and ciphertext.
#[derive(Clone, Debug)]
pub struct EncryptedData {
    /// Ephemeral AES key encrypted with RSA-OAEP (256 bytes)
    pub wrapped_key: Vec<u8>,
    /// AES-GCM nonce (12 bytes)
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the auth tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serializes the encrypted data to bytes.
    ///
    /// Format: wrapped_key (256) || nonce (12) || ciphertext (variable)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result =
            Vec::with_capacity(self.wrapped_key.len() + NONCE_SIZE + self.ciphertext.len());
        result.extend_from_slice(&self.wrapped_key);
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserializes encrypted data from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, AsymmetricError> {
        if data.len() < WRAPPED_KEY_LEN + NONCE_SIZE + TAG_SIZE {
            return Err(AsymmetricError::CiphertextTooShort);
        }

        let (wrapped_key, rest) = data.split_at(WRAPPED_KEY_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            wrapped_key: wrapped_key.to_vec(),
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Size of the serialized bundle for a plaintext of `plaintext_len` bytes.
pub const fn sealed_len(plaintext_len: usize) -> usize {
    WRAPPED_KEY_LEN + symmetric::sealed_len(plaintext_len)
}

/// Encrypts data for the holder of `public_key`.
pub fn encrypt(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<EncryptedData, AsymmetricError> {
    let mut ephemeral = Zeroizing::new([0u8; AES_KEY_LEN]);
    OsRng.fill_bytes(&mut *ephemeral);

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &*ephemeral)
        .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()))?;

    let sealed = symmetric::encrypt_aes(plaintext, &ephemeral)
        .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()))?;
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);

    Ok(EncryptedData {
        wrapped_key,
        nonce,
        ciphertext: ciphertext.to_vec(),
    })
}

/// Decrypts a bundle with the recipient's private key.
pub fn decrypt(encrypted: &EncryptedData, private_key: &RsaPrivateKey) -> Result<Vec<u8>, AsymmetricError> {
    let unwrapped = Zeroizing::new(
        private_key
            .decrypt(Oaep::new::<Sha256>(), &encrypted.wrapped_key)
            .map_err(|_| AsymmetricError::DecryptionFailed)?,
    );

    let key: &[u8; AES_KEY_LEN] = unwrapped
        .as_slice()
        .try_into()
        .map_err(|_| AsymmetricError::DecryptionFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + encrypted.ciphertext.len());
    sealed.extend_from_slice(&encrypted.nonce);
    sealed.extend_from_slice(&encrypted.ciphertext);

    symmetric::decrypt_aes(&sealed, key).map_err(|_| AsymmetricError::DecryptionFailed)
}

/// Convenience function to encrypt bytes and return the serialized bundle.
pub fn encrypt_to_bytes(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, AsymmetricError> {
    Ok(encrypt(plaintext, public_key)?.to_bytes())
}

/// Convenience function to decrypt a serialized bundle.
pub fn decrypt_from_bytes(data: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, AsymmetricError> {
    let encrypted = EncryptedData::from_bytes(data)?;
    decrypt(&encrypted, private_key)
}
