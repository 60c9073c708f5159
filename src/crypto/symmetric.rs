//! AES-256-GCM encryption with a raw 256-bit key.
//!
//! Output format: nonce (12 bytes) || ciphertext (includes 16-byte auth tag).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use super::keys::AES_KEY_LEN;

/// Nonce size for AES-GCM.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-GCM.
pub const TAG_SIZE: usize = 16;

/// Errors that can occur during symmetric encryption.
#[derive(Error, Debug)]
pub enum SymmetricError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid ciphertext: too short")]
    CiphertextTooShort,
}

/// Size of `encrypt_aes` output for a plaintext of `plaintext_len` bytes.
pub const fn sealed_len(plaintext_len: usize) -> usize {
    NONCE_SIZE + plaintext_len + TAG_SIZE
}

/// Encrypts data with AES-256-GCM under a fresh random nonce.
pub fn encrypt_aes(plaintext: &[u8], key: &[u8; AES_KEY_LEN]) -> Result<Vec<u8>, SymmetricError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| SymmetricError::EncryptionFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SymmetricError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypts `nonce || ciphertext` produced by [`encrypt_aes`].
pub fn decrypt_aes(data: &[u8], key: &[u8; AES_KEY_LEN]) -> Result<Vec<u8>, SymmetricError> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(SymmetricError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SymmetricError::DecryptionFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| SymmetricError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; AES_KEY_LEN];
        let plaintext = b"Hello, veilmark!";

        let encrypted = encrypt_aes(plaintext, &key).unwrap();
        assert_eq!(encrypted.len(), sealed_len(plaintext.len()));

        let decrypted = decrypt_aes(&encrypted, &key).unwrap();
        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt_aes(b"Secret data", &[1u8; AES_KEY_LEN]).unwrap();
        let result = decrypt_aes(&encrypted, &[2u8; AES_KEY_LEN]);

        assert!(matches!(result, Err(SymmetricError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [9u8; AES_KEY_LEN];
        let mut encrypted = encrypt_aes(b"tamper me", &key).unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;

        assert!(decrypt_aes(&encrypted, &key).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [3u8; AES_KEY_LEN];
        let encrypted = encrypt_aes(b"", &key).unwrap();
        assert!(decrypt_aes(&encrypted, &key).unwrap().is_empty());
    }

    #[test]
    fn test_ciphertext_too_short() {
        let result = decrypt_aes(&[0u8; 10], &[0u8; AES_KEY_LEN]);
        assert!(matches!(result, Err(SymmetricError::CiphertextTooShort)));
    }
}
