//! Payload cipher: encrypts messages with a vault key before embedding.
//!
//! Every ciphertext is an envelope that starts with a scheme byte:
//!
//! ```text
//! 0x01 AES-256-GCM      : nonce (12) || ciphertext+tag
//! 0x02 RSA-OAEP hybrid  : wrapped key (256) || nonce (12) || ciphertext+tag
//! ```
//!
//! A scheme that doesn't match the key's algorithm, a truncated envelope, a
//! wrong key or a failed tag check all surface as [`CipherError::DecryptionFailed`].

use thiserror::Error;

use super::asymmetric;
use super::keys::{KeyAlgorithm, KeyHandle, KeyId, KeyMaterial, KeyVault, VaultError};
use super::symmetric;

/// Envelope scheme byte for AES-256-GCM.
pub const SCHEME_AES_GCM: u8 = 0x01;

/// Envelope scheme byte for RSA-OAEP + AES-256-GCM.
pub const SCHEME_RSA_HYBRID: u8 = 0x02;

/// Errors that can occur while encrypting or decrypting a payload.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("Decryption failed: wrong key or corrupted ciphertext")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

impl From<VaultError> for CipherError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::KeyNotFound(id) => Self::KeyNotFound(id),
            other => Self::EncryptionFailed(other.to_string()),
        }
    }
}

/// Exact envelope size for `plaintext_len` bytes under `algorithm`.
pub const fn sealed_len(algorithm: KeyAlgorithm, plaintext_len: usize) -> usize {
    1 + match algorithm {
        KeyAlgorithm::Aes256 => symmetric::sealed_len(plaintext_len),
        KeyAlgorithm::Rsa2048 => asymmetric::sealed_len(plaintext_len),
    }
}

/// Encrypts `plaintext` with the key referenced by `handle`.
pub fn encrypt(plaintext: &[u8], vault: &KeyVault, handle: &KeyHandle) -> Result<Vec<u8>, CipherError> {
    let body = vault.with_key(handle, |material| match material {
        KeyMaterial::Aes256(key) => symmetric::encrypt_aes(plaintext, key)
            .map(|body| (SCHEME_AES_GCM, body))
            .map_err(|e| CipherError::EncryptionFailed(e.to_string())),
        KeyMaterial::Rsa2048(key) => asymmetric::encrypt_to_bytes(plaintext, &key.to_public_key())
            .map(|body| (SCHEME_RSA_HYBRID, body))
            .map_err(|e| CipherError::EncryptionFailed(e.to_string())),
    })?;
    let (scheme, body) = body?;

    let mut envelope = Vec::with_capacity(1 + body.len());
    envelope.push(scheme);
    envelope.extend_from_slice(&body);
    Ok(envelope)
}

/// Decrypts an envelope produced by [`encrypt`].
pub fn decrypt(envelope: &[u8], vault: &KeyVault, handle: &KeyHandle) -> Result<Vec<u8>, CipherError> {
    let (&scheme, body) = envelope
        .split_first()
        .ok_or(CipherError::DecryptionFailed)?;

    vault.with_key(handle, |material| match (scheme, material) {
        (SCHEME_AES_GCM, KeyMaterial::Aes256(key)) => {
            symmetric::decrypt_aes(body, key).map_err(|_| CipherError::DecryptionFailed)
        }
        (SCHEME_RSA_HYBRID, KeyMaterial::Rsa2048(key)) => {
            asymmetric::decrypt_from_bytes(body, key).map_err(|_| CipherError::DecryptionFailed)
        }
        _ => Err(CipherError::DecryptionFailed),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_envelope_roundtrip() {
        let vault = KeyVault::new();
        let handle = vault.generate_key("aes", None).unwrap();

        let envelope = encrypt(b"hello", &vault, &handle).unwrap();
        assert_eq!(envelope[0], SCHEME_AES_GCM);
        assert_eq!(envelope.len(), sealed_len(KeyAlgorithm::Aes256, 5));

        assert_eq!(decrypt(&envelope, &vault, &handle).unwrap(), b"hello");
    }

    #[test]
    fn test_rsa_envelope_roundtrip() {
        let vault = KeyVault::new();
        let handle = vault.generate_key("rsa", Some("passphrase")).unwrap();

        let envelope = encrypt(b"hybrid payload", &vault, &handle).unwrap();
        assert_eq!(envelope[0], SCHEME_RSA_HYBRID);
        assert_eq!(envelope.len(), sealed_len(KeyAlgorithm::Rsa2048, 14));

        assert_eq!(decrypt(&envelope, &vault, &handle).unwrap(), b"hybrid payload");
    }

    #[test]
    fn test_wrong_key_fails() {
        let vault = KeyVault::new();
        let right = vault.generate_key("right", None).unwrap();
        let wrong = vault.generate_key("wrong", None).unwrap();

        let envelope = encrypt(b"secret", &vault, &right).unwrap();
        assert!(matches!(
            decrypt(&envelope, &vault, &wrong),
            Err(CipherError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_scheme_mismatch_fails() {
        let vault = KeyVault::new();
        let handle = vault.generate_key("aes", None).unwrap();

        let mut envelope = encrypt(b"secret", &vault, &handle).unwrap();
        envelope[0] = SCHEME_RSA_HYBRID;

        assert!(matches!(
            decrypt(&envelope, &vault, &handle),
            Err(CipherError::DecryptionFailed)
        ));
        assert!(matches!(
            decrypt(&[], &vault, &handle),
            Err(CipherError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_deleted_key_not_found() {
        let vault = KeyVault::new();
        let handle = vault.generate_key("gone", None).unwrap();
        vault.delete_key(&handle).unwrap();

        assert!(matches!(
            encrypt(b"x", &vault, &handle),
            Err(CipherError::KeyNotFound(_))
        ));
    }
}
