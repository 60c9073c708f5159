//! Cryptographic operations for veilmark.
//!
//! This module provides:
//! - The key vault (AES-256 and passphrase-derived RSA-2048 keys)
//! - Encrypted vault persistence (HKDF + ChaCha20Poly1305)
//! - Symmetric payload encryption (AES-256-GCM)
//! - Hybrid payload encryption (RSA-OAEP + AES-256-GCM)
//! - The payload cipher that selects between them per key

pub mod asymmetric;
pub mod cipher;
pub mod keys;
pub mod symmetric;
pub mod vault_store;

pub use asymmetric::{decrypt_from_bytes, encrypt_to_bytes, AsymmetricError, EncryptedData};
pub use cipher::{decrypt, encrypt, sealed_len, CipherError};
pub use keys::{KeyAlgorithm, KeyHandle, KeyId, KeyRecord, KeyVault, VaultError, SALT_LEN};
pub use symmetric::{decrypt_aes, encrypt_aes, SymmetricError};
pub use vault_store::VaultContext;
