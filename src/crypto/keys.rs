//! Key vault for veilmark.
//!
//! The vault owns every [`KeyRecord`] together with its secret material and
//! hands callers opaque [`KeyHandle`]s. Raw key bytes never leave this module
//! except through [`KeyVault::with_key`], which is crate-private and used by
//! the payload cipher.
//!
//! Two kinds of keys exist:
//! - `AES-256`: 256 random bits from the OS RNG (no passphrase).
//! - `RSA-2048`: generated by a prime search driven by a ChaCha20 CSPRNG whose
//!   seed is Argon2id(passphrase, salt). The salt is random and stored in the
//!   record, so the same passphrase + salt always reproduces the same key.

use std::fmt;

use argon2::Argon2;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

/// Length of the Argon2 salt stored in passphrase-derived records.
pub const SALT_LEN: usize = 16;

/// AES-256 key length in bytes.
pub const AES_KEY_LEN: usize = 32;

/// RSA modulus size in bits.
pub const RSA_BITS: usize = 2048;

/// Length of random key identifiers, in bytes.
const KEY_ID_LEN: usize = 16;

/// Errors that can occur during vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Key label must not be empty")]
    EmptyLabel,

    #[error("A key labelled '{0}' already exists")]
    DuplicateLabel(String),

    #[error("Key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key data: {0}")]
    InvalidKeyData(String),

    #[error("Vault could not be unsealed (wrong context or corrupted file)")]
    Unseal,

    #[error("Unsupported vault format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Key algorithm of a vault record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "AES-256")]
    Aes256,
    #[serde(rename = "RSA-2048")]
    Rsa2048,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes256 => f.write_str("AES-256"),
            Self::Rsa2048 => f.write_str("RSA-2048"),
        }
    }
}

/// Identifier of a vault record (hex-encoded random bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    fn random() -> Self {
        let mut bytes = [0u8; KEY_ID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a key held by a [`KeyVault`].
///
/// A handle outlives the key it references: once the key is deleted every
/// operation using the handle fails with [`VaultError::KeyNotFound`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyHandle {
    id: KeyId,
}

impl KeyHandle {
    /// Returns the identifier of the referenced record.
    pub fn id(&self) -> &KeyId {
        &self.id
    }
}

/// Public metadata of a vault key. Never contains key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: KeyId,
    pub label: String,
    pub algorithm: KeyAlgorithm,
    pub created_at: DateTime<Utc>,
    /// Argon2 salt, present only for passphrase-derived keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<[u8; SALT_LEN]>,
}

impl KeyRecord {
    /// Returns a handle referencing this record.
    pub fn handle(&self) -> KeyHandle {
        KeyHandle {
            id: self.id.clone(),
        }
    }
}

/// Secret key material. Only the payload cipher and the vault store see it.
pub(crate) enum KeyMaterial {
    Aes256(Zeroizing<[u8; AES_KEY_LEN]>),
    Rsa2048(Box<RsaPrivateKey>),
}

impl KeyMaterial {
    pub(crate) fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Aes256(_) => KeyAlgorithm::Aes256,
            Self::Rsa2048(_) => KeyAlgorithm::Rsa2048,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyMaterial")
            .field(&self.algorithm())
            .field(&"[REDACTED]")
            .finish()
    }
}

/// A record together with its material.
#[derive(Debug)]
pub(crate) struct StoredKey {
    pub(crate) record: KeyRecord,
    pub(crate) material: KeyMaterial,
}

/// Thread-safe key vault.
///
/// Writes (`generate_key`, `delete_key`) are serialized by a write lock, so the
/// label-uniqueness invariant holds under concurrent callers. Reads proceed
/// concurrently.
#[derive(Default)]
pub struct KeyVault {
    entries: RwLock<Vec<StoredKey>>,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("keys", &self.len())
            .finish()
    }
}

impl KeyVault {
    /// Creates an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<StoredKey>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Generates a new key under `label`.
    ///
    /// Without a passphrase (or with an empty one) the key is a random AES-256
    /// key. With a passphrase it is an RSA-2048 key derived from the passphrase
    /// and a freshly generated salt.
    pub fn generate_key(
        &self,
        label: &str,
        passphrase: Option<&str>,
    ) -> Result<KeyHandle, VaultError> {
        let label = normalize_label(label)?;

        // Key generation can take a while; fail fast before doing it.
        if self.handle_for_label(&label).is_some() {
            return Err(VaultError::DuplicateLabel(label));
        }

        let (material, salt) = match passphrase.filter(|p| !p.is_empty()) {
            None => (generate_aes_key(), None),
            Some(passphrase) => {
                let mut salt = [0u8; SALT_LEN];
                OsRng.fill_bytes(&mut salt);
                (derive_rsa_key(passphrase, &salt)?, Some(salt))
            }
        };

        self.insert(label, material, salt)
    }

    /// Re-creates a passphrase-derived RSA-2048 key from its passphrase and the
    /// salt recorded when it was first generated.
    pub fn recover_key(
        &self,
        label: &str,
        passphrase: &str,
        salt: [u8; SALT_LEN],
    ) -> Result<KeyHandle, VaultError> {
        let label = normalize_label(label)?;
        if self.handle_for_label(&label).is_some() {
            return Err(VaultError::DuplicateLabel(label));
        }

        let material = derive_rsa_key(passphrase, &salt)?;
        self.insert(label, material, Some(salt))
    }

    fn insert(
        &self,
        label: String,
        material: KeyMaterial,
        salt: Option<[u8; SALT_LEN]>,
    ) -> Result<KeyHandle, VaultError> {
        let mut entries = self.entries.write();

        // Re-check under the write lock: another caller may have won the race.
        if entries.iter().any(|entry| entry.record.label == label) {
            return Err(VaultError::DuplicateLabel(label));
        }

        let record = KeyRecord {
            id: KeyId::random(),
            label,
            algorithm: material.algorithm(),
            created_at: Utc::now(),
            salt,
        };
        let handle = record.handle();

        info!(id = %record.id, label = %record.label, algorithm = %record.algorithm, "key generated");
        entries.push(StoredKey { record, material });

        Ok(handle)
    }

    /// Deletes the key referenced by `handle`, returning its record.
    pub fn delete_key(&self, handle: &KeyHandle) -> Result<KeyRecord, VaultError> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|entry| entry.record.id == handle.id)
            .ok_or_else(|| VaultError::KeyNotFound(handle.id.clone()))?;

        let removed = entries.remove(index);
        info!(id = %removed.record.id, label = %removed.record.label, "key deleted");
        Ok(removed.record)
    }

    /// Lists key metadata, newest first.
    pub fn list_keys(&self) -> Vec<KeyRecord> {
        self.entries
            .read()
            .iter()
            .rev()
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Returns the record referenced by `handle`.
    pub fn record(&self, handle: &KeyHandle) -> Result<KeyRecord, VaultError> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.record.id == handle.id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| VaultError::KeyNotFound(handle.id.clone()))
    }

    /// Looks up a key by its label.
    pub fn handle_for_label(&self, label: &str) -> Option<KeyHandle> {
        let label = label.trim();
        self.entries
            .read()
            .iter()
            .find(|entry| entry.record.label == label)
            .map(|entry| entry.record.handle())
    }

    /// Number of keys in the vault.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the vault holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Runs `f` with the material of the key referenced by `handle`.
    ///
    /// The read lock is held for the duration of `f`.
    pub(crate) fn with_key<R>(
        &self,
        handle: &KeyHandle,
        f: impl FnOnce(&KeyMaterial) -> R,
    ) -> Result<R, VaultError> {
        let entries = self.entries.read();
        let entry = entries
            .iter()
            .find(|entry| entry.record.id == handle.id)
            .ok_or_else(|| VaultError::KeyNotFound(handle.id.clone()))?;
        Ok(f(&entry.material))
    }

    /// Runs `f` over every stored key under the read lock.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&[StoredKey]) -> R) -> R {
        let entries = self.entries.read();
        f(&entries)
    }
}

fn normalize_label(label: &str) -> Result<String, VaultError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(VaultError::EmptyLabel);
    }
    Ok(label.to_string())
}

fn generate_aes_key() -> KeyMaterial {
    let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
    OsRng.fill_bytes(&mut *key);
    KeyMaterial::Aes256(key)
}

/// Argon2id(passphrase, salt) → 32-byte CSPRNG seed.
fn derive_seed(passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let mut seed = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut *seed)
        .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;
    Ok(seed)
}

fn derive_rsa_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<KeyMaterial, VaultError> {
    let seed = derive_seed(passphrase, salt)?;
    let mut rng = ChaCha20Rng::from_seed(*seed);
    let key = RsaPrivateKey::new(&mut rng, RSA_BITS)
        .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;
    Ok(KeyMaterial::Rsa2048(Box::new(key)))
}
