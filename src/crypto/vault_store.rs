//! Encrypted persistence for the key vault.
//!
//! The vault is serialized to JSON and sealed with ChaCha20-Poly1305 under a
//! master key derived (HKDF-SHA256) from a caller-supplied [`VaultContext`].
//! Key material is therefore never written unencrypted.
//!
//! Sealed layout:
//!
//! ```text
//! [4 bytes ] "VMKV"
//! [1 byte  ] format version
//! [16 bytes] HKDF salt
//! [12 bytes] nonce
//! [N bytes ] ChaCha20-Poly1305(JSON document)
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::keys::{KeyAlgorithm, KeyMaterial, KeyRecord, KeyVault, StoredKey, VaultError, AES_KEY_LEN};

const VAULT_MAGIC: &[u8; 4] = b"VMKV";
const VAULT_VERSION: u8 = 1;
const HKDF_INFO: &[u8] = b"veilmark-vault-master-v1";
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const PREFIX_LEN: usize = VAULT_MAGIC.len() + 1 + SALT_SIZE + NONCE_SIZE;

/// Opaque secret from the caller's authentication context.
///
/// The vault master key is derived from it; the context itself is never stored.
pub struct VaultContext {
    secret: Zeroizing<Vec<u8>>,
}

impl VaultContext {
    /// Wraps the caller's context secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
        }
    }

    fn master_key(&self, salt: &[u8; SALT_SIZE]) -> Result<Zeroizing<[u8; 32]>, VaultError> {
        let hk = Hkdf::<Sha256>::new(Some(salt.as_slice()), &self.secret);
        let mut key = Zeroizing::new([0u8; 32]);
        hk.expand(HKDF_INFO, &mut *key)
            .map_err(|_| VaultError::KeyGeneration("HKDF expand failed".to_string()))?;
        Ok(key)
    }
}

impl fmt::Debug for VaultContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultContext")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Serializable structures for JSON storage
// ============================================================================

/// A single key entry: metadata plus base64 material.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct PersistedKey {
    #[zeroize(skip)]
    record: KeyRecord,
    /// Raw AES key or PKCS#8 DER of the RSA private key, base64-encoded
    material: String,
}

/// Top-level document sealed into the vault file.
#[derive(Serialize, Deserialize)]
struct VaultDocument {
    version: u8,
    keys: Vec<PersistedKey>,
}

impl PersistedKey {
    fn from_stored(stored: &StoredKey) -> Result<Self, VaultError> {
        let material = match &stored.material {
            KeyMaterial::Aes256(key) => BASE64.encode(key.as_slice()),
            KeyMaterial::Rsa2048(key) => {
                let der = key
                    .to_pkcs8_der()
                    .map_err(|e| VaultError::InvalidKeyData(e.to_string()))?;
                BASE64.encode(der.as_bytes())
            }
        };

        Ok(Self {
            record: stored.record.clone(),
            material,
        })
    }

    fn to_stored(&self) -> Result<StoredKey, VaultError> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(&self.material)
                .map_err(|e| VaultError::InvalidKeyData(e.to_string()))?,
        );

        let material = match self.record.algorithm {
            KeyAlgorithm::Aes256 => {
                if bytes.len() != AES_KEY_LEN {
                    return Err(VaultError::InvalidKeyData(format!(
                        "AES key for '{}' has {} bytes, expected {}",
                        self.record.label,
                        bytes.len(),
                        AES_KEY_LEN
                    )));
                }
                let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
                key.copy_from_slice(&bytes);
                KeyMaterial::Aes256(key)
            }
            KeyAlgorithm::Rsa2048 => {
                let key = RsaPrivateKey::from_pkcs8_der(&bytes)
                    .map_err(|e| VaultError::InvalidKeyData(e.to_string()))?;
                KeyMaterial::Rsa2048(Box::new(key))
            }
        };

        Ok(StoredKey {
            record: self.record.clone(),
            material,
        })
    }
}

// ============================================================================
// Public API
// ============================================================================

impl KeyVault {
    /// Serializes and encrypts the vault under `context`.
    pub fn seal(&self, context: &VaultContext) -> Result<Vec<u8>, VaultError> {
        let keys = self.with_entries(|entries| {
            entries
                .iter()
                .map(PersistedKey::from_stored)
                .collect::<Result<Vec<_>, _>>()
        })?;
        let document = VaultDocument {
            version: VAULT_VERSION,
            keys,
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&document)?);

        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce_bytes);

        let master = context.master_key(&salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(master.as_slice())
            .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;

        let mut sealed = Vec::with_capacity(PREFIX_LEN + ciphertext.len());
        sealed.extend_from_slice(VAULT_MAGIC);
        sealed.push(VAULT_VERSION);
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        debug!(keys = document.keys.len(), bytes = sealed.len(), "vault sealed");
        Ok(sealed)
    }

    /// Decrypts and deserializes a vault produced by [`KeyVault::seal`].
    pub fn unseal(sealed: &[u8], context: &VaultContext) -> Result<Self, VaultError> {
        if sealed.len() < PREFIX_LEN || &sealed[..VAULT_MAGIC.len()] != VAULT_MAGIC {
            return Err(VaultError::UnsupportedFormat("missing vault header".to_string()));
        }

        let version = sealed[VAULT_MAGIC.len()];
        if version != VAULT_VERSION {
            return Err(VaultError::UnsupportedFormat(format!("version {}", version)));
        }

        let salt_start = VAULT_MAGIC.len() + 1;
        let nonce_start = salt_start + SALT_SIZE;
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&sealed[salt_start..nonce_start]);
        let nonce = Nonce::from_slice(&sealed[nonce_start..PREFIX_LEN]);

        let master = context.master_key(&salt)?;
        let cipher =
            ChaCha20Poly1305::new_from_slice(master.as_slice()).map_err(|_| VaultError::Unseal)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(nonce, &sealed[PREFIX_LEN..])
                .map_err(|_| VaultError::Unseal)?,
        );

        let document: VaultDocument = serde_json::from_slice(&plaintext)?;
        if document.version != VAULT_VERSION {
            return Err(VaultError::UnsupportedFormat(format!(
                "document version {}",
                document.version
            )));
        }

        let mut entries: Vec<StoredKey> = Vec::with_capacity(document.keys.len());
        for persisted in &document.keys {
            let stored = persisted.to_stored()?;
            if entries.iter().any(|e| e.record.label == stored.record.label) {
                return Err(VaultError::InvalidKeyData(format!(
                    "duplicate label '{}'",
                    stored.record.label
                )));
            }
            entries.push(stored);
        }

        debug!(keys = entries.len(), "vault unsealed");
        Ok(Self::from_entries(entries))
    }

    /// Seals the vault and writes it to `path` (mode 0600 on Unix).
    pub fn save_to_file(&self, path: &Path, context: &VaultContext) -> Result<(), VaultError> {
        let sealed = self.seal(context)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, sealed)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Loads a vault from `path`. A missing file yields an empty vault.
    pub fn load_from_file(path: &Path, context: &VaultContext) -> Result<Self, VaultError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let sealed = fs::read(path)?;
        Self::unseal(&sealed, context)
    }
}
