//! # veilmark - invisible watermarks for images, URLs and emoji
//!
//! veilmark hides short messages (watermarks, signatures, tokens) inside
//! ordinary carriers and gets them back out reliably.
//!
//! ## Overview
//!
//! - **Images**: one bit per sample in the least significant bits of the
//!   pixels, in raster order. 8- and 16-bit buffers keep their format.
//! - **URLs**: a base64url query parameter (`v_data` by default).
//! - **Emoji**: a zero-width marker after a grapheme cluster means `1`.
//!
//! Every carrier stores the same frame: a 12-byte header (magic, version and
//! flags, 24-bit length, CRC-32) followed by the payload. Extraction returns
//! the exact payload, [`ExtractResult::NotFound`], or
//! [`ExtractResult::Corrupted`]; it never returns unchecked bytes.
//!
//! Payloads can be encrypted with a key from the [`KeyVault`]: AES-256-GCM
//! for random keys, RSA-OAEP hybrid encryption for passphrase-derived keys.
//! Callers only ever hold [`KeyHandle`]s.
//!
//! ## Example Usage
//!
//! ```rust
//! use image::{DynamicImage, RgbImage};
//! use veilmark::{ExtractResult, KeyVault, StegoEngine};
//!
//! let vault = KeyVault::new();
//! let key = vault.generate_key("site", None).unwrap();
//! let engine = StegoEngine::new(&vault);
//!
//! let cover = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
//! let marked = engine.embed_image(&cover, b"(c) 2026", Some(&key)).unwrap();
//!
//! let found = engine.extract_image(&marked.carrier, Some(&key)).unwrap();
//! assert_eq!(
//!     found,
//!     ExtractResult::Found { message: b"(c) 2026".to_vec(), encrypted: true }
//! );
//! ```
//!
//! ## Modules
//!
//! - [`bits`]: bytes to MSB-first bits and back
//! - [`crypto`]: key vault, vault persistence and the payload cipher
//! - [`capacity`]: per-carrier capacity planning
//! - [`stego`]: frame format, carrier adapters and the phase machine
//! - [`engine`]: the [`StegoEngine`] facade
//! - [`config`] and [`settings`]: carrier configuration and the CLI settings file

pub mod bits;
pub mod capacity;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod settings;
pub mod stego;

// Re-export commonly used types at the crate root
pub use capacity::{CapacityError, CapacityPlanner, Carrier};
pub use config::StegoConfig;
pub use crypto::{KeyAlgorithm, KeyHandle, KeyRecord, KeyVault, VaultContext, VaultError};
pub use engine::StegoEngine;
pub use stego::{CorruptionReason, EmbedResult, ExtractResult, StegoError};
