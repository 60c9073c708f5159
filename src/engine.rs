//! Single entry point over every carrier.
//!
//! [`StegoEngine`] borrows a [`KeyVault`] owned by the caller, so several
//! engines (or threads) can share one vault.

use image::DynamicImage;

use crate::capacity::{CapacityPlanner, Carrier};
use crate::config::StegoConfig;
use crate::crypto::{KeyHandle, KeyVault};
use crate::stego::{self, EmbedResult, EmojiStego, ExtractResult, ImageStego, StegoError, UrlStego};

/// Embeds and extracts messages using a shared vault and configuration.
#[derive(Debug, Clone)]
pub struct StegoEngine<'v> {
    vault: &'v KeyVault,
    config: StegoConfig,
}

impl<'v> StegoEngine<'v> {
    /// Creates an engine with the default configuration.
    pub fn new(vault: &'v KeyVault) -> Self {
        Self::with_config(vault, StegoConfig::default())
    }

    pub fn with_config(vault: &'v KeyVault, config: StegoConfig) -> Self {
        Self { vault, config }
    }

    pub fn vault(&self) -> &KeyVault {
        self.vault
    }

    pub fn config(&self) -> &StegoConfig {
        &self.config
    }

    pub fn embed_image(
        &self,
        image: &DynamicImage,
        message: &[u8],
        key: Option<&KeyHandle>,
    ) -> Result<EmbedResult<DynamicImage>, StegoError> {
        ImageStego::new(self.vault, &self.config).embed(image, message, key)
    }

    pub fn extract_image(
        &self,
        image: &DynamicImage,
        key: Option<&KeyHandle>,
    ) -> Result<ExtractResult, StegoError> {
        ImageStego::new(self.vault, &self.config).extract(image, key)
    }

    pub fn embed_url(
        &self,
        url: &str,
        message: &[u8],
        key: Option<&KeyHandle>,
    ) -> Result<EmbedResult<String>, StegoError> {
        UrlStego::new(self.vault, &self.config).embed(url, message, key)
    }

    pub fn extract_url(&self, url: &str, key: Option<&KeyHandle>) -> Result<ExtractResult, StegoError> {
        UrlStego::new(self.vault, &self.config).extract(url, key)
    }

    pub fn embed_emoji(
        &self,
        text: &str,
        message: &[u8],
        key: Option<&KeyHandle>,
    ) -> Result<EmbedResult<String>, StegoError> {
        EmojiStego::new(self.vault, &self.config).embed(text, message, key)
    }

    pub fn extract_emoji(
        &self,
        text: &str,
        key: Option<&KeyHandle>,
    ) -> Result<ExtractResult, StegoError> {
        EmojiStego::new(self.vault, &self.config).extract(text, key)
    }

    /// Bits `carrier` can hold, header included.
    pub fn capacity_bits(&self, carrier: &Carrier<'_>) -> usize {
        CapacityPlanner::new(&self.config).capacity_bits(carrier)
    }

    /// Largest message that fits in `carrier` when sealed with `key`.
    pub fn max_message_len(
        &self,
        carrier: &Carrier<'_>,
        key: Option<&KeyHandle>,
    ) -> Result<usize, StegoError> {
        let available = self.capacity_bits(carrier) / 8;
        let overhead = stego::planned_frame_bits(0, self.vault, key)? / 8;
        Ok(available.saturating_sub(overhead))
    }
}
