//! Embedding configuration shared by the capacity planner and the adapters.

use serde::{Deserialize, Serialize};

/// Default maximum length of a URL produced by the URL adapter.
pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;

/// Default query parameter carrying URL payloads.
pub const DEFAULT_URL_PARAM: &str = "v_data";

/// Default marker appended to a grapheme cluster to signal a `1` bit.
pub const DEFAULT_EMOJI_MARKER: char = '\u{200B}';

/// Configuration for the steganographic carriers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StegoConfig {
    /// Maximum length of an embedded URL, in characters.
    pub max_url_length: usize,

    /// Query parameter name holding the URL payload.
    pub url_param: String,

    /// Zero-width marker used by the emoji adapter.
    pub emoji_marker: char,

    /// Also embed into the alpha channel of images that have one.
    pub include_alpha: bool,
}

impl Default for StegoConfig {
    fn default() -> Self {
        Self {
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            url_param: DEFAULT_URL_PARAM.to_string(),
            emoji_marker: DEFAULT_EMOJI_MARKER,
            include_alpha: false,
        }
    }
}

impl StegoConfig {
    /// Returns a config with a different URL length limit.
    pub fn with_max_url_length(mut self, max_url_length: usize) -> Self {
        self.max_url_length = max_url_length;
        self
    }

    /// Returns a config that also uses the alpha channel.
    pub fn with_alpha(mut self, include_alpha: bool) -> Self {
        self.include_alpha = include_alpha;
        self
    }
}
