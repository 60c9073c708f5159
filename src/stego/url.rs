//! URL query-parameter steganography.
//!
//! The frame is base64url-encoded (no padding) into a single query
//! parameter, `v_data` by default. Any existing parameter of that name is
//! replaced; the rest of the query is kept as written.
//!
//! Older links carry a bare base64 message with no frame. Those still decode,
//! as unencrypted messages. A value that is not base64 at all carries nothing.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{DecodeError, Engine};
use tracing::debug;
use url::{form_urlencoded, Url};

use super::frame;
use super::state::{Operation, Phase, PhaseTracker};
use super::{finish_extraction, planned_frame_bits, prepare_frame};
use super::{EmbedResult, ExtractResult, StegoError};
use crate::capacity::{CapacityPlanner, Carrier, Usage};
use crate::config::StegoConfig;
use crate::crypto::{KeyHandle, KeyVault};

const CARRIER: &str = "url";

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// base64url without padding; padding is tolerated on decode.
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Standard alphabet, as produced by older links.
const STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// URL steganography handler.
#[derive(Debug, Clone, Copy)]
pub struct UrlStego<'a> {
    vault: &'a KeyVault,
    config: &'a StegoConfig,
}

impl<'a> UrlStego<'a> {
    pub fn new(vault: &'a KeyVault, config: &'a StegoConfig) -> Self {
        Self { vault, config }
    }

    /// Returns `url` with `message` stored in the payload parameter.
    pub fn embed(
        &self,
        url: &str,
        message: &[u8],
        key: Option<&KeyHandle>,
    ) -> Result<EmbedResult<String>, StegoError> {
        let mut tracker = PhaseTracker::new(CARRIER, Operation::Embed);
        tracker.advance(Phase::Validating);

        let (mut output, usage) = match self.validate(url, message.len(), key) {
            Ok(validated) => validated,
            Err(err) => {
                tracker.advance(Phase::Rejected);
                return Err(err);
            }
        };

        tracker.advance(Phase::Embedding);
        let frame = prepare_frame(message, self.vault, key)?;
        output
            .query_pairs_mut()
            .append_pair(&self.config.url_param, &URL_SAFE.encode(&frame));
        tracker.advance(Phase::Done);

        Ok(EmbedResult {
            lossless: Url::parse(url).is_ok_and(|parsed| parsed.as_str() == url),
            carrier: output.into(),
            used_bits: frame.len() * 8,
            available_bits: usage.available,
        })
    }

    /// Looks for a payload in `url` and decrypts it if needed.
    pub fn extract(&self, url: &str, key: Option<&KeyHandle>) -> Result<ExtractResult, StegoError> {
        let mut tracker = PhaseTracker::new(CARRIER, Operation::Extract);
        tracker.advance(Phase::Scanning);

        let raw = read_url(url, &self.config.url_param);
        tracker.record_extraction(&raw);
        finish_extraction(raw, self.vault, key)
    }

    fn validate(
        &self,
        url: &str,
        message_len: usize,
        key: Option<&KeyHandle>,
    ) -> Result<(Url, Usage), StegoError> {
        let base = base_url(url, &self.config.url_param)
            .ok_or_else(|| StegoError::InvalidCarrier(format!("not a valid URL: {}", url)))?;
        let required = planned_frame_bits(message_len, self.vault, key)?;
        let usage = CapacityPlanner::new(self.config).check(&Carrier::Url(url), required)?;
        Ok((base, usage))
    }
}

/// Parses `raw` and removes every `param` pair from its query.
pub(crate) fn base_url(raw: &str, param: &str) -> Option<Url> {
    let mut url = Url::parse(raw).ok()?;
    let kept: Option<String> = url.query().map(|query| {
        query
            .split('&')
            .filter(|pair| !pair.is_empty() && !is_param(pair, param))
            .collect::<Vec<_>>()
            .join("&")
    });
    match kept {
        Some(query) if !query.is_empty() => url.set_query(Some(&query)),
        _ => url.set_query(None),
    }
    Some(url)
}

fn is_param(pair: &str, param: &str) -> bool {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .is_some_and(|(name, _)| name == param)
}

/// Reads the raw frame (or legacy message) stored in `url`.
pub(crate) fn read_url(url: &str, param: &str) -> ExtractResult {
    let Ok(parsed) = Url::parse(url) else {
        return ExtractResult::NotFound;
    };
    let Some(value) = parsed
        .query_pairs()
        .find(|(name, _)| name == param)
        .map(|(_, value)| value.into_owned())
    else {
        return ExtractResult::NotFound;
    };
    if value.is_empty() {
        return ExtractResult::NotFound;
    }

    let bytes = match decode_value(&value) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(param, error = %err, "payload parameter is not base64");
            return ExtractResult::NotFound;
        }
    };

    if frame::resembles_frame(&bytes) {
        frame::open_frame(&bytes)
    } else {
        ExtractResult::Found {
            message: bytes,
            encrypted: false,
        }
    }
}

/// Form decoding turns `+` into a space, so spaces are mapped back first.
fn decode_value(value: &str) -> Result<Vec<u8>, DecodeError> {
    let value = value.replace(' ', "+");
    URL_SAFE
        .decode(&value)
        .or_else(|_| STANDARD.decode(&value))
}
