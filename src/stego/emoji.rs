//! Zero-width marker steganography for emoji and other text.
//!
//! Each grapheme cluster of the cover text carries one bit: a marker
//! character (U+200B by default) right after the cluster means `1`, no
//! marker means `0`. Markers already present in the cover are removed
//! before embedding.

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::frame;
use super::state::{Operation, Phase, PhaseTracker};
use super::{finish_extraction, planned_frame_bits, prepare_frame};
use super::{EmbedResult, ExtractResult, StegoError};
use crate::bits;
use crate::capacity::{CapacityPlanner, Carrier, Usage};
use crate::config::StegoConfig;
use crate::crypto::{KeyHandle, KeyVault};

const CARRIER: &str = "emoji";

/// Emoji steganography handler.
#[derive(Debug, Clone, Copy)]
pub struct EmojiStego<'a> {
    vault: &'a KeyVault,
    config: &'a StegoConfig,
}

impl<'a> EmojiStego<'a> {
    pub fn new(vault: &'a KeyVault, config: &'a StegoConfig) -> Self {
        Self { vault, config }
    }

    /// Returns `text` with `message` encoded as markers between its clusters.
    pub fn embed(
        &self,
        text: &str,
        message: &[u8],
        key: Option<&KeyHandle>,
    ) -> Result<EmbedResult<String>, StegoError> {
        let mut tracker = PhaseTracker::new(CARRIER, Operation::Embed);
        tracker.advance(Phase::Validating);

        let usage = match self.validate(text, message.len(), key) {
            Ok(usage) => usage,
            Err(err) => {
                tracker.advance(Phase::Rejected);
                return Err(err);
            }
        };

        tracker.advance(Phase::Embedding);
        let frame = prepare_frame(message, self.vault, key)?;
        let marker = self.config.emoji_marker;
        let cover = strip_markers(text, marker);

        let mut frame_bits = bits::to_bits(&frame).into_iter();
        let mut output = String::with_capacity(cover.len() + frame.len() * 8 * marker.len_utf8());
        for cluster in cover.graphemes(true) {
            output.push_str(cluster);
            if frame_bits.next() == Some(true) {
                output.push(marker);
            }
        }
        tracker.advance(Phase::Done);

        Ok(EmbedResult {
            carrier: output,
            lossless: !text.contains(marker),
            used_bits: frame.len() * 8,
            available_bits: usage.available,
        })
    }

    /// Looks for marker-encoded data in `text` and decrypts it if needed.
    pub fn extract(&self, text: &str, key: Option<&KeyHandle>) -> Result<ExtractResult, StegoError> {
        let mut tracker = PhaseTracker::new(CARRIER, Operation::Extract);
        tracker.advance(Phase::Scanning);

        let raw = read_markers(text, self.config.emoji_marker);
        tracker.record_extraction(&raw);
        finish_extraction(raw, self.vault, key)
    }

    fn validate(
        &self,
        text: &str,
        message_len: usize,
        key: Option<&KeyHandle>,
    ) -> Result<Usage, StegoError> {
        let required = planned_frame_bits(message_len, self.vault, key)?;
        let usage = CapacityPlanner::new(self.config).check(&Carrier::Emoji(text), required)?;
        Ok(usage)
    }
}

fn strip_markers(text: &str, marker: char) -> String {
    text.chars().filter(|c| *c != marker).collect()
}

/// Recovers one bit per cluster of the marker-free text.
///
/// Cluster boundaries are taken from the text with markers removed, so a
/// marker that Unicode would fold into a neighbouring cluster still counts.
fn marker_bits(text: &str, marker: char) -> Vec<bool> {
    let cover = strip_markers(text, marker);
    let ends: Vec<usize> = cover
        .grapheme_indices(true)
        .map(|(start, cluster)| start + cluster.len())
        .collect();

    let mut bits = vec![false; ends.len()];
    let mut offset = 0;
    for c in text.chars() {
        if c != marker {
            offset += c.len_utf8();
            continue;
        }
        let completed = ends.partition_point(|&end| end <= offset);
        if let Some(bit) = completed.checked_sub(1).and_then(|i| bits.get_mut(i)) {
            *bit = true;
        }
    }
    bits
}

/// Reads the raw frame encoded by markers in `text`.
pub(crate) fn read_markers(text: &str, marker: char) -> ExtractResult {
    if !text.contains(marker) {
        return ExtractResult::NotFound;
    }
    let bits = marker_bits(text, marker);
    debug!(clusters = bits.len(), "decoding marker bits");
    frame::read_frame(bits.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::CorruptionReason;

    const ZWSP: char = '\u{200B}';

    fn cover(clusters: usize) -> String {
        ["😀", "🎉", "👍🏽", "🇫🇷", "👨\u{200D}👩\u{200D}👧", "é", "x"]
            .iter()
            .cycle()
            .take(clusters)
            .copied()
            .collect()
    }

    #[test]
    fn test_embed_and_extract() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = EmojiStego::new(&vault, &config);

        let text = cover(200);
        let result = stego.embed(&text, b"hi", None).unwrap();
        assert!(result.lossless);
        assert_eq!(result.available_bits, 200);
        assert_eq!(strip_markers(&result.carrier, ZWSP), text);

        assert_eq!(
            stego.extract(&result.carrier, None).unwrap(),
            ExtractResult::Found {
                message: b"hi".to_vec(),
                encrypted: false
            }
        );
    }

    #[test]
    fn test_plain_text_is_not_found() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = EmojiStego::new(&vault, &config);
        assert_eq!(
            stego.extract(&cover(50), None).unwrap(),
            ExtractResult::NotFound
        );
    }

    #[test]
    fn test_stray_markers_are_not_a_frame() {
        let text = format!("😀{}🎉😀{}", ZWSP, ZWSP);
        assert_eq!(read_markers(&text, ZWSP), ExtractResult::NotFound);
    }

    #[test]
    fn test_existing_markers_are_replaced() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = EmojiStego::new(&vault, &config);

        let first = stego.embed(&cover(200), b"one", None).unwrap();
        let second = stego.embed(&first.carrier, b"two", None).unwrap();
        assert!(!second.lossless);
        assert_eq!(
            stego.extract(&second.carrier, None).unwrap().message(),
            Some(&b"two"[..])
        );
    }

    #[test]
    fn test_insufficient_capacity() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = EmojiStego::new(&vault, &config);

        let err = stego.embed("😀🎉", b"hi", None).unwrap_err();
        assert!(matches!(
            err,
            StegoError::InsufficientCapacity {
                required: 112,
                available: 2
            }
        ));
    }

    #[test]
    fn test_removed_marker_is_corrupted() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = EmojiStego::new(&vault, &config);

        let carrier = stego.embed(&cover(200), b"tamper", None).unwrap().into_carrier();
        let last_marker = carrier.rfind(ZWSP).unwrap();
        let mut tampered = carrier.clone();
        tampered.remove(last_marker);

        assert!(matches!(
            stego.extract(&tampered, None).unwrap(),
            ExtractResult::Corrupted(CorruptionReason::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_marker_bits_follow_clusters() {
        let text = format!("a{}bc{}", ZWSP, ZWSP);
        assert_eq!(marker_bits(&text, ZWSP), vec![true, false, true]);
    }

    #[test]
    fn test_custom_marker() {
        let vault = KeyVault::new();
        let mut config = StegoConfig::default();
        config.emoji_marker = '\u{2060}';
        let stego = EmojiStego::new(&vault, &config);

        let result = stego.embed(&cover(150), b"wj", None).unwrap();
        assert!(!result.carrier.contains(ZWSP));
        assert!(stego.extract(&result.carrier, None).unwrap().is_found());
    }
}
