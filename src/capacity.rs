//! Capacity planning for every carrier type.
//!
//! Capacity is always checked against the exact frame size (header plus
//! sealed payload) before anything is encrypted or written.

use image::DynamicImage;
use thiserror::Error;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;
use url::form_urlencoded;

use crate::config::StegoConfig;
use crate::stego::url::base_url;

/// Errors raised when a carrier is too small.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    #[error("Insufficient capacity: need {required} bits, carrier holds {available}")]
    InsufficientCapacity { required: usize, available: usize },
}

/// A carrier that can hold a frame.
#[derive(Debug, Clone, Copy)]
pub enum Carrier<'a> {
    Image(&'a DynamicImage),
    Url(&'a str),
    Emoji(&'a str),
}

impl Carrier<'_> {
    /// Short name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Url(_) => "url",
            Self::Emoji(_) => "emoji",
        }
    }
}

/// Outcome of a successful capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub required: usize,
    pub available: usize,
}

impl Usage {
    /// Bits left over after embedding.
    pub fn remaining(&self) -> usize {
        self.available.saturating_sub(self.required)
    }
}

/// Computes how many bits a carrier can hold.
#[derive(Debug, Clone)]
pub struct CapacityPlanner<'c> {
    config: &'c StegoConfig,
}

impl<'c> CapacityPlanner<'c> {
    pub fn new(config: &'c StegoConfig) -> Self {
        Self { config }
    }

    /// Total embeddable bits of `carrier`.
    pub fn capacity_bits(&self, carrier: &Carrier<'_>) -> usize {
        match carrier {
            Carrier::Image(image) => image_capacity(image, self.config.include_alpha),
            Carrier::Url(url) => self.url_capacity(url),
            Carrier::Emoji(text) => grapheme_count(text, self.config.emoji_marker),
        }
    }

    /// Returns true if `bits` fit in `carrier`.
    pub fn can_embed(&self, carrier: &Carrier<'_>, bits: usize) -> bool {
        bits <= self.capacity_bits(carrier)
    }

    /// Checks that `bits` fit in `carrier`.
    pub fn check(&self, carrier: &Carrier<'_>, bits: usize) -> Result<Usage, CapacityError> {
        let available = self.capacity_bits(carrier);
        debug!(
            carrier = carrier.kind(),
            required = bits,
            available,
            "capacity check"
        );
        if bits > available {
            return Err(CapacityError::InsufficientCapacity {
                required: bits,
                available,
            });
        }
        Ok(Usage {
            required: bits,
            available,
        })
    }

    /// Unpadded base64 of `n` bytes takes `ceil(4n / 3)` characters, so `c`
    /// free characters hold `floor(3c / 4)` bytes.
    fn url_capacity(&self, url: &str) -> usize {
        let param = &self.config.url_param;
        let Some(base) = base_url(url, param) else {
            return 0;
        };
        let encoded_param: usize = form_urlencoded::byte_serialize(param.as_bytes())
            .map(str::len)
            .sum();
        let free = self
            .config
            .max_url_length
            .saturating_sub(base.as_str().len())
            .saturating_sub(encoded_param)
            .saturating_sub(2);
        (free * 3 / 4) * 8
    }
}

/// Number of samples per pixel that carry a bit.
pub(crate) fn channels_used(image: &DynamicImage, include_alpha: bool) -> usize {
    let color = image.color();
    let base = if color.has_color() { 3 } else { 1 };
    if include_alpha && color.has_alpha() {
        base + 1
    } else {
        base
    }
}

fn image_capacity(image: &DynamicImage, include_alpha: bool) -> usize {
    image.width() as usize * image.height() as usize * channels_used(image, include_alpha)
}

/// Grapheme clusters of `text` once every `marker` is removed.
pub(crate) fn grapheme_count(text: &str, marker: char) -> usize {
    let stripped: String = text.chars().filter(|c| *c != marker).collect();
    stripped.graphemes(true).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage, RgbaImage};

    #[test]
    fn test_rgb_image_capacity() {
        let config = StegoConfig::default();
        let planner = CapacityPlanner::new(&config);
        let image = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        assert_eq!(planner.capacity_bits(&Carrier::Image(&image)), 12288);
    }

    #[test]
    fn test_alpha_is_opt_in() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));

        let config = StegoConfig::default();
        assert_eq!(
            CapacityPlanner::new(&config).capacity_bits(&Carrier::Image(&image)),
            300
        );

        let config = StegoConfig::default().with_alpha(true);
        assert_eq!(
            CapacityPlanner::new(&config).capacity_bits(&Carrier::Image(&image)),
            400
        );
    }

    #[test]
    fn test_grayscale_capacity() {
        let config = StegoConfig::default();
        let image = DynamicImage::ImageLuma8(GrayImage::new(8, 8));
        assert_eq!(
            CapacityPlanner::new(&config).capacity_bits(&Carrier::Image(&image)),
            64
        );
    }

    #[test]
    fn test_check_boundary() {
        let config = StegoConfig::default();
        let planner = CapacityPlanner::new(&config);
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let carrier = Carrier::Image(&image);

        let usage = planner.check(&carrier, 48).unwrap();
        assert_eq!(usage.remaining(), 0);
        assert!(planner.can_embed(&carrier, 48));

        assert_eq!(
            planner.check(&carrier, 49),
            Err(CapacityError::InsufficientCapacity {
                required: 49,
                available: 48
            })
        );
    }

    #[test]
    fn test_url_capacity() {
        let config = StegoConfig::default().with_max_url_length(40);
        let planner = CapacityPlanner::new(&config);
        // "https://x.com/" is 14 chars, "v_data" 6, separators 2 => 18 free
        assert_eq!(
            planner.capacity_bits(&Carrier::Url("https://x.com/")),
            (18 * 3 / 4) * 8
        );
    }

    #[test]
    fn test_url_capacity_counts_encoded_param() {
        let config = StegoConfig {
            url_param: "a b&c".to_string(),
            ..StegoConfig::default().with_max_url_length(80)
        };
        let planner = CapacityPlanner::new(&config);
        // the name is written as "a+b%26c": 80 - 14 - 7 - 2 => 57 free
        assert_eq!(
            planner.capacity_bits(&Carrier::Url("https://x.com/")),
            (57 * 3 / 4) * 8
        );
    }

    #[test]
    fn test_remaining_never_underflows() {
        let usage = Usage {
            required: 64,
            available: 16,
        };
        assert_eq!(usage.remaining(), 0);
    }

    #[test]
    fn test_url_capacity_ignores_existing_param() {
        let config = StegoConfig::default();
        let planner = CapacityPlanner::new(&config);
        assert_eq!(
            planner.capacity_bits(&Carrier::Url("https://x.com/?v_data=AAAA")),
            planner.capacity_bits(&Carrier::Url("https://x.com/"))
        );
    }

    #[test]
    fn test_invalid_url_has_no_capacity() {
        let config = StegoConfig::default();
        let planner = CapacityPlanner::new(&config);
        assert_eq!(planner.capacity_bits(&Carrier::Url("not a url")), 0);
    }

    #[test]
    fn test_emoji_capacity_counts_graphemes() {
        let config = StegoConfig::default();
        let planner = CapacityPlanner::new(&config);
        // family emoji is a single cluster
        let text = "a\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}b";
        assert_eq!(planner.capacity_bits(&Carrier::Emoji(text)), 3);
        assert_eq!(planner.capacity_bits(&Carrier::Emoji("a\u{200B}b")), 2);
    }
}
