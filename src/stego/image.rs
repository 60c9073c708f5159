//! LSB (Least Significant Bit) steganography for images.
//!
//! Hides a frame in the least significant bits of pixel samples, visiting
//! pixels in raster order and channels in R, G, B (then A when enabled)
//! order. Each sample holds one bit.
//!
//! 8- and 16-bit integer buffers are modified in place and keep their
//! format. Float buffers are quantized to 8 bits first, so their results are
//! reported as not lossless.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use super::frame;
use super::state::{Operation, Phase, PhaseTracker};
use super::{finish_extraction, planned_frame_bits, prepare_frame};
use super::{EmbedResult, ExtractResult, StegoError};
use crate::bits;
use crate::capacity::{CapacityPlanner, Carrier, Usage};
use crate::config::StegoConfig;
use crate::crypto::{KeyHandle, KeyVault};

const CARRIER: &str = "image";

/// Errors that can occur while loading or saving carrier images.
#[derive(Error, Debug)]
pub enum ImageIoError {
    #[error("Image load error: {0}")]
    ImageLoadError(String),

    #[error("Image save error: {0}")]
    ImageSaveError(String),

    #[error("Refusing to save to {0}: format is lossy or unknown (use PNG)")]
    LossyFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A sample type whose least significant bit can carry data.
trait LsbSample: Copy {
    fn lsb(self) -> bool;
    fn with_lsb(self, bit: bool) -> Self;
}

impl LsbSample for u8 {
    fn lsb(self) -> bool {
        self & 1 == 1
    }

    fn with_lsb(self, bit: bool) -> Self {
        (self & !1) | bit as u8
    }
}

impl LsbSample for u16 {
    fn lsb(self) -> bool {
        self & 1 == 1
    }

    fn with_lsb(self, bit: bool) -> Self {
        (self & !1) | bit as u16
    }
}

/// Image steganography handler.
#[derive(Debug, Clone, Copy)]
pub struct ImageStego<'a> {
    vault: &'a KeyVault,
    config: &'a StegoConfig,
}

impl<'a> ImageStego<'a> {
    pub fn new(vault: &'a KeyVault, config: &'a StegoConfig) -> Self {
        Self { vault, config }
    }

    /// Hides `message` in a copy of `image`, encrypting it first if a key is given.
    ///
    /// Fails without touching anything if the frame does not fit.
    pub fn embed(
        &self,
        image: &DynamicImage,
        message: &[u8],
        key: Option<&KeyHandle>,
    ) -> Result<EmbedResult<DynamicImage>, StegoError> {
        let mut tracker = PhaseTracker::new(CARRIER, Operation::Embed);
        tracker.advance(Phase::Validating);

        let (mut output, lossless) = working_copy(image);
        let usage = match self.validate(&output, message.len(), key) {
            Ok(usage) => usage,
            Err(err) => {
                tracker.advance(Phase::Rejected);
                return Err(err);
            }
        };

        tracker.advance(Phase::Embedding);
        let frame = prepare_frame(message, self.vault, key)?;
        let frame_bits = bits::to_bits(&frame);
        if !write_frame_bits(&mut output, &frame_bits, self.config.include_alpha) {
            return Err(StegoError::InvalidCarrier(format!(
                "unsupported pixel format {:?}",
                output.color()
            )));
        }
        tracker.advance(Phase::Done);

        Ok(EmbedResult {
            carrier: output,
            lossless,
            used_bits: frame_bits.len(),
            available_bits: usage.available,
        })
    }

    /// Looks for a frame in `image` and decrypts it if needed.
    pub fn extract(
        &self,
        image: &DynamicImage,
        key: Option<&KeyHandle>,
    ) -> Result<ExtractResult, StegoError> {
        let mut tracker = PhaseTracker::new(CARRIER, Operation::Extract);
        tracker.advance(Phase::Scanning);

        let raw = read_frame_from(image, self.config.include_alpha);
        tracker.record_extraction(&raw);
        finish_extraction(raw, self.vault, key)
    }

    fn validate(
        &self,
        image: &DynamicImage,
        message_len: usize,
        key: Option<&KeyHandle>,
    ) -> Result<Usage, StegoError> {
        let required = planned_frame_bits(message_len, self.vault, key)?;
        let usage = CapacityPlanner::new(self.config).check(&Carrier::Image(image), required)?;
        Ok(usage)
    }
}

/// Clones `image` into a buffer whose samples can be modified.
///
/// Returns false for the second element when the pixel format had to change.
fn working_copy(image: &DynamicImage) -> (DynamicImage, bool) {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => (image.clone(), true),
        DynamicImage::ImageRgb32F(_) => (DynamicImage::ImageRgb8(image.to_rgb8()), false),
        _ => (DynamicImage::ImageRgba8(image.to_rgba8()), false),
    }
}

/// Sample layout of a pixel with alpha: (samples per pixel, samples carrying data).
fn alpha_layout(channels: usize, include_alpha: bool) -> (usize, usize) {
    if include_alpha {
        (channels, channels)
    } else {
        (channels, channels - 1)
    }
}

fn write_frame_bits(image: &mut DynamicImage, frame_bits: &[bool], include_alpha: bool) -> bool {
    let luma_a = alpha_layout(2, include_alpha);
    let rgba = alpha_layout(4, include_alpha);

    match image {
        DynamicImage::ImageLuma8(buf) => write_bits(buf, (1, 1), frame_bits),
        DynamicImage::ImageLumaA8(buf) => write_bits(buf, luma_a, frame_bits),
        DynamicImage::ImageRgb8(buf) => write_bits(buf, (3, 3), frame_bits),
        DynamicImage::ImageRgba8(buf) => write_bits(buf, rgba, frame_bits),
        DynamicImage::ImageLuma16(buf) => write_bits(buf, (1, 1), frame_bits),
        DynamicImage::ImageLumaA16(buf) => write_bits(buf, luma_a, frame_bits),
        DynamicImage::ImageRgb16(buf) => write_bits(buf, (3, 3), frame_bits),
        DynamicImage::ImageRgba16(buf) => write_bits(buf, rgba, frame_bits),
        _ => return false,
    }
    true
}

fn write_bits<S: LsbSample>(samples: &mut [S], (stride, used): (usize, usize), bits: &[bool]) {
    let slots = samples
        .chunks_exact_mut(stride)
        .flat_map(|pixel| pixel[..used].iter_mut());
    for (sample, &bit) in slots.zip(bits) {
        *sample = sample.with_lsb(bit);
    }
}

fn lsb_stream<S: LsbSample>(
    samples: &[S],
    (stride, used): (usize, usize),
) -> impl Iterator<Item = bool> + '_ {
    samples
        .chunks_exact(stride)
        .flat_map(move |pixel| pixel[..used].iter().map(|sample| sample.lsb()))
}

/// Reads the raw frame stored in `image`. The payload may still be encrypted.
pub(crate) fn read_frame_from(image: &DynamicImage, include_alpha: bool) -> ExtractResult {
    let luma_a = alpha_layout(2, include_alpha);
    let rgba = alpha_layout(4, include_alpha);

    match image {
        DynamicImage::ImageLuma8(buf) => frame::read_frame(lsb_stream(buf, (1, 1))),
        DynamicImage::ImageLumaA8(buf) => frame::read_frame(lsb_stream(buf, luma_a)),
        DynamicImage::ImageRgb8(buf) => frame::read_frame(lsb_stream(buf, (3, 3))),
        DynamicImage::ImageRgba8(buf) => frame::read_frame(lsb_stream(buf, rgba)),
        DynamicImage::ImageLuma16(buf) => frame::read_frame(lsb_stream(buf, (1, 1))),
        DynamicImage::ImageLumaA16(buf) => frame::read_frame(lsb_stream(buf, luma_a)),
        DynamicImage::ImageRgb16(buf) => frame::read_frame(lsb_stream(buf, (3, 3))),
        DynamicImage::ImageRgba16(buf) => frame::read_frame(lsb_stream(buf, rgba)),
        DynamicImage::ImageRgb32F(_) => {
            let buf = image.to_rgb8();
            frame::read_frame(lsb_stream(&buf, (3, 3)))
        }
        _ => {
            let buf = image.to_rgba8();
            frame::read_frame(lsb_stream(&buf, rgba))
        }
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Loads an image from a file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, ImageIoError> {
    image::open(path).map_err(|e| ImageIoError::ImageLoadError(e.to_string()))
}

/// Decodes an image from bytes.
pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageIoError> {
    image::load_from_memory(bytes).map_err(|e| ImageIoError::ImageLoadError(e.to_string()))
}

/// Encodes an image as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageIoError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ImageIoError::ImageSaveError(e.to_string()))?;
    Ok(bytes)
}

/// Saves an image, refusing formats that would destroy the embedded bits.
pub fn save_image<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<(), ImageIoError> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path)
        .ok()
        .filter(is_lossless_format)
        .ok_or_else(|| ImageIoError::LossyFormat(path.display().to_string()))?;

    image
        .save_with_format(path, format)
        .map_err(|e| ImageIoError::ImageSaveError(e.to_string()))
}

fn is_lossless_format(format: &ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::Pnm | ImageFormat::Qoi
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::CorruptionReason;
    use image::{ImageBuffer, Rgb, Rgba};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 17) % 256) as u8,
                ((y * 23) % 256) as u8,
                (((x + y) * 31) % 256) as u8,
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn flip_sample(image: &mut DynamicImage, index: usize) {
        if let DynamicImage::ImageRgb8(buf) = image {
            let samples: &mut [u8] = buf;
            samples[index] ^= 1;
        }
    }

    #[test]
    fn test_hide_and_extract_hi() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);

        let result = stego.embed(&create_test_image(64, 64), b"hi", None).unwrap();
        assert!(result.lossless);
        assert_eq!(result.used_bits, (frame::HEADER_LEN + 2) * 8);
        assert_eq!(result.available_bits, 12288);

        let extracted = stego.extract(&result.carrier, None).unwrap();
        assert_eq!(
            extracted,
            ExtractResult::Found {
                message: b"hi".to_vec(),
                encrypted: false
            }
        );
    }

    #[test]
    fn test_capacity_boundary() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);
        // 8x8 RGB = 192 bits = 12 header bytes + 12 payload bytes
        let image = create_test_image(8, 8);

        let exact = stego.embed(&image, &[0x5A; 12], None).unwrap();
        assert_eq!(exact.used_bits, exact.available_bits);
        assert_eq!(
            stego.extract(&exact.carrier, None).unwrap().message(),
            Some(&[0x5A; 12][..])
        );

        let err = stego.embed(&image, &[0x5A; 13], None).unwrap_err();
        assert!(matches!(
            err,
            StegoError::InsufficientCapacity {
                required: 200,
                available: 192
            }
        ));
    }

    #[test]
    fn test_clean_image_is_not_found() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);

        let result = stego.extract(&create_test_image(32, 32), None).unwrap();
        assert_eq!(result, ExtractResult::NotFound);

        let tiny = create_test_image(2, 2);
        assert_eq!(stego.extract(&tiny, None).unwrap(), ExtractResult::NotFound);
    }

    #[test]
    fn test_unused_samples_untouched() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);
        let original = create_test_image(16, 16);

        let result = stego.embed(&original, b"abc", None).unwrap();
        let before = original.as_bytes();
        let after = result.carrier.as_bytes();
        assert_eq!(&before[result.used_bits..], &after[result.used_bits..]);
    }

    #[test]
    fn test_tamper_detection() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);

        let result = stego.embed(&create_test_image(32, 32), b"watermark", None).unwrap();
        for index in 0..result.used_bits {
            let mut tampered = result.carrier.clone();
            flip_sample(&mut tampered, index);
            assert!(
                matches!(
                    stego.extract(&tampered, None).unwrap(),
                    ExtractResult::Corrupted(_)
                ),
                "sample {} flip went undetected",
                index
            );
        }
    }

    #[test]
    fn test_flip_outside_frame_is_harmless() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);

        let mut carrier = stego
            .embed(&create_test_image(32, 32), b"watermark", None)
            .unwrap()
            .into_carrier();
        flip_sample(&mut carrier, 2000);
        assert!(stego.extract(&carrier, None).unwrap().is_found());
    }

    #[test]
    fn test_length_beyond_carrier_is_truncated() {
        let frame = frame::build_frame(&[7u8; 40], false).unwrap();
        // 8x8 RGB holds 24 bytes, so only 12 payload bytes survive
        let mut image = create_test_image(8, 8);
        write_frame_bits(&mut image, &bits::to_bits(&frame), false);

        assert_eq!(
            read_frame_from(&image, false),
            ExtractResult::Corrupted(CorruptionReason::Truncated {
                declared: 40,
                available: 12
            })
        );
    }

    #[test]
    fn test_rgba_alpha_untouched_by_default() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(16, 16, Rgba([10, 20, 30, 255])));

        let result = stego.embed(&image, b"alpha", None).unwrap();
        assert_eq!(result.available_bits, 16 * 16 * 3);
        let rgba = result.carrier.to_rgba8();
        assert!(rgba.pixels().all(|p| p.0[3] == 255));
        assert!(stego.extract(&result.carrier, None).unwrap().is_found());
    }

    #[test]
    fn test_rgba_with_alpha_enabled() {
        let vault = KeyVault::new();
        let config = StegoConfig::default().with_alpha(true);
        let stego = ImageStego::new(&vault, &config);
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(8, 8, Rgba([1, 2, 3, 4])));

        let result = stego.embed(&image, b"sixteen byte msg", None).unwrap();
        assert_eq!(result.available_bits, 256);
        assert_eq!(
            stego.extract(&result.carrier, None).unwrap().message(),
            Some(&b"sixteen byte msg"[..])
        );
    }

    #[test]
    fn test_sixteen_bit_stays_native() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);
        let image = DynamicImage::ImageRgb16(ImageBuffer::from_fn(16, 16, |x, y| {
            Rgb([(x * 1000) as u16, (y * 700) as u16, 40_000])
        }));

        let result = stego.embed(&image, b"deep", None).unwrap();
        assert!(result.lossless);
        assert!(matches!(result.carrier, DynamicImage::ImageRgb16(_)));
        assert_eq!(
            stego.extract(&result.carrier, None).unwrap().message(),
            Some(&b"deep"[..])
        );
    }

    #[test]
    fn test_float_image_is_quantized() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);
        let image = DynamicImage::ImageRgb32F(ImageBuffer::from_pixel(16, 16, Rgb([0.5f32, 0.25, 0.75])));

        let result = stego.embed(&image, b"float", None).unwrap();
        assert!(!result.lossless);
        assert!(matches!(result.carrier, DynamicImage::ImageRgb8(_)));
        assert!(stego.extract(&result.carrier, None).unwrap().is_found());
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let vault = KeyVault::new();
        let key = vault.generate_key("img", None).unwrap();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);

        let result = stego.embed(&create_test_image(64, 64), b"secret", Some(&key)).unwrap();
        assert_eq!(
            stego.extract(&result.carrier, Some(&key)).unwrap(),
            ExtractResult::Found {
                message: b"secret".to_vec(),
                encrypted: true
            }
        );
        assert!(matches!(
            stego.extract(&result.carrier, None),
            Err(StegoError::KeyRequired)
        ));
    }

    #[test]
    fn test_png_roundtrip() {
        let vault = KeyVault::new();
        let config = StegoConfig::default();
        let stego = ImageStego::new(&vault, &config);

        let hidden = stego
            .embed(&create_test_image(100, 100), b"Test PNG roundtrip", None)
            .unwrap();
        let png_bytes = encode_png(&hidden.carrier).unwrap();
        let decoded = from_bytes(&png_bytes).unwrap();

        assert_eq!(
            stego.extract(&decoded, None).unwrap().message(),
            Some(&b"Test PNG roundtrip"[..])
        );
    }

    #[test]
    fn test_save_rejects_lossy_format() {
        let dir = tempfile::tempdir().unwrap();
        let image = create_test_image(4, 4);

        let result = save_image(&image, dir.path().join("out.jpg"));
        assert!(matches!(result, Err(ImageIoError::LossyFormat(_))));

        let png = dir.path().join("out.png");
        save_image(&image, &png).unwrap();
        assert_eq!(load_image(&png).unwrap(), image);
    }
}
