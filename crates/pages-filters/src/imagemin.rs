//! Image compression using the `image` crate.
//!
//! | Format | Strategy |
//! |---|---|
//! | PNG | re-encode with best compression and adaptive filtering (lossless) |
//! | JPEG | re-encode at a fixed quality |
//! | anything else | passed through untouched |
//!
//! The re-encoded bytes are only kept when they are smaller than the input.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};

use crate::traits::{Asset, Filter, FilterError};

/// JPEG quality used when re-encoding.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Compresses PNG and JPEG images; other files pass through.
#[derive(Debug, Clone)]
pub struct ImageminFilter {
    jpeg_quality: u8,
}

impl ImageminFilter {
    /// Create a compressor with the given JPEG quality (1-100).
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for ImageminFilter {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

fn format_for(ext: &str) -> Option<ImageFormat> {
    match ext {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

impl ImageminFilter {
    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Cursor::new(Vec::new());
        match format {
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
                image.write_with_encoder(encoder)?;
            }
            _ => {
                let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
                // JPEG has no alpha channel
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
            }
        }
        Ok(out.into_inner())
    }
}

impl Filter for ImageminFilter {
    fn name(&self) -> &'static str {
        "imagemin"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let Some(format) = format_for(&asset.extension()) else {
            return Ok(vec![asset]);
        };

        let image = image::load_from_memory_with_format(&asset.contents, format)
            .map_err(|e| FilterError::Image(format!("{}: {}", asset.path.display(), e)))?;
        let encoded = self
            .encode(&image, format)
            .map_err(|e| FilterError::Image(format!("{}: {}", asset.path.display(), e)))?;

        if encoded.len() < asset.contents.len() {
            let saved = asset.contents.len() - encoded.len();
            tracing::debug!("imagemin: {} (saved {} bytes)", asset.path.display(), saved);
            Ok(vec![asset.with_contents(encoded)])
        } else {
            Ok(vec![asset])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn fast_png() -> Vec<u8> {
        let img = ImageBuffer::from_fn(64, 64, |x, _| Rgba([(x % 2 * 255) as u8, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter);
        DynamicImage::ImageRgba8(img).write_with_encoder(encoder).unwrap();
        out.into_inner()
    }

    #[test]
    fn never_grows_png() {
        let original = fast_png();
        let out = ImageminFilter::default()
            .apply(Asset::new("src", "assets/images/logo.png", original.clone()))
            .unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].contents.len() <= original.len());
        let decoded = image::load_from_memory(&out[0].contents).unwrap();
        assert_eq!(decoded.width(), 64);
    }

    #[test]
    fn is_deterministic() {
        let filter = ImageminFilter::default();
        let first = filter.apply(Asset::new("src", "a.png", fast_png())).unwrap();
        let second = filter.apply(Asset::new("src", "a.png", fast_png())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn passes_fonts_through() {
        let font = b"wOFF\x00\x01fake font".to_vec();
        let asset = Asset::new("src", "assets/fonts/icons.woff", font.clone());
        let out = ImageminFilter::default().apply(asset).unwrap();
        assert_eq!(out[0].contents, font);
    }

    #[test]
    fn rejects_corrupt_images() {
        let asset = Asset::new("src", "broken.png", b"not a png".to_vec());
        let err = ImageminFilter::default().apply(asset).unwrap_err();
        assert!(matches!(err, FilterError::Image(_)));
    }
}
