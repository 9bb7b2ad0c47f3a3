use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::debug;

use crate::utils::error::{PipelineError, PreprocessingError};

const CONTRAST_FACTOR: f32 = 1.5;
const BINARIZE_CUTOFF: f32 = 128.0;

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Sniff the container format from magic bytes. Only formats the
    /// decoder handles are reported.
    pub fn detect_format(bytes: &[u8]) -> Option<&'static str> {
        if bytes.len() >= 8 && bytes[0..4] == [0x89, 0x50, 0x4E, 0x47] {
            return Some("png");
        }
        if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
            return Some("jpeg");
        }
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some("webp");
        }
        if bytes.len() >= 2 && &bytes[0..2] == b"BM" {
            return Some("bmp");
        }
        None
    }

    /// Screen the upload before the pipeline commits any state: the
    /// container must be recognized and the payload must fit the cap.
    pub fn validate_input(bytes: &[u8], max_bytes: usize) -> Result<(), PipelineError> {
        let format = Self::detect_format(bytes).ok_or_else(|| {
            PipelineError::InvalidInput(
                "unsupported image type (want PNG, JPEG, WebP or BMP)".to_string(),
            )
        })?;
        if bytes.len() > max_bytes {
            return Err(PipelineError::InvalidInput(format!(
                "image is {} bytes, limit is {}",
                bytes.len(),
                max_bytes
            )));
        }
        debug!("input accepted: {} bytes, format {}", bytes.len(), format);
        Ok(())
    }

    /// Grayscale, contrast-stretch and binarize the scan so the engines see
    /// hard glyph edges. Luma is the standard 0.299/0.587/0.114 weighting,
    /// contrast is a fixed 1.5x centered at mid-gray, and anything strictly
    /// above the cutoff goes white. Alpha passes through unchanged.
    pub fn preprocess(bytes: &[u8]) -> Result<Vec<u8>, PreprocessingError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| PreprocessingError::Decode(format!("{}", e)))?;

        let mut rgba: RgbaImage = decoded.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            let adjusted = (luma - 128.0) * CONTRAST_FACTOR + 128.0;
            let value = if adjusted > BINARIZE_CUTOFF { 255 } else { 0 };
            *pixel = Rgba([value, value, value, a]);
        }

        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| PreprocessingError::Encode(format!("{}", e)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(img: RgbaImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_detect_format_by_magic_bytes() {
        let png = encode_png(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])));
        assert_eq!(ImagePreprocessor::detect_format(&png), Some("png"));
        assert_eq!(
            ImagePreprocessor::detect_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some("jpeg")
        );
        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0x1A, 0x00, 0x00, 0x00]);
        webp.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(ImagePreprocessor::detect_format(&webp), Some("webp"));
        assert_eq!(ImagePreprocessor::detect_format(b"BM0123456789"), Some("bmp"));
        assert_eq!(ImagePreprocessor::detect_format(b"plain text"), None);
        assert_eq!(ImagePreprocessor::detect_format(&[]), None);
    }

    #[test]
    fn test_validate_rejects_unknown_container() {
        let result = ImagePreprocessor::validate_input(b"not an image", 1024);
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_payload() {
        let png = encode_png(RgbaImage::from_pixel(8, 8, Rgba([10, 10, 10, 255])));
        assert!(png.len() > 16);
        let result = ImagePreprocessor::validate_input(&png, 16);
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert!(ImagePreprocessor::validate_input(&png, 1024 * 1024).is_ok());
    }

    #[test]
    fn test_preprocess_binarizes_and_keeps_alpha() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([200, 200, 200, 130])); // bright, translucent
        img.put_pixel(1, 0, Rgba([50, 50, 50, 255])); // dark
        img.put_pixel(2, 0, Rgba([128, 128, 128, 255])); // exactly mid-gray
        let processed = ImagePreprocessor::preprocess(&encode_png(img)).unwrap();

        let round_trip = image::load_from_memory(&processed).unwrap().to_rgba8();
        assert_eq!(*round_trip.get_pixel(0, 0), Rgba([255, 255, 255, 130]));
        assert_eq!(*round_trip.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
        // Mid-gray is not strictly above the cutoff, so it lands black
        assert_eq!(*round_trip.get_pixel(2, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_preprocess_output_is_png() {
        let png = encode_png(RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255])));
        let processed = ImagePreprocessor::preprocess(&png).unwrap();
        assert_eq!(ImagePreprocessor::detect_format(&processed), Some("png"));
    }

    #[test]
    fn test_preprocess_rejects_undecodable_bytes() {
        let result = ImagePreprocessor::preprocess(b"garbage bytes");
        assert!(matches!(result, Err(PreprocessingError::Decode(_))));
    }
}
