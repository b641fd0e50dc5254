use image::{ColorType, DynamicImage};
use std::path::Path;
use thiserror::Error;

use crate::hash;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image source is empty")]
    Empty,
    #[error("Image has zero size ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
}

/// A decoded, untouched image: 8-bit luminance or 8-bit RGB.
#[derive(Debug, Clone)]
pub struct RawImage {
    source: String,
    pixels: DynamicImage,
}

impl RawImage {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// 1 for grayscale, 3 for RGB.
    pub fn channels(&self) -> u8 {
        self.pixels.color().channel_count()
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

/// Read and decode an image file. The file name becomes the source identifier.
pub fn load_from_path(path: &Path) -> Result<RawImage, LoadError> {
    let data = std::fs::read(path)?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_from_bytes(&data, &source)
}

/// Decode in-memory bytes (JPEG / PNG / WEBP / …) under the given source name.
pub fn load_from_bytes(data: &[u8], source: &str) -> Result<RawImage, LoadError> {
    if data.is_empty() {
        return Err(LoadError::Empty);
    }
    let decoded = image::load_from_memory(data)?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(LoadError::ZeroSized { width, height });
    }

    let pixels = match decoded.color() {
        ColorType::L8 | ColorType::Rgb8 => decoded,
        // Alpha and 16-bit depth carry nothing useful for recognition.
        ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            DynamicImage::ImageLuma8(decoded.to_luma8())
        }
        _ => DynamicImage::ImageRgb8(decoded.to_rgb8()),
    };

    tracing::debug!(source, width, height, channels = pixels.color().channel_count(), "image decoded");
    Ok(RawImage { source: source.to_string(), pixels })
}

/// Decode bytes that arrived without a name; the source id is derived from the content.
pub fn load_anonymous(data: &[u8]) -> Result<RawImage, LoadError> {
    load_from_bytes(data, &hash::content_source_id(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn zero_byte_input_is_rejected() {
        assert!(matches!(load_from_bytes(b"", "empty.png"), Err(LoadError::Empty)));
    }

    #[test]
    fn corrupt_input_is_rejected() {
        let err = load_from_bytes(b"\x89PNG\r\n\x1a\nnot really", "bad.png").unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }

    #[test]
    fn grayscale_png_keeps_one_channel() {
        let img: GrayImage = ImageBuffer::from_fn(6, 4, |x, _| Luma([(x * 40) as u8]));
        let raw = load_from_bytes(&encode(DynamicImage::ImageLuma8(img)), "g.png").unwrap();
        assert_eq!((raw.width(), raw.height(), raw.channels()), (6, 4, 1));
        assert_eq!(raw.source(), "g.png");
    }

    #[test]
    fn rgba_is_flattened_to_rgb() {
        let img: RgbaImage = ImageBuffer::from_fn(3, 3, |_, _| Rgba([10, 20, 30, 128]));
        let raw = load_from_bytes(&encode(DynamicImage::ImageRgba8(img)), "a.png").unwrap();
        assert_eq!(raw.channels(), 3);
    }

    #[test]
    fn path_source_is_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_07.png");
        let img: GrayImage = ImageBuffer::from_fn(2, 2, |_, _| Luma([9u8]));
        std::fs::write(&path, encode(DynamicImage::ImageLuma8(img))).unwrap();

        let raw = load_from_path(&path).unwrap();
        assert_eq!(raw.source(), "invoice_07.png");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn anonymous_source_uses_content_hash() {
        let img: GrayImage = ImageBuffer::from_fn(2, 2, |_, _| Luma([1u8]));
        let raw = load_anonymous(&encode(DynamicImage::ImageLuma8(img))).unwrap();
        assert!(raw.source().starts_with("sha256:"));
    }
}
