//! Image codec trait and the production JPEG codec.
//!
//! Workers only ever see [`ImageCodec`]: probe the header, decode, and encode
//! at a fixed quality. [`JpegCodec`] decodes anything the `image` crate was
//! compiled with (JPEG, PNG, TIFF, WebP, GIF) and always encodes JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// Lossy encoding quality (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Processed images are always written at 90.
impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Decode/encode primitives consumed by the per-item worker.
///
/// `Send + Sync` so one codec is shared by every worker of the pool.
pub trait ImageCodec: Send + Sync {
    /// Read dimensions from the header without decoding pixels.
    fn dimensions(&self, bytes: &[u8]) -> Result<Dimensions, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError>;

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, CodecError>;

    /// File extension of encoded output, without the dot.
    fn extension(&self) -> &'static str;
}

/// `image`-crate decoding with JPEG output.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for JpegCodec {
    fn dimensions(&self, bytes: &[u8]) -> Result<Dimensions, CodecError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        Ok(image::load_from_memory(bytes)?)
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.value());
        // JPEG has no alpha channel; transparent areas flatten to black
        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        Ok(buffer)
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }
}
