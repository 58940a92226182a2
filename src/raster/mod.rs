pub mod composite;
pub mod crop;
pub mod mask;

use image::RgbaImage;

pub use composite::{ExportedFile, composite_over, export};
pub use crop::{CropRect, CropSession, extract};
pub use mask::MaskCanvas;

/// Quality used for crop output, matching the encoder default.
pub const JPEG_DEFAULT_QUALITY: u8 = 75;
/// Quality used for composited downloads.
pub const JPEG_MAX_QUALITY: u8 = 100;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("could not decode image data: {0}")]
    Decoding(String),
    #[error("could not encode image data: {0}")]
    Encoding(String),
    #[error("selection has zero area")]
    EmptySelection,
    #[error("selection escapes the source bounds")]
    SelectionOutOfBounds,
}

/// Decodes arbitrary image bytes into an RGBA raster.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, RasterError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| RasterError::Decoding(e.to_string()))
}

/// Encodes a raster as JPEG. The format has no alpha channel, so the raster
/// is flattened to RGB first.
pub fn encode_jpeg(raster: &RgbaImage, quality: u8) -> Result<Vec<u8>, RasterError> {
    let rgb = image::DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| RasterError::Encoding(e.to_string()))?;
    Ok(out)
}
