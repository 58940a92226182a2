use image::{Rgba, RgbaImage};

use crate::queue::BackgroundColor;
use crate::raster::{self, RasterError};
use crate::tools::{self, Tool};

/// Bytes plus the filename they should be downloaded under.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Standard alpha-over compositing of the foreground onto a solid opaque
/// fill of the same size. Pure and deterministic.
pub fn composite_over(foreground: &RgbaImage, color: [u8; 3]) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(
        foreground.width(),
        foreground.height(),
        Rgba([color[0], color[1], color[2], 255]),
    );
    for (x, y, px) in foreground.enumerate_pixels() {
        let alpha = px[3] as u32;
        let under = out.get_pixel_mut(x, y);
        for channel in 0..3 {
            let fg = px[channel] as u32;
            let bg = under[channel] as u32;
            under[channel] = ((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8;
        }
        under[3] = 255;
    }
    out
}

/// Prepares a task result for download. The `Transparent` sentinel, and any
/// tool other than background removal, pass the result bytes through
/// untouched; a solid selection composites and re-encodes as JPEG at maximum
/// quality under the identity-photo naming override.
pub fn export(
    result_bytes: &[u8],
    background: BackgroundColor,
    tool: Tool,
    result_file_name: Option<&str>,
    original_name: &str,
) -> Result<ExportedFile, RasterError> {
    let color = match background {
        BackgroundColor::Solid(color) if tool == Tool::BackgroundRemoval => color,
        _ => {
            let file_name = result_file_name
                .map(str::to_string)
                .unwrap_or_else(|| format!("processed_{}", original_name));
            return Ok(ExportedFile {
                bytes: result_bytes.to_vec(),
                file_name,
            });
        }
    };

    let foreground = raster::decode(result_bytes)?;
    let composed = composite_over(&foreground, color);
    let bytes = raster::encode_jpeg(&composed, raster::JPEG_MAX_QUALITY)?;
    Ok(ExportedFile {
        bytes,
        file_name: format!("id_photo_{}.jpg", tools::file_stem(original_name)),
    })
}
