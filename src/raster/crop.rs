use image::RgbaImage;
use uuid::Uuid;

use crate::raster::RasterError;

/// Pixel-space rectangle within a source raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Copies exactly the rectangle's samples out of the source. No resampling:
/// source and destination scale are identical, so this is a direct
/// pixel-for-pixel copy and repeated calls on the same input are
/// byte-identical.
pub fn extract(source: &RgbaImage, rect: CropRect) -> Result<RgbaImage, RasterError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(RasterError::EmptySelection);
    }
    if rect.x as u64 + rect.width as u64 > source.width() as u64
        || rect.y as u64 + rect.height as u64 > source.height() as u64
    {
        return Err(RasterError::SelectionOutOfBounds);
    }

    let mut out = RgbaImage::new(rect.width, rect.height);
    for y in 0..rect.height {
        for x in 0..rect.width {
            out.put_pixel(x, y, *source.get_pixel(rect.x + x, rect.y + y));
        }
    }
    Ok(out)
}

/// Initial rectangle: 90% of the shorter constrained dimension for the given
/// aspect, centered in the source.
fn centered_rect(source_width: u32, source_height: u32, aspect: f32) -> CropRect {
    let width_constrained = (source_width as f32 * 0.9) / aspect <= source_height as f32;
    let (w, h) = if width_constrained {
        let w = source_width as f32 * 0.9;
        (w, w / aspect)
    } else {
        let h = source_height as f32 * 0.9;
        (h * aspect, h)
    };
    let width = (w.round() as u32).clamp(1, source_width);
    let height = (h.round() as u32).clamp(1, source_height);
    CropRect {
        x: (source_width - width) / 2,
        y: (source_height - height) / 2,
        width,
        height,
    }
}

/// Crop-authoring state for one task. Holds the pending rectangle and an
/// optional fixed aspect ratio; created with a centered default rectangle at
/// the source's own aspect.
#[derive(Debug, Clone)]
pub struct CropSession {
    task_id: Uuid,
    source_width: u32,
    source_height: u32,
    rect: CropRect,
    aspect: Option<f32>,
}

impl CropSession {
    pub fn new(task_id: Uuid, source_width: u32, source_height: u32) -> Self {
        let natural = source_width as f32 / source_height as f32;
        Self {
            task_id,
            source_width,
            source_height,
            rect: centered_rect(source_width, source_height, natural),
            aspect: None,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn rect(&self) -> CropRect {
        self.rect
    }

    pub fn aspect(&self) -> Option<f32> {
        self.aspect
    }

    pub fn set_rect(&mut self, rect: CropRect) {
        self.rect = rect;
    }

    /// Fixing an aspect recomputes the centered default for that ratio;
    /// releasing it keeps the current rectangle.
    pub fn set_aspect(&mut self, aspect: Option<f32>) {
        self.aspect = aspect;
        if let Some(ratio) = aspect {
            self.rect = centered_rect(self.source_width, self.source_height, ratio);
        }
    }
}
