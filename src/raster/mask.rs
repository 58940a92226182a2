use image::{GrayImage, Luma};
use std::io::Cursor;

use crate::raster::RasterError;

pub const BRUSH_MIN_DIAMETER: f32 = 5.0;
pub const BRUSH_MAX_DIAMETER: f32 = 50.0;

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// Removal mask authored with a round brush: black preserves, white marks
/// pixels for the object-removal endpoint. Sized to the source image's
/// native pixel dimensions and initialized fully black.
#[derive(Debug, Clone)]
pub struct MaskCanvas {
    image: GrayImage,
    last_point: Option<(f32, f32)>,
}

impl MaskCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, BLACK),
            last_point: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Paints a round-capped white segment from the previous gesture point
    /// to `point`, or a single dab when the gesture has no previous point.
    /// The endpoint becomes the start of the next stroke, so a continuous
    /// gesture leaves no gaps.
    pub fn stroke_to(&mut self, point: (f32, f32), diameter: f32) {
        let radius = diameter.clamp(BRUSH_MIN_DIAMETER, BRUSH_MAX_DIAMETER) / 2.0;
        match self.last_point {
            None => self.dab(point, radius),
            Some(from) => {
                let dx = point.0 - from.0;
                let dy = point.1 - from.1;
                // Stamp at one-pixel spacing; round caps and joins fall out
                // of the overlapping discs.
                let steps = (dx * dx + dy * dy).sqrt().ceil() as u32;
                for i in 0..=steps {
                    let t = if steps == 0 {
                        0.0
                    } else {
                        i as f32 / steps as f32
                    };
                    self.dab((from.0 + dx * t, from.1 + dy * t), radius);
                }
            }
        }
        self.last_point = Some(point);
    }

    /// Ends the current gesture; the next stroke starts with a fresh dab.
    pub fn end_gesture(&mut self) {
        self.last_point = None;
    }

    /// Refills the canvas fully black, discarding all strokes.
    pub fn reset(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = BLACK;
        }
        self.last_point = None;
    }

    /// Serializes the mask as the PNG payload the object-removal endpoint
    /// expects.
    pub fn to_png(&self) -> Result<Vec<u8>, RasterError> {
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(self.image.clone())
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| RasterError::Encoding(e.to_string()))?;
        Ok(out.into_inner())
    }

    fn dab(&mut self, center: (f32, f32), radius: f32) {
        let (width, height) = self.image.dimensions();
        let min_x = (center.0 - radius).floor().max(0.0) as u32;
        let min_y = (center.1 - radius).floor().max(0.0) as u32;
        let max_x = ((center.0 + radius).ceil() as i64).min(width as i64 - 1);
        let max_y = ((center.1 + radius).ceil() as i64).min(height as i64 - 1);
        if max_x < min_x as i64 || max_y < min_y as i64 {
            return;
        }
        let r2 = radius * radius;
        for y in min_y..=max_y as u32 {
            for x in min_x..=max_x as u32 {
                let dx = x as f32 - center.0;
                let dy = y as f32 - center.1;
                if dx * dx + dy * dy <= r2 {
                    self.image.put_pixel(x, y, WHITE);
                }
            }
        }
    }
}
