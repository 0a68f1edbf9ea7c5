use image::RgbaImage;
use keyfall_ports::render::{Rect, RenderSurface, Rgba};

/// Software surface backed by an RGBA buffer. Used for headless frames and the
/// score card.
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.image.width() || y >= self.image.height() {
            return None;
        }
        let [r, g, b, a] = self.image.get_pixel(x, y).0;
        Some(Rgba::rgba(r, g, b, a))
    }

    /// Rectangle with corners rounded to `radius`.
    pub fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba) {
        let radius = radius.clamp(0.0, rect.w.min(rect.h) / 2.0);
        let rows = rect.h.ceil().max(0.0) as u32;
        for row in 0..rows {
            let y = row as f32 + 0.5;
            let from_edge = y.min(rect.h - y);
            let inset = if from_edge < radius {
                let dy = radius - from_edge;
                radius - (radius * radius - dy * dy).max(0.0).sqrt()
            } else {
                0.0
            };
            self.fill_rect(
                Rect::new(rect.x + inset, rect.y + row as f32, rect.w - 2.0 * inset, 1.0),
                color,
            );
        }
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba) {
        let px = self.image.get_pixel_mut(x, y);
        if color.a == 255 {
            px.0 = [color.r, color.g, color.b, 255];
            return;
        }
        let alpha = color.a as u32;
        let inv = 255 - alpha;
        let mix = |src: u8, dst: u8| ((src as u32 * alpha + dst as u32 * inv) / 255) as u8;
        let [r, g, b, a] = px.0;
        px.0 = [
            mix(color.r, r),
            mix(color.g, g),
            mix(color.b, b),
            (alpha + a as u32 * inv / 255).min(255) as u8,
        ];
    }
}

impl RenderSurface for RasterSurface {
    fn size(&self) -> Option<(f32, f32)> {
        if self.image.width() == 0 || self.image.height() == 0 {
            return None;
        }
        Some((self.image.width() as f32, self.image.height() as f32))
    }

    fn clear(&mut self, color: Rgba) {
        for px in self.image.pixels_mut() {
            px.0 = [color.r, color.g, color.b, color.a];
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        if color.a == 0 || rect.w <= 0.0 || rect.h <= 0.0 {
            return;
        }
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        let x0 = rect.x.round().clamp(0.0, w) as u32;
        let x1 = (rect.x + rect.w).round().clamp(0.0, w) as u32;
        let y0 = rect.y.round().clamp(0.0, h) as u32;
        let y1 = (rect.y + rect.h).round().clamp(0.0, h) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }
}
