use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Clips vertically to `[0, max_y)`. Returns `None` when nothing is left.
    pub fn clip_y(&self, max_y: f32) -> Option<Rect> {
        let top = self.y.max(0.0);
        let bottom = self.bottom().min(max_y);
        if bottom <= top {
            return None;
        }
        Some(Rect::new(self.x, top, self.w, bottom - top))
    }
}

/// Immediate-mode 2D surface, cleared and redrawn every frame.
pub trait RenderSurface {
    /// `None` while the surface is not attached yet; callers skip the frame.
    fn size(&self) -> Option<(f32, f32)>;
    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
}
