use crate::raster::RasterSurface;
use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{ImageFormat, RgbaImage};
use keyfall_ports::render::{Rect, RenderSurface, Rgba};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

pub const CARD_SIZE: u32 = 600;

const CARD_BACKGROUND: Rgba = Rgba::rgb(0x1e, 0x1e, 0x2e);
const TEXT: Rgba = Rgba::rgb(0xf5, 0xf5, 0xf5);
const ACCENT: Rgba = Rgba::rgb(0x55, 0xef, 0xc4);
const MUTED: Rgba = Rgba::rgb(0xa0, 0xa0, 0xb4);
const LOGO_PADS: [Rgba; 5] = [
    Rgba::rgb(0xff, 0x76, 0x75),
    Rgba::rgb(0xff, 0xea, 0xa7),
    Rgba::rgb(0x55, 0xef, 0xc4),
    Rgba::rgb(0x74, 0xb9, 0xff),
    Rgba::rgb(0xa2, 0x9b, 0xfe),
];

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(thiserror::Error, Debug)]
pub enum ScoreCardError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("font unusable: {0}")]
    Font(String),
}

/// Outline font used to set the card's text.
pub struct CardFont {
    font: FontVec,
}

impl CardFont {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ScoreCardError> {
        let font = FontVec::try_from_vec(data).map_err(|e| ScoreCardError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> Result<Self, ScoreCardError> {
        let data = std::fs::read(path)
            .map_err(|e| ScoreCardError::Font(format!("{}: {e}", path.display())))?;
        Self::from_bytes(data)
    }

    /// The configured font if it loads, else the first system font found.
    pub fn locate(configured: Option<&str>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::from_path(Path::new(path)) {
                Ok(font) => return Some(font),
                Err(err) => log::warn!("card font {path}: {err}"),
            }
        }
        let found = SYSTEM_FONTS
            .iter()
            .find_map(|path| Self::from_path(Path::new(path)).ok().map(|font| (*path, font)));
        match found {
            Some((path, font)) => {
                log::debug!("card font {path}");
                Some(font)
            }
            None => {
                log::warn!("no usable font found; score card text is omitted");
                None
            }
        }
    }

    /// Advance width of `text` at `px` pixels, kerning included.
    pub fn text_width(&self, text: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Sets `text` with its em box top at `top`, blending coverage into `surface`.
    fn draw(&self, surface: &mut RasterSurface, text: &str, x: f32, top: f32, px: f32, color: Rgba) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let baseline = top + scaled.ascent();
        let mut cursor = x;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                cursor += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(cursor, baseline));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let alpha = (coverage.clamp(0.0, 1.0) * f32::from(color.a)).round() as u8;
                    surface.fill_rect(
                        Rect::new(bounds.min.x + gx as f32, bounds.min.y + gy as f32, 1.0, 1.0),
                        color.with_alpha(alpha),
                    );
                });
            }
            cursor += scaled.h_advance(id);
            prev = Some(id);
        }
    }
}

/// End-of-game summary rendered to a shareable PNG.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub title: String,
    pub score: i64,
    pub longest_combo: u32,
    pub difficulty: String,
}

impl ScoreCard {
    /// Draws the card. Without a font only the frame and logo are drawn.
    pub fn render(&self, font: Option<&CardFont>) -> RgbaImage {
        let size = CARD_SIZE as f32;
        let mut surface = RasterSurface::new(CARD_SIZE, CARD_SIZE);
        surface.clear(Rgba::rgba(0, 0, 0, 0));
        surface.fill_rounded_rect(Rect::new(0.0, 0.0, size, size), 36.0, CARD_BACKGROUND);

        let pad = 56.0;
        let gap = 16.0;
        let logo_w = pad * 5.0 + gap * 4.0;
        let mut x = (size - logo_w) / 2.0;
        for color in LOGO_PADS {
            surface.fill_rounded_rect(Rect::new(x, 60.0, pad, pad), 10.0, color);
            x += pad + gap;
        }

        let Some(font) = font else {
            return surface.into_image();
        };
        let lines = [
            (self.title.clone(), 160.0, 52.0, ACCENT),
            ("Score".to_string(), 250.0, 26.0, MUTED),
            (self.score.to_string(), 282.0, 64.0, TEXT),
            ("Longest combo".to_string(), 380.0, 26.0, MUTED),
            (self.longest_combo.to_string(), 412.0, 44.0, TEXT),
            (format!("Difficulty: {}", self.difficulty), 510.0, 26.0, MUTED),
        ];
        for (text, top, px, color) in lines {
            let x = (size - font.text_width(&text, px)) / 2.0;
            font.draw(&mut surface, &text, x, top, px, color);
        }

        surface.into_image()
    }

    pub fn encode_png(&self, font: Option<&CardFont>) -> Result<Vec<u8>, ScoreCardError> {
        let mut out = Cursor::new(Vec::new());
        self.render(font).write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn save_png(&self, path: &Path, font: Option<&CardFont>) -> Result<(), ScoreCardError> {
        self.render(font).save_with_format(path, ImageFormat::Png)?;
        log::info!("score card written to {}", path.display());
        Ok(())
    }
}
