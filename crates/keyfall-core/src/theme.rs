use keyfall_ports::render::Rgba;
use keyfall_ports::types::Lane;
use serde::{Deserialize, Serialize};

/// Demo file that swaps in the monochrome palette while it is loaded.
pub const MONOCHROME_DEMO: &str = "Bad Apple!!.mid";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub background: Rgba,
    pub bar_natural: Rgba,
    pub bar_accidental: Rgba,
    pub active_natural: Rgba,
    pub active_accidental: Rgba,
}

impl Palette {
    pub fn bar(&self, accidental: bool) -> Rgba {
        if accidental {
            self.bar_accidental
        } else {
            self.bar_natural
        }
    }

    pub fn active(&self, accidental: bool) -> Rgba {
        if accidental {
            self.active_accidental
        } else {
            self.active_natural
        }
    }
}

const fn palette(bg: Rgba, bar_w: Rgba, bar_b: Rgba, act_w: Rgba, act_b: Rgba) -> Palette {
    Palette {
        background: bg,
        bar_natural: bar_w,
        bar_accidental: bar_b,
        active_natural: act_w,
        active_accidental: act_b,
    }
}

const fn rgb(hex: u32) -> Rgba {
    Rgba::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

/// `alpha` in percent.
const fn rgba(r: u8, g: u8, b: u8, alpha: u8) -> Rgba {
    Rgba::rgba(r, g, b, (alpha as u16 * 255 / 100) as u8)
}

pub const THEMES: [(&str, Palette); 16] = [
    ("Classic", palette(rgb(0x111111), rgba(0, 150, 255, 60), rgba(0, 200, 150, 60), rgb(0x3faff9), rgb(0x3b89bc))),
    ("PianoVisual", palette(rgb(0x2e004f), rgba(200, 50, 200, 60), rgba(255, 0, 128, 60), rgb(0xd346ff), rgb(0xff1fb5))),
    ("Night", palette(rgb(0x000000), rgba(120, 120, 255, 70), rgba(180, 0, 255, 70), rgb(0xb799f9), rgb(0xca84e0))),
    ("Candy", palette(rgb(0x222222), rgba(255, 105, 180, 70), rgba(255, 182, 193, 70), rgb(0xf9acf5), rgb(0xf988e6))),
    ("Retro", palette(rgb(0x282828), rgba(255, 165, 0, 70), rgba(0, 255, 170, 70), rgb(0xffd166), rgb(0x06d6a0))),
    ("Neon", palette(rgb(0x050912), rgba(57, 255, 20, 80), rgba(0, 255, 255, 80), rgb(0x39ff14), rgb(0x00e5ff))),
    ("Hell", palette(rgb(0x4d2525), rgba(40, 15, 15, 80), rgba(0, 0, 0, 80), rgb(0x871414), rgb(0x5e1d1d))),
    ("Heaven", palette(rgb(0xaba693), rgba(214, 191, 96, 80), rgba(133, 120, 68, 80), rgb(0xb89918), rgb(0x87731f))),
    ("Ocean", palette(rgb(0x002b36), rgba(38, 139, 210, 70), rgba(7, 54, 66, 70), rgb(0x268bd2), rgb(0x073642))),
    ("Forest", palette(rgb(0x1b2f24), rgba(133, 193, 85, 70), rgba(42, 92, 47, 70), rgb(0x85c155), rgb(0x2a5c2f))),
    ("Sunset", palette(rgb(0x3e1f47), rgba(255, 94, 77, 70), rgba(255, 188, 117, 70), rgb(0xff5e4d), rgb(0xffbc75))),
    ("PastelDream", palette(rgb(0xf2e9e4), rgba(255, 179, 186, 60), rgba(255, 223, 186, 60), rgb(0xffb3ba), rgb(0xffdfba))),
    ("Monochrome", palette(rgb(0x1c1c1c), rgba(200, 200, 200, 60), rgba(100, 100, 100, 60), rgb(0xc8c8c8), rgb(0x646464))),
    ("Desert", palette(rgb(0x3f2b1f), rgba(232, 170, 95, 70), rgba(194, 123, 40, 70), rgb(0xe8aa5f), rgb(0xc27b28))),
    ("Cyberpunk", palette(rgb(0x0f0f1a), rgba(255, 0, 220, 80), rgba(0, 255, 240, 80), rgb(0xff00dc), rgb(0x00fff0))),
    ("Aurora", palette(rgb(0x08133b), rgba(106, 255, 237, 70), rgba(68, 130, 255, 70), rgb(0x6affed), rgb(0x4482ff))),
];

const DEMO_OVERRIDE: Palette = palette(
    rgb(0xf0f0f0),
    rgb(0x000000),
    rgb(0x000000),
    rgb(0x000000),
    rgb(0xd2d2d2),
);

/// Rhythm lanes cycle through this set.
pub const LANE_PALETTE: [Rgba; 4] = [rgb(0xff7675), rgb(0xffeaa7), rgb(0x55efc4), rgb(0x74b9ff)];

pub fn lane_color(lane: Lane) -> Rgba {
    LANE_PALETTE[lane as usize % LANE_PALETTE.len()]
}

pub fn palette_by_name(name: &str) -> Option<Palette> {
    THEMES
        .iter()
        .find(|(theme, _)| *theme == name)
        .map(|(_, palette)| *palette)
}

/// The user's chosen theme plus an optional override that lasts while a
/// particular demo is loaded. The table itself is never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct ThemeState {
    selected: String,
    demo_override: Option<Palette>,
}

impl ThemeState {
    pub fn new(name: &str) -> Self {
        let mut state = Self {
            selected: THEMES[0].0.to_string(),
            demo_override: None,
        };
        state.select(name);
        state
    }

    /// Unknown names fall back to the current selection.
    pub fn select(&mut self, name: &str) -> bool {
        if palette_by_name(name).is_none() {
            log::warn!("unknown theme {name:?}, keeping {:?}", self.selected);
            return false;
        }
        self.selected = name.to_string();
        true
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Applies or clears the demo override for a freshly loaded timeline.
    pub fn on_demo_loaded(&mut self, demo_name: Option<&str>) {
        self.demo_override = match demo_name {
            Some(MONOCHROME_DEMO) => Some(DEMO_OVERRIDE),
            _ => None,
        };
    }

    pub fn clear_override(&mut self) {
        self.demo_override = None;
    }

    pub fn has_override(&self) -> bool {
        self.demo_override.is_some()
    }

    pub fn palette(&self) -> Palette {
        self.demo_override
            .or_else(|| palette_by_name(&self.selected))
            .unwrap_or(THEMES[0].1)
    }
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::new("Classic")
    }
}
