use keyfall_ports::render::Rect;
use keyfall_ports::types::{is_accidental, Lane};

pub const PIANO_LOWEST: Lane = 21;
pub const PIANO_HIGHEST: Lane = 108;
pub const WHITE_KEY_COUNT: usize = 52;

/// Fraction of the viewport height given to the tap zone under the rhythm track.
const RHYTHM_TAP_ZONE: f32 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneGeometry {
    pub lane: Lane,
    /// Horizontal extent of the lane's falling bars.
    pub column: Rect,
    /// Clickable area: the key in piano mode, the tap zone in rhythm mode.
    pub target: Rect,
    pub accidental: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    Piano,
    Rhythm,
}

/// Precomputed lane geometry shared by the renderer and the pointer router.
#[derive(Clone, Debug)]
pub struct LaneLayout {
    kind: LayoutKind,
    width: f32,
    height: f32,
    track_height: f32,
    lanes: Vec<LaneGeometry>,
}

impl LaneLayout {
    /// 88-key keyboard across the bottom; white width = width / 52, key height
    /// four times that, black keys 60% of both and centred on the boundary.
    pub fn piano(width: f32, height: f32) -> Self {
        let white_w = width / WHITE_KEY_COUNT as f32;
        let key_h = (white_w * 4.0).min(height * 0.5);
        let track_height = (height - key_h).max(0.0);
        let black_w = white_w * 0.6;
        let black_h = key_h * 0.6;

        let mut lanes = Vec::with_capacity((PIANO_HIGHEST - PIANO_LOWEST + 1) as usize);
        let mut white_index = 0usize;
        for lane in PIANO_LOWEST..=PIANO_HIGHEST {
            let accidental = is_accidental(lane);
            let (x, w, h) = if accidental {
                // sits on the right edge of the previous white key
                (white_index as f32 * white_w - black_w / 2.0, black_w, black_h)
            } else {
                let x = white_index as f32 * white_w;
                white_index += 1;
                (x, white_w, key_h)
            };
            lanes.push(LaneGeometry {
                lane,
                column: Rect::new(x, 0.0, w, track_height),
                target: Rect::new(x, track_height, w, h),
                accidental,
            });
        }

        Self {
            kind: LayoutKind::Piano,
            width,
            height,
            track_height,
            lanes,
        }
    }

    /// Equal-width columns; the bottom strip is the tap zone.
    pub fn rhythm(lane_count: Lane, width: f32, height: f32) -> Self {
        let count = lane_count.max(1);
        let lane_w = width / count as f32;
        let track_height = height * (1.0 - RHYTHM_TAP_ZONE);
        let lanes = (0..count)
            .map(|lane| {
                let x = lane as f32 * lane_w;
                LaneGeometry {
                    lane,
                    column: Rect::new(x, 0.0, lane_w, track_height),
                    target: Rect::new(x, 0.0, lane_w, height),
                    accidental: false,
                }
            })
            .collect();

        Self {
            kind: LayoutKind::Rhythm,
            width,
            height,
            track_height,
            lanes,
        }
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Height of the falling-bar track; also the y of the hit line.
    pub fn track_height(&self) -> f32 {
        self.track_height
    }

    pub fn hit_line_y(&self) -> f32 {
        self.track_height
    }

    pub fn lanes(&self) -> &[LaneGeometry] {
        &self.lanes
    }

    pub fn geometry(&self, lane: Lane) -> Option<&LaneGeometry> {
        match self.kind {
            LayoutKind::Piano => {
                let idx = lane.checked_sub(PIANO_LOWEST)? as usize;
                self.lanes.get(idx)
            }
            LayoutKind::Rhythm => self.lanes.get(lane as usize),
        }
    }

    /// Lane under a point. Black keys overlap white ones and win.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<Lane> {
        self.lanes
            .iter()
            .filter(|g| g.accidental)
            .chain(self.lanes.iter().filter(|g| !g.accidental))
            .find(|g| g.target.contains(x, y))
            .map(|g| g.lane)
    }
}
