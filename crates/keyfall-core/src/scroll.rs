use crate::layout::{LaneLayout, LayoutKind};
use crate::theme::{lane_color, Palette};
use keyfall_domain_timeline::{Note, Timeline};
use keyfall_ports::render::{Rect, RenderSurface, Rgba};
use keyfall_ports::types::{Lane, Seconds};
use std::collections::HashSet;

const KEY_WHITE: Rgba = Rgba::rgb(0xf5, 0xf5, 0xf5);
const KEY_BLACK: Rgba = Rgba::rgb(0x11, 0x11, 0x11);
const TRACK_SHADE: Rgba = Rgba::rgb(0x22, 0x22, 0x22);
const HIT_LINE: Rgba = Rgba::rgba(0xff, 0xff, 0xff, 0x80);

/// Vertical span of a note at a given transport time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Seconds until the leading edge reaches the hit line.
    pub remaining: Seconds,
    pub y_top: f32,
    pub y_bottom: f32,
}

/// Maps a note onto the track. `None` when it is fully past or not yet in view.
///
/// `y_bottom = (1 - remaining / lead) * track_height`, so the leading edge sits
/// on the hit line exactly when `remaining == 0`.
pub fn project(
    note: &Note,
    lead: Seconds,
    now: Seconds,
    track_height: f32,
) -> Option<Projection> {
    if lead <= 0.0 {
        return None;
    }
    let remaining = note.onset + lead - now;
    if remaining <= -note.duration || remaining > lead {
        return None;
    }
    let px_per_sec = track_height as f64 / lead;
    let y_bottom = (1.0 - remaining / lead) * track_height as f64;
    let y_top = y_bottom - note.duration * px_per_sec;
    Some(Projection {
        remaining,
        y_top: y_top as f32,
        y_bottom: y_bottom as f32,
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub lane: Lane,
    pub rect: Rect,
    pub color: Rgba,
    pub remaining: Seconds,
}

/// What one frame drew, for hosts and tests that inspect it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub bars: Vec<Bar>,
    pub live_bars: Vec<Bar>,
}

#[derive(Clone, Copy)]
pub struct FrameInput<'a> {
    pub timeline: Option<&'a Timeline>,
    pub now: Seconds,
    pub active: &'a HashSet<Lane>,
    pub palette: &'a Palette,
    /// Height of each held key's free-play bar; full track height when absent.
    pub live_heights: Option<&'a dyn Fn(Lane) -> f32>,
    /// Red wash over the field, 0..=1.
    pub damage: f32,
}

/// Bars the timeline contributes at `now`, back to front.
pub fn timeline_bars(
    timeline: &Timeline,
    layout: &LaneLayout,
    palette: &Palette,
    now: Seconds,
) -> Vec<Bar> {
    let lead = timeline.lead_secs();
    let track_height = layout.track_height();
    timeline
        .notes()
        .iter()
        .filter(|note| !(layout.kind() == LayoutKind::Rhythm && note.consumed))
        .filter_map(|note| {
            let geometry = layout.geometry(note.lane)?;
            let projection = project(note, lead, now, track_height)?;
            let rect = Rect::new(
                geometry.column.x,
                projection.y_top,
                geometry.column.w,
                projection.y_bottom - projection.y_top,
            )
            .clip_y(track_height)?;
            let color = match layout.kind() {
                LayoutKind::Piano => palette.bar(geometry.accidental),
                LayoutKind::Rhythm => lane_color(note.lane),
            };
            Some(Bar {
                lane: note.lane,
                rect,
                color,
                remaining: projection.remaining,
            })
        })
        .collect()
}

/// Immediate-mode frame painter over a [`RenderSurface`].
pub struct ScrollRenderer {
    layout: LaneLayout,
}

impl ScrollRenderer {
    pub fn new(layout: LaneLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LaneLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: LaneLayout) {
        self.layout = layout;
    }

    /// Draws one frame. Returns `None` and draws nothing while the surface has
    /// no size yet.
    pub fn render(
        &mut self,
        surface: &mut dyn RenderSurface,
        frame: FrameInput<'_>,
    ) -> Option<FrameReport> {
        let (width, height) = surface.size()?;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        if self.layout.size() != (width, height) {
            self.layout = match self.layout.kind() {
                LayoutKind::Piano => LaneLayout::piano(width, height),
                LayoutKind::Rhythm => {
                    LaneLayout::rhythm(self.layout.lanes().len() as Lane, width, height)
                }
            };
        }

        surface.clear(frame.palette.background);
        let mut report = FrameReport::default();

        if self.layout.kind() == LayoutKind::Rhythm {
            for geometry in self.layout.lanes() {
                surface.fill_rect(geometry.column, TRACK_SHADE);
            }
        }

        match frame.timeline {
            Some(timeline) => {
                report.bars = timeline_bars(timeline, &self.layout, frame.palette, frame.now);
                for bar in &report.bars {
                    surface.fill_rect(bar.rect, bar.color);
                }
            }
            None if self.layout.kind() == LayoutKind::Piano => {
                report.live_bars = self.live_bars(&frame);
                for bar in &report.live_bars {
                    surface.fill_rect(bar.rect, bar.color);
                }
            }
            None => {}
        }

        let hit_y = self.layout.hit_line_y();
        surface.fill_rect(Rect::new(0.0, hit_y - 1.0, width, 2.0), HIT_LINE);
        self.draw_targets(surface, &frame);

        if frame.damage > 0.0 {
            let alpha = (frame.damage.clamp(0.0, 1.0) * 96.0) as u8;
            surface.fill_rect(
                Rect::new(0.0, 0.0, width, height),
                Rgba::rgba(0xff, 0x20, 0x20, alpha),
            );
        }

        Some(report)
    }

    /// Upward bars from each held key toward the top of the track.
    fn live_bars(&self, frame: &FrameInput<'_>) -> Vec<Bar> {
        let track_height = self.layout.track_height();
        let mut lanes: Vec<Lane> = frame.active.iter().copied().collect();
        lanes.sort_unstable();
        lanes
            .into_iter()
            .filter_map(|lane| {
                let geometry = self.layout.geometry(lane)?;
                let height = frame
                    .live_heights
                    .map(|h| h(lane))
                    .unwrap_or(track_height)
                    .clamp(0.0, track_height);
                Some(Bar {
                    lane,
                    rect: Rect::new(
                        geometry.column.x,
                        track_height - height,
                        geometry.column.w,
                        height,
                    ),
                    color: frame.palette.bar(geometry.accidental),
                    remaining: 0.0,
                })
            })
            .collect()
    }

    fn draw_targets(&self, surface: &mut dyn RenderSurface, frame: &FrameInput<'_>) {
        match self.layout.kind() {
            LayoutKind::Piano => {
                // whites first so blacks paint over them
                for accidental in [false, true] {
                    for geometry in self.layout.lanes().iter().filter(|g| g.accidental == accidental) {
                        let color = if frame.active.contains(&geometry.lane) {
                            frame.palette.active(accidental)
                        } else if accidental {
                            KEY_BLACK
                        } else {
                            KEY_WHITE
                        };
                        surface.fill_rect(geometry.target, color);
                    }
                }
            }
            LayoutKind::Rhythm => {
                let hit_y = self.layout.hit_line_y();
                let (_, height) = self.layout.size();
                for geometry in self.layout.lanes() {
                    let alpha = if frame.active.contains(&geometry.lane) {
                        0xaa
                    } else {
                        0x22
                    };
                    let zone = Rect::new(geometry.column.x, hit_y, geometry.column.w, height - hit_y);
                    surface.fill_rect(zone, lane_color(geometry.lane).with_alpha(alpha));
                }
            }
        }
    }
}
