use keyfall_core::{
    project, timeline_bars, FrameInput, LaneLayout, RasterSurface, ScrollRenderer, ThemeState,
};
use keyfall_domain_timeline::{Note, Timeline, TimelineSource};
use keyfall_ports::render::{Rect, RenderSurface, Rgba};
use std::collections::HashSet;

struct Detached {
    fills: usize,
}

impl RenderSurface for Detached {
    fn size(&self) -> Option<(f32, f32)> {
        None
    }

    fn clear(&mut self, _color: Rgba) {
        self.fills += 1;
    }

    fn fill_rect(&mut self, _rect: Rect, _color: Rgba) {
        self.fills += 1;
    }
}

fn ladder(lead: f64) -> Timeline {
    let notes = (0..20)
        .map(|i| Note::new(60 + (i % 12) as u8, i as f64, 0.5))
        .collect();
    Timeline::from_notes(TimelineSource::Midi, lead, notes)
}

#[test]
fn leading_edge_meets_hit_line_at_impact() {
    let note = Note::new(60, 2.0, 0.5);
    let at_impact = project(&note, 4.0, 6.0, 500.0).expect("visible at impact");
    assert!((at_impact.y_bottom - 500.0).abs() < 1e-3);
    assert!((at_impact.y_top - (500.0 - 0.5 * 125.0)).abs() < 1e-3);

    let entering = project(&note, 4.0, 2.0, 500.0).expect("visible when entering");
    assert!(entering.y_bottom.abs() < 1e-3);
}

#[test]
fn notes_outside_the_window_are_culled() {
    let note = Note::new(60, 2.0, 0.5);
    assert!(project(&note, 4.0, 1.9, 500.0).is_none());
    assert!(project(&note, 4.0, 6.5, 500.0).is_none());
    assert!(project(&note, 4.0, 6.49, 500.0).is_some());
    assert!(project(&note, 0.0, 2.0, 500.0).is_none());
}

#[test]
fn seek_shows_only_notes_near_the_new_position() {
    let timeline = ladder(4.0);
    let layout = LaneLayout::piano(1040.0, 600.0);
    let palette = ThemeState::default().palette();

    let bars = timeline_bars(&timeline, &layout, &palette, 13.0);
    assert!(!bars.is_empty());
    for bar in &bars {
        assert!(bar.remaining > -0.5 && bar.remaining <= 4.0, "{bar:?}");
        assert!(bar.rect.y >= 0.0);
        assert!(bar.rect.bottom() <= layout.track_height() + 1e-3);
    }
    // onsets 9..=12 are on screen; onset 13 is just entering with zero height
    let mut onsets: Vec<f64> = bars.iter().map(|bar| 13.0 - 4.0 + bar.remaining).collect();
    onsets.sort_by(f64::total_cmp);
    assert_eq!(onsets, vec![9.0, 10.0, 11.0, 12.0]);
}

#[test]
fn rhythm_layout_hides_consumed_notes() {
    let notes = vec![Note::new(0, 0.0, 0.2), Note::new(1, 0.0, 0.2)];
    let mut timeline = Timeline::from_notes(TimelineSource::Generated, 2.0, notes);
    assert!(timeline.consume(0));
    let layout = LaneLayout::rhythm(4, 400.0, 800.0);
    let palette = ThemeState::default().palette();

    let bars = timeline_bars(&timeline, &layout, &palette, 1.0);
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].lane, 1);
}

#[test]
fn detached_surface_skips_the_frame() {
    let timeline = ladder(4.0);
    let mut renderer = ScrollRenderer::new(LaneLayout::piano(1040.0, 600.0));
    let mut surface = Detached { fills: 0 };
    let active = HashSet::new();
    let palette = ThemeState::default().palette();

    let report = renderer.render(
        &mut surface,
        FrameInput {
            timeline: Some(&timeline),
            now: 10.0,
            active: &active,
            palette: &palette,
            live_heights: None,
            damage: 0.0,
        },
    );
    assert!(report.is_none());
    assert_eq!(surface.fills, 0);
}

#[test]
fn renderer_follows_surface_size() {
    let timeline = ladder(4.0);
    let mut renderer = ScrollRenderer::new(LaneLayout::piano(1280.0, 720.0));
    let mut surface = RasterSurface::new(520, 300);
    let active = HashSet::new();
    let palette = ThemeState::default().palette();

    let report = renderer
        .render(
            &mut surface,
            FrameInput {
                timeline: Some(&timeline),
                now: 10.0,
                active: &active,
                palette: &palette,
                live_heights: None,
                damage: 0.0,
            },
        )
        .expect("surface has a size");
    assert_eq!(renderer.layout().size(), (520.0, 300.0));
    assert!(!report.bars.is_empty());
    assert!(report.live_bars.is_empty());
}

#[test]
fn held_keys_grow_live_bars_without_a_timeline() {
    let mut renderer = ScrollRenderer::new(LaneLayout::piano(1040.0, 600.0));
    let mut surface = RasterSurface::new(1040, 600);
    let active: HashSet<u8> = [60, 64].into_iter().collect();
    let palette = ThemeState::default().palette();
    let heights = |lane: u8| if lane == 60 { 40.0 } else { 1000.0 };

    let report = renderer
        .render(
            &mut surface,
            FrameInput {
                timeline: None,
                now: 0.0,
                active: &active,
                palette: &palette,
                live_heights: Some(&heights),
                damage: 0.0,
            },
        )
        .expect("surface has a size");
    assert_eq!(report.live_bars.len(), 2);
    let track = renderer.layout().track_height();
    for bar in &report.live_bars {
        assert!((bar.rect.bottom() - track).abs() < 1e-3);
        assert!(bar.rect.y >= 0.0);
    }
    assert!((report.live_bars[0].rect.h - 40.0).abs() < 1e-3);
}
