use keyfall_core::{
    InputRouter, InputSource, KeyBindings, LaneChange, LaneLayout, MidiLaneMap, PointerPhase,
    RawInput, Routed,
};
use keyfall_ports::midi::MidiLikeEvent;
use pretty_assertions::assert_eq;

fn key(code: &str, down: bool) -> RawInput {
    RawInput::Key {
        code: code.to_string(),
        down,
        repeat: false,
    }
}

fn pointer(id: u64, layout: &LaneLayout, lane: u8, phase: PointerPhase) -> RawInput {
    let target = layout.geometry(lane).expect("lane on layout").target;
    RawInput::Pointer {
        id,
        x: target.x + target.w / 2.0,
        y: target.y + target.h * 0.9,
        phase,
    }
}

fn changes(routed: Vec<Routed>) -> Vec<(u8, bool)> {
    routed
        .into_iter()
        .filter_map(|routed| match routed {
            Routed::Lane(LaneChange { lane, active, .. }) => Some((lane, active)),
            Routed::Source(_) | Routed::Pedal { .. } => None,
        })
        .collect()
}

#[test]
fn lane_stays_active_while_any_source_holds_it() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);

    assert_eq!(changes(router.handle(key("KeyA", true), &layout)), vec![(60, true)]);
    assert_eq!(
        changes(router.handle(pointer(1, &layout, 60, PointerPhase::Down), &layout)),
        vec![]
    );
    assert_eq!(
        changes(router.handle(RawInput::Midi(MidiLikeEvent::NoteOn { note: 60, velocity: 90 }), &layout)),
        vec![]
    );

    assert_eq!(changes(router.handle(key("KeyA", false), &layout)), vec![]);
    assert!(router.activation().is_active(60));
    assert_eq!(
        changes(router.handle(pointer(1, &layout, 60, PointerPhase::Up), &layout)),
        vec![]
    );
    assert_eq!(
        changes(router.handle(RawInput::Midi(MidiLikeEvent::NoteOff { note: 60 }), &layout)),
        vec![(60, false)]
    );
    assert!(!router.activation().is_active(60));
}

#[test]
fn auto_repeat_and_unbound_keys_are_ignored() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);

    assert_eq!(changes(router.handle(key("KeyS", true), &layout)), vec![(62, true)]);
    let repeat = RawInput::Key {
        code: "KeyS".to_string(),
        down: true,
        repeat: true,
    };
    assert_eq!(changes(router.handle(repeat, &layout)), vec![]);
    assert_eq!(changes(router.handle(key("KeyS", true), &layout)), vec![]);
    assert_eq!(changes(router.handle(key("KeyZ", true), &layout)), vec![]);
    assert_eq!(changes(router.handle(key("KeyS", false), &layout)), vec![(62, false)]);
}

#[test]
fn pointer_slide_releases_old_lane_before_pressing_new() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);

    router.handle(pointer(7, &layout, 60, PointerPhase::Down), &layout);
    let slid = changes(router.handle(pointer(7, &layout, 62, PointerPhase::Move), &layout));
    assert_eq!(slid, vec![(60, false), (62, true)]);
    assert_eq!(router.active_lanes().len(), 1);

    let same = changes(router.handle(pointer(7, &layout, 62, PointerPhase::Move), &layout));
    assert_eq!(same, vec![]);
    assert_eq!(
        changes(router.handle(pointer(7, &layout, 62, PointerPhase::Cancel), &layout)),
        vec![(62, false)]
    );
}

#[test]
fn black_keys_win_the_overlap() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let black = layout.geometry(61).expect("C#4").target;
    let hit = layout.hit_test(black.x + black.w / 2.0, black.y + 2.0);
    assert_eq!(hit, Some(61));
}

#[test]
fn focus_loss_releases_everything() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);
    router.handle(key("KeyA", true), &layout);
    router.handle(key("KeyD", true), &layout);
    router.handle(pointer(3, &layout, 72, PointerPhase::Down), &layout);

    let released = changes(router.handle(RawInput::FocusLost, &layout));
    assert_eq!(released, vec![(60, false), (64, false), (72, false)]);
    assert!(router.active_lanes().is_empty());

    // the key is pressable again without an intervening key-up
    assert_eq!(changes(router.handle(key("KeyA", true), &layout)), vec![(60, true)]);
}

#[test]
fn controller_notes_wrap_into_rhythm_lanes() {
    let layout = LaneLayout::rhythm(4, 400.0, 800.0);
    let mut router = InputRouter::new(KeyBindings::rhythm(4), MidiLaneMap::Wrap(4));
    let decoded = MidiLikeEvent::from_bytes(&[0x90, 61, 80]).expect("note on");
    assert_eq!(changes(router.handle(RawInput::Midi(decoded), &layout)), vec![(1, true)]);

    let zero_velocity = MidiLikeEvent::from_bytes(&[0x90, 61, 0]).expect("note off");
    assert_eq!(
        changes(router.handle(RawInput::Midi(zero_velocity), &layout)),
        vec![(1, false)]
    );
}

#[test]
fn sustain_pedal_passes_through() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);
    let routed = router.handle(RawInput::Midi(MidiLikeEvent::Cc64 { value: 127 }), &layout);
    assert_eq!(routed, vec![Routed::Pedal { value: 127 }]);
}

#[test]
fn playback_holds_release_independently() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);
    router.press_source(60, InputSource::Playback);
    router.press_source(64, InputSource::Playback);
    router.handle(key("KeyA", true), &layout);

    let released: Vec<u8> = router
        .release_all_from(InputSource::Playback)
        .into_iter()
        .map(|change| change.lane)
        .collect();
    assert_eq!(released, vec![64]);
    assert!(router.activation().is_held_by(60, InputSource::Keyboard));
}

#[test]
fn bindings_look_up_codes_by_lane() {
    let rhythm = KeyBindings::rhythm(4);
    assert_eq!(rhythm.code_for(0), Some("KeyD"));
    assert_eq!(rhythm.code_for(3), Some("KeyK"));
    assert_eq!(rhythm.code_for(4), None);

    let shared = KeyBindings::new(&[("KeyB", 2), ("KeyA", 2)]);
    assert_eq!(shared.code_for(2), Some("KeyA"));
    assert_eq!(KeyBindings::numbered(10).code_for(9), Some("Digit0"));
}

fn source_changes(routed: &[Routed]) -> Vec<(u8, bool, InputSource)> {
    routed
        .iter()
        .filter_map(|routed| match routed {
            Routed::Source(change) => Some((change.lane, change.active, change.source)),
            _ => None,
        })
        .collect()
}

#[test]
fn each_source_reports_its_own_press_on_a_held_lane() {
    let layout = LaneLayout::piano(1040.0, 600.0);
    let mut router = InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch);
    router.press_source(60, InputSource::Playback);

    let pressed = router.handle(key("KeyA", true), &layout);
    assert_eq!(
        source_changes(&pressed),
        vec![(60, true, InputSource::Keyboard)]
    );
    assert_eq!(changes(pressed), vec![]);

    let tapped = router.handle(pointer(2, &layout, 60, PointerPhase::Down), &layout);
    assert_eq!(
        source_changes(&tapped),
        vec![(60, true, InputSource::Pointer(2))]
    );
    assert_eq!(
        router
            .activation()
            .count_where(60, InputSource::is_device),
        2
    );

    let released = router.handle(key("KeyA", false), &layout);
    assert_eq!(
        source_changes(&released),
        vec![(60, false, InputSource::Keyboard)]
    );
    assert!(router.activation().is_active(60));
}
