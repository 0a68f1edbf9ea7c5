use keyfall_core::{BridgeConfig, Highlight, PlaybackBridge};
use keyfall_domain_timeline::{Note, Timeline, TimelineSource};
use keyfall_ports::midi::MidiLikeEvent;
use keyfall_ports::types::Bus;
use pretty_assertions::assert_eq;

fn bridge(lookahead_secs: f64) -> PlaybackBridge {
    let timeline = Timeline::from_notes(
        TimelineSource::Midi,
        2.0,
        vec![
            Note::new(60, 0.0, 0.5).with_velocity(90),
            Note::new(60, 0.5, 0.5),
            Note::new(64, 1.0, 1.0),
        ],
    );
    let mut bridge = PlaybackBridge::new(BridgeConfig { lookahead_secs });
    bridge.load(&timeline);
    bridge
}

fn samples(at: f64) -> u64 {
    (at * 1000.0).round() as u64
}

#[test]
fn cues_land_at_onset_plus_lead_with_offs_first() {
    let bridge = bridge(0.03);
    let times: Vec<f64> = bridge.cues().iter().map(|cue| cue.at).collect();
    assert_eq!(times, vec![2.0, 2.5, 2.5, 3.0, 3.0, 4.0]);
    assert!(matches!(bridge.cues()[1].kind, keyfall_core::CueKind::Off));
    assert!(matches!(bridge.cues()[2].kind, keyfall_core::CueKind::On { .. }));
}

#[test]
fn schedule_emits_each_cue_once_within_lookahead() {
    let mut bridge = bridge(0.1);
    assert!(bridge.schedule(1.5, samples).is_empty());

    let first = bridge.schedule(1.95, samples);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].bus, Bus::Playback);
    assert_eq!(first[0].sample_time, 2000);
    assert_eq!(
        first[0].event,
        MidiLikeEvent::NoteOn {
            note: 60,
            velocity: 90
        }
    );

    assert!(bridge.schedule(1.96, samples).is_empty());
    let next = bridge.schedule(2.45, samples);
    assert_eq!(
        next.iter().map(|event| event.event).collect::<Vec<_>>(),
        vec![
            MidiLikeEvent::NoteOff { note: 60 },
            MidiLikeEvent::NoteOn {
                note: 60,
                velocity: 100
            },
        ]
    );
}

#[test]
fn highlights_follow_the_transport_exactly() {
    let mut bridge = bridge(0.5);
    assert!(bridge.highlights(1.99).is_empty());
    assert_eq!(bridge.highlights(2.0), vec![Highlight { lane: 60, on: true }]);
    assert_eq!(
        bridge.highlights(3.0),
        vec![
            Highlight { lane: 60, on: false },
            Highlight { lane: 60, on: true },
            Highlight { lane: 60, on: false },
            Highlight { lane: 64, on: true },
        ]
    );
    assert!(!bridge.is_finished());
    bridge.highlights(10.0);
    assert!(bridge.is_finished());
}

#[test]
fn seek_skips_cues_before_the_target() {
    let mut bridge = bridge(0.0);
    bridge.seek(2.6);
    let scheduled = bridge.schedule(3.0, samples);
    assert_eq!(scheduled.len(), 2);
    assert!(scheduled.iter().all(|event| event.sample_time == 3000));

    bridge.seek(0.0);
    assert_eq!(bridge.schedule(2.0, samples).len(), 1);
}

#[test]
fn overlapping_notes_on_one_pitch_release_with_the_last() {
    let timeline = Timeline::from_notes(
        TimelineSource::Midi,
        2.0,
        vec![Note::new(60, 0.0, 1.0), Note::new(60, 0.5, 1.0)],
    );
    let mut bridge = PlaybackBridge::new(BridgeConfig { lookahead_secs: 0.0 });
    bridge.load(&timeline);

    assert_eq!(bridge.highlights(2.6), vec![Highlight { lane: 60, on: true }]);
    assert!(bridge.highlights(3.2).is_empty());
    assert_eq!(bridge.highlights(3.5), vec![Highlight { lane: 60, on: false }]);

    let scheduled: Vec<(u64, MidiLikeEvent)> = bridge
        .schedule(3.5, samples)
        .into_iter()
        .map(|event| (event.sample_time, event.event))
        .collect();
    assert_eq!(
        scheduled,
        vec![
            (2000, MidiLikeEvent::NoteOn { note: 60, velocity: 100 }),
            (2500, MidiLikeEvent::NoteOn { note: 60, velocity: 100 }),
            (3500, MidiLikeEvent::NoteOff { note: 60 }),
        ]
    );
}
