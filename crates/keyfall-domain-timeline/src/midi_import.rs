use crate::model::{Note, Timeline, TimelineSource};
use crate::tempo::{TempoMap, TempoPoint, Tick};
use keyfall_ports::types::Seconds;
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

pub fn import_midi_path(path: &Path, lead_secs: Seconds) -> Result<Timeline, ImportError> {
    let data = std::fs::read(path).map_err(|e| ImportError::Io(e.to_string()))?;
    import_midi_bytes(&data, lead_secs)
}

/// Decodes a standard MIDI file into one lane-indexed timeline spanning all tracks.
/// Nothing is returned on failure, so a caller's previous timeline stays intact.
pub fn import_midi_bytes(data: &[u8], lead_secs: Seconds) -> Result<Timeline, ImportError> {
    let smf = Smf::parse(data).map_err(|e| ImportError::Parse(e.to_string()))?;
    let (ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };

    let mut tempo_points: BTreeMap<Tick, u32> = BTreeMap::new();
    let mut title: Option<String> = None;
    let mut raw: Vec<RawNoteEvent> = Vec::new();
    let mut last_tick: Tick = 0;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick: Tick = 0;
        for event in track {
            tick += event.delta.as_int() as Tick;
            match &event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    let (key, on) = match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            (key.as_int(), Some(vel.as_int()))
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            (key.as_int(), None)
                        }
                        _ => continue,
                    };
                    last_tick = last_tick.max(tick);
                    raw.push(RawNoteEvent {
                        track: track_index as u16,
                        channel,
                        key,
                        tick,
                        velocity: on,
                    });
                }
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    tempo_points.insert(tick, us_per_quarter.as_int());
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) if title.is_none() => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if !name.is_empty() {
                        title = Some(name);
                    }
                }
                _ => {}
            }
        }
    }

    let tempo_map = build_tempo_map(ppq, tempo_points, tempo_override);
    let notes = pair_notes(&tempo_map, raw, last_tick);
    log::debug!(
        "midi import: {} tracks, {} notes, ppq {}",
        smf.tracks.len(),
        notes.len(),
        ppq
    );

    let mut timeline = Timeline::from_notes(TimelineSource::Midi, lead_secs, notes);
    timeline.title = title;
    Ok(timeline)
}

#[derive(Clone, Copy, Debug)]
struct RawNoteEvent {
    track: u16,
    channel: u8,
    key: u8,
    tick: Tick,
    /// `Some` for note-on, `None` for note-off.
    velocity: Option<u8>,
}

/// Pairs note-on/off per (track, channel, key). A repeated note-on closes the
/// sounding note first; notes never released end one quarter after the last event.
fn pair_notes(tempo_map: &TempoMap, mut raw: Vec<RawNoteEvent>, last_tick: Tick) -> Vec<Note> {
    // offs sort ahead of ons at the same tick so back-to-back notes don't swallow each other
    raw.sort_by(|a, b| {
        a.track
            .cmp(&b.track)
            .then(a.tick.cmp(&b.tick))
            .then(a.velocity.is_some().cmp(&b.velocity.is_some()))
    });

    let mut open: HashMap<(u16, u8, u8), (Tick, u8)> = HashMap::new();
    let mut notes = Vec::with_capacity(raw.len() / 2);
    let close = |notes: &mut Vec<Note>, key: (u16, u8, u8), start: Tick, velocity: u8, end: Tick| {
        let onset = tempo_map.tick_to_secs(start);
        let duration = tempo_map.tick_to_secs(end) - onset;
        notes.push(
            Note::new(key.2, onset, duration)
                .with_velocity(velocity)
                .with_track(key.0),
        );
    };

    for event in raw {
        let key = (event.track, event.channel, event.key);
        match event.velocity {
            Some(velocity) => {
                if let Some((start, prev_velocity)) = open.remove(&key) {
                    close(&mut notes, key, start, prev_velocity, event.tick);
                }
                open.insert(key, (event.tick, velocity));
            }
            None => {
                if let Some((start, velocity)) = open.remove(&key) {
                    close(&mut notes, key, start, velocity, event.tick);
                }
            }
        }
    }

    let end_tick = last_tick.saturating_add(tempo_map.ppq() as Tick);
    let mut dangling: Vec<_> = open.into_iter().collect();
    dangling.sort_by_key(|(key, (start, _))| (*start, *key));
    for (key, (start, velocity)) in dangling {
        close(&mut notes, key, start, velocity, end_tick);
    }

    notes
}

fn build_tempo_map(
    ppq: u16,
    tempo_points: BTreeMap<Tick, u32>,
    override_us_per_quarter: Option<u32>,
) -> TempoMap {
    let points = match override_us_per_quarter {
        Some(us_per_quarter) => vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }],
        None => tempo_points
            .into_iter()
            .map(|(tick, us_per_quarter)| TempoPoint {
                tick,
                us_per_quarter,
            })
            .collect(),
    };
    TempoMap::new(ppq, points)
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}
