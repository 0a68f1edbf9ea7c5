use crate::audio_graph::ScheduledEvent;
use keyfall_domain_timeline::Timeline;
use keyfall_ports::midi::MidiLikeEvent;
use keyfall_ports::types::{Bus, Lane, Seconds};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BridgeConfig {
    pub lookahead_secs: Seconds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CueKind {
    On { velocity: u8 },
    Off,
}

/// A transport-time trigger derived from one note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cue {
    pub at: Seconds,
    pub lane: Lane,
    pub kind: CueKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Highlight {
    pub lane: Lane,
    pub on: bool,
}

/// Notes currently sounding per lane. Same-pitch notes may overlap, so only
/// the first start and the last end change the lane.
#[derive(Debug, Default)]
struct Overlap {
    counts: HashMap<Lane, u32>,
}

impl Overlap {
    /// `true` when the lane was silent before.
    fn start(&mut self, lane: Lane) -> bool {
        let count = self.counts.entry(lane).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// `true` when no other note on the lane is left sounding.
    fn end(&mut self, lane: Lane) -> bool {
        match self.counts.get_mut(&lane) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            _ => {
                self.counts.remove(&lane);
                true
            }
        }
    }

    fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Turns a loaded timeline into sample-stamped sampler events and key
/// highlights, both keyed to transport time `onset + lead`.
///
/// Two cursors walk the same cue list: the audio cursor runs `lookahead` ahead
/// of the transport so events reach the audio thread early, the highlight
/// cursor runs exactly at the transport. A note-on over an already sounding
/// pitch re-strikes it; the release waits for the last overlapping note.
pub struct PlaybackBridge {
    config: BridgeConfig,
    cues: Vec<Cue>,
    audio_cursor: usize,
    highlight_cursor: usize,
    sounding: Overlap,
    lit: Overlap,
}

impl PlaybackBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            cues: Vec::new(),
            audio_cursor: 0,
            highlight_cursor: 0,
            sounding: Overlap::default(),
            lit: Overlap::default(),
        }
    }

    pub fn load(&mut self, timeline: &Timeline) {
        let lead = timeline.lead_secs();
        let mut cues = Vec::with_capacity(timeline.len() * 2);
        for note in timeline.notes() {
            let start = note.onset + lead;
            cues.push(Cue {
                at: start,
                lane: note.lane,
                kind: CueKind::On {
                    velocity: note.velocity,
                },
            });
            cues.push(Cue {
                at: start + note.duration,
                lane: note.lane,
                kind: CueKind::Off,
            });
        }
        // offs first at equal times so back-to-back notes re-strike
        cues.sort_by(|a, b| {
            a.at.total_cmp(&b.at)
                .then_with(|| cue_rank(a.kind).cmp(&cue_rank(b.kind)))
                .then_with(|| a.lane.cmp(&b.lane))
        });
        self.cues = cues;
        self.seek(0.0);
    }

    pub fn clear(&mut self) {
        self.cues.clear();
        self.seek(0.0);
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Repositions both cursors at `position`. Cues before it are skipped.
    pub fn seek(&mut self, position: Seconds) {
        let idx = self.cues.partition_point(|cue| cue.at < position);
        self.audio_cursor = idx;
        self.highlight_cursor = idx;
        self.sounding.clear();
        self.lit.clear();
    }

    /// Emits every not-yet-scheduled cue up to `position + lookahead`.
    /// `sample_for` maps a transport time to an absolute output sample.
    pub fn schedule(
        &mut self,
        position: Seconds,
        sample_for: impl Fn(Seconds) -> u64,
    ) -> Vec<ScheduledEvent> {
        let window_end = position + self.config.lookahead_secs;
        let mut emitted = Vec::new();
        while let Some(&cue) = self.cues.get(self.audio_cursor) {
            if cue.at > window_end {
                break;
            }
            self.audio_cursor += 1;
            let event = match cue.kind {
                CueKind::On { velocity } => {
                    self.sounding.start(cue.lane);
                    MidiLikeEvent::NoteOn {
                        note: cue.lane,
                        velocity,
                    }
                }
                CueKind::Off if self.sounding.end(cue.lane) => {
                    MidiLikeEvent::NoteOff { note: cue.lane }
                }
                CueKind::Off => continue,
            };
            emitted.push(ScheduledEvent {
                sample_time: sample_for(cue.at),
                bus: Bus::Playback,
                event,
            });
        }
        emitted
    }

    /// Highlight transitions that became due at `position`.
    pub fn highlights(&mut self, position: Seconds) -> Vec<Highlight> {
        let mut due = Vec::new();
        while let Some(&cue) = self.cues.get(self.highlight_cursor) {
            if cue.at > position {
                break;
            }
            self.highlight_cursor += 1;
            let on = matches!(cue.kind, CueKind::On { .. });
            let edge = if on {
                self.lit.start(cue.lane)
            } else {
                self.lit.end(cue.lane)
            };
            if edge {
                due.push(Highlight { lane: cue.lane, on });
            }
        }
        due
    }

    pub fn is_finished(&self) -> bool {
        self.highlight_cursor >= self.cues.len()
    }
}

fn cue_rank(kind: CueKind) -> u8 {
    match kind {
        CueKind::Off => 0,
        CueKind::On { .. } => 1,
    }
}
