use keyfall_ports::types::{Lane, Seconds};
use serde::{Deserialize, Serialize};

/// Shortest note the timeline accepts; zero-length notes are stretched to this.
pub const MIN_NOTE_SECS: Seconds = 0.01;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimelineSource {
    Midi,
    Demo(String),
    Generated,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub lane: Lane,
    /// Seconds from timeline start.
    pub onset: Seconds,
    pub duration: Seconds,
    pub velocity: u8,
    pub track: u16,
    /// Set once judged (rhythm) or finished playing; the only mutable field.
    pub consumed: bool,
}

impl Note {
    pub fn new(lane: Lane, onset: Seconds, duration: Seconds) -> Self {
        Self {
            lane,
            onset: if onset.is_finite() { onset.max(0.0) } else { 0.0 },
            duration: if duration.is_finite() {
                duration.max(MIN_NOTE_SECS)
            } else {
                MIN_NOTE_SECS
            },
            velocity: 100,
            track: 0,
            consumed: false,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_track(mut self, track: u16) -> Self {
        self.track = track;
        self
    }

    pub fn end(&self) -> Seconds {
        self.onset + self.duration
    }
}

/// Ordered notes plus the lead time that separates a note's onset from the
/// moment its bar reaches the hit line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub title: Option<String>,
    pub source: TimelineSource,
    lead_secs: Seconds,
    notes: Vec<Note>,
}

impl Timeline {
    pub fn new(source: TimelineSource, lead_secs: Seconds) -> Self {
        Self {
            title: None,
            source,
            lead_secs: lead_secs.max(0.0),
            notes: Vec::new(),
        }
    }

    pub fn from_notes(source: TimelineSource, lead_secs: Seconds, mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.onset.total_cmp(&b.onset).then(a.lane.cmp(&b.lane)));
        Self {
            title: None,
            source,
            lead_secs: lead_secs.max(0.0),
            notes,
        }
    }

    pub fn lead_secs(&self) -> Seconds {
        self.lead_secs
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Appends a generated note. Generated notes arrive in onset order.
    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Transport time at which the note's leading edge reaches the hit line.
    pub fn impact_time(&self, note: &Note) -> Seconds {
        note.onset + self.lead_secs
    }

    /// Length of the musical content, without the lead.
    pub fn content_secs(&self) -> Seconds {
        self.notes.iter().map(Note::end).fold(0.0, Seconds::max)
    }

    /// Total transport length: content plus lead. Never negative or NaN.
    pub fn duration(&self) -> Seconds {
        self.content_secs() + self.lead_secs
    }

    /// Marks a note consumed. Returns `false` if it already was.
    pub fn consume(&mut self, index: usize) -> bool {
        match self.notes.get_mut(index) {
            Some(note) if !note.consumed => {
                note.consumed = true;
                true
            }
            _ => false,
        }
    }

    /// Drops consumed notes whose bar has fully left the screen before `now`.
    pub fn prune_consumed(&mut self, now: Seconds) -> usize {
        let lead = self.lead_secs;
        let before = self.notes.len();
        self.notes
            .retain(|note| !(note.consumed && note.onset + lead + note.duration < now));
        before - self.notes.len()
    }
}
