use crate::layout::LaneLayout;
use keyfall_ports::midi::MidiLikeEvent;
use keyfall_ports::types::Lane;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_VELOCITY: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSource {
    Keyboard,
    Pointer(u64),
    Midi,
    /// Highlights driven by timeline playback.
    Playback,
}

impl InputSource {
    /// Keyboard, pointer or controller, as opposed to playback.
    pub fn is_device(self) -> bool {
        !matches!(self, InputSource::Playback)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RawInput {
    /// `code` is the physical key name, e.g. `KeyA` or `Semicolon`.
    Key { code: String, down: bool, repeat: bool },
    Pointer { id: u64, x: f32, y: f32, phase: PointerPhase },
    Midi(MidiLikeEvent),
    /// Window lost focus or became hidden.
    FocusLost,
}

/// A lane state change, either for one source or for the lane as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneChange {
    pub lane: Lane,
    pub active: bool,
    pub velocity: u8,
    pub source: InputSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Routed {
    /// One source started or stopped holding a lane, whatever other sources do.
    Source(LaneChange),
    /// The lane's combined state flipped.
    Lane(LaneChange),
    Pedal { value: u8 },
}

/// Which sources hold which lanes. A lane is active while any source holds it.
#[derive(Clone, Debug, Default)]
pub struct LaneActivation {
    holders: HashMap<Lane, HashSet<InputSource>>,
}

impl LaneActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the lane was idle before.
    pub fn press(&mut self, lane: Lane, source: InputSource) -> bool {
        let holders = self.holders.entry(lane).or_default();
        let was_idle = holders.is_empty();
        holders.insert(source);
        was_idle
    }

    /// Number of sources matching `pred` that hold `lane`.
    pub fn count_where(&self, lane: Lane, pred: impl Fn(InputSource) -> bool) -> usize {
        self.holders
            .get(&lane)
            .map(|holders| holders.iter().filter(|source| pred(**source)).count())
            .unwrap_or(0)
    }

    /// Every (lane, source) hold, ordered by lane.
    pub fn holds(&self) -> Vec<(Lane, InputSource)> {
        let mut holds: Vec<(Lane, InputSource)> = self
            .holders
            .iter()
            .flat_map(|(lane, holders)| holders.iter().map(move |source| (*lane, *source)))
            .collect();
        holds.sort_by_key(|(lane, _)| *lane);
        holds
    }

    /// Returns `true` if this release left the lane idle.
    pub fn release(&mut self, lane: Lane, source: InputSource) -> bool {
        let Some(holders) = self.holders.get_mut(&lane) else {
            return false;
        };
        if !holders.remove(&source) {
            return false;
        }
        if holders.is_empty() {
            self.holders.remove(&lane);
            return true;
        }
        false
    }

    pub fn is_active(&self, lane: Lane) -> bool {
        self.holders.contains_key(&lane)
    }

    pub fn is_held_by(&self, lane: Lane, source: InputSource) -> bool {
        self.holders
            .get(&lane)
            .map(|holders| holders.contains(&source))
            .unwrap_or(false)
    }

    pub fn active_lanes(&self) -> HashSet<Lane> {
        self.holders.keys().copied().collect()
    }

    /// Drops every hold matching `pred`; returns lanes that went idle, sorted.
    pub fn release_where(&mut self, pred: impl Fn(InputSource) -> bool) -> Vec<Lane> {
        let mut released = Vec::new();
        self.holders.retain(|lane, holders| {
            holders.retain(|source| !pred(*source));
            if holders.is_empty() {
                released.push(*lane);
                false
            } else {
                true
            }
        });
        released.sort_unstable();
        released
    }

    pub fn release_all(&mut self) -> Vec<Lane> {
        self.release_where(|_| true)
    }
}

/// Physical key to lane table.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyBindings {
    map: HashMap<String, Lane>,
}

impl KeyBindings {
    pub fn new(pairs: &[(&str, Lane)]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(code, lane)| (code.to_string(), *lane))
                .collect(),
        }
    }

    /// Seventeen keys from C4 to E5: home row naturals, upper row accidentals.
    pub fn piano() -> Self {
        Self::new(&[
            ("KeyA", 60),
            ("KeyW", 61),
            ("KeyS", 62),
            ("KeyE", 63),
            ("KeyD", 64),
            ("KeyF", 65),
            ("KeyT", 66),
            ("KeyG", 67),
            ("KeyY", 68),
            ("KeyH", 69),
            ("KeyU", 70),
            ("KeyJ", 71),
            ("KeyK", 72),
            ("KeyO", 73),
            ("KeyL", 74),
            ("KeyP", 75),
            ("Semicolon", 76),
        ])
    }

    /// D F J K for four lanes; wider fields spread across the home row.
    pub fn rhythm(lanes: Lane) -> Self {
        let codes: &[&str] = match lanes {
            0..=4 => &["KeyD", "KeyF", "KeyJ", "KeyK"],
            5 => &["KeyD", "KeyF", "Space", "KeyJ", "KeyK"],
            _ => &["KeyS", "KeyD", "KeyF", "KeyJ", "KeyK", "KeyL"],
        };
        let pairs: Vec<(&str, Lane)> = codes
            .iter()
            .take(lanes.max(1) as usize)
            .enumerate()
            .map(|(lane, code)| (*code, lane as Lane))
            .collect();
        Self::new(&pairs)
    }

    /// Number row, `Digit1` for lane 0 through `Digit0` for lane 9.
    pub fn numbered(lanes: Lane) -> Self {
        const CODES: [&str; 10] = [
            "Digit1", "Digit2", "Digit3", "Digit4", "Digit5", "Digit6", "Digit7", "Digit8",
            "Digit9", "Digit0",
        ];
        let pairs: Vec<(&str, Lane)> = CODES
            .iter()
            .take(lanes as usize)
            .enumerate()
            .map(|(lane, code)| (*code, lane as Lane))
            .collect();
        Self::new(&pairs)
    }

    pub fn lane(&self, code: &str) -> Option<Lane> {
        self.map.get(code).copied()
    }

    /// First key bound to `lane`, in key-name order.
    pub fn code_for(&self, lane: Lane) -> Option<&str> {
        self.map
            .iter()
            .filter(|(_, bound)| **bound == lane)
            .map(|(code, _)| code.as_str())
            .min()
    }
}

/// How external controller notes map onto lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiLaneMap {
    /// Lane is the MIDI pitch.
    Pitch,
    /// Pitch wrapped into `[0, lanes)`.
    Wrap(Lane),
}

impl MidiLaneMap {
    fn lane(self, note: u8) -> Option<Lane> {
        match self {
            MidiLaneMap::Pitch => Some(note),
            MidiLaneMap::Wrap(0) => None,
            MidiLaneMap::Wrap(lanes) => Some(note % lanes),
        }
    }
}

/// Normalizes keyboard, pointer and controller input into lane presses.
pub struct InputRouter {
    bindings: KeyBindings,
    midi_map: MidiLaneMap,
    keys_down: HashSet<String>,
    pointers: HashMap<u64, Lane>,
    activation: LaneActivation,
}

impl InputRouter {
    pub fn new(bindings: KeyBindings, midi_map: MidiLaneMap) -> Self {
        Self {
            bindings,
            midi_map,
            keys_down: HashSet::new(),
            pointers: HashMap::new(),
            activation: LaneActivation::new(),
        }
    }

    pub fn activation(&self) -> &LaneActivation {
        &self.activation
    }

    pub fn active_lanes(&self) -> HashSet<Lane> {
        self.activation.active_lanes()
    }

    pub fn handle(&mut self, input: RawInput, layout: &LaneLayout) -> Vec<Routed> {
        let mut out = Vec::new();
        match input {
            RawInput::Key { code, down, repeat } => {
                let Some(lane) = self.bindings.lane(&code) else {
                    return out;
                };
                if down {
                    if repeat || !self.keys_down.insert(code) {
                        return out;
                    }
                    self.press(lane, InputSource::Keyboard, DEFAULT_VELOCITY, &mut out);
                } else {
                    self.keys_down.remove(&code);
                    self.release(lane, InputSource::Keyboard, &mut out);
                }
            }
            RawInput::Pointer { id, x, y, phase } => {
                let source = InputSource::Pointer(id);
                match phase {
                    PointerPhase::Down => {
                        if let Some(old) = self.pointers.remove(&id) {
                            self.release(old, source, &mut out);
                        }
                        if let Some(lane) = layout.hit_test(x, y) {
                            self.pointers.insert(id, lane);
                            self.press(lane, source, DEFAULT_VELOCITY, &mut out);
                        }
                    }
                    PointerPhase::Move => {
                        let Some(&old) = self.pointers.get(&id) else {
                            return out;
                        };
                        let new = layout.hit_test(x, y);
                        if new == Some(old) {
                            return out;
                        }
                        self.pointers.remove(&id);
                        self.release(old, source, &mut out);
                        if let Some(lane) = new {
                            self.pointers.insert(id, lane);
                            self.press(lane, source, DEFAULT_VELOCITY, &mut out);
                        }
                    }
                    PointerPhase::Up | PointerPhase::Cancel => {
                        if let Some(old) = self.pointers.remove(&id) {
                            self.release(old, source, &mut out);
                        }
                    }
                }
            }
            RawInput::Midi(event) => match event {
                MidiLikeEvent::NoteOn { note, velocity } => {
                    if let Some(lane) = self.midi_map.lane(note) {
                        self.press(lane, InputSource::Midi, velocity, &mut out);
                    }
                }
                MidiLikeEvent::NoteOff { note } => {
                    if let Some(lane) = self.midi_map.lane(note) {
                        self.release(lane, InputSource::Midi, &mut out);
                    }
                }
                MidiLikeEvent::Cc64 { value } => out.push(Routed::Pedal { value }),
            },
            RawInput::FocusLost => {
                self.keys_down.clear();
                self.pointers.clear();
                for (lane, source) in self.activation.holds() {
                    out.push(Routed::Source(LaneChange {
                        lane,
                        active: false,
                        velocity: 0,
                        source,
                    }));
                }
                for lane in self.activation.release_all() {
                    out.push(Routed::Lane(LaneChange {
                        lane,
                        active: false,
                        velocity: 0,
                        source: InputSource::Keyboard,
                    }));
                }
                let lanes = out
                    .iter()
                    .filter(|routed| matches!(routed, Routed::Lane(_)))
                    .count();
                if lanes > 0 {
                    log::debug!("focus lost: released {lanes} lanes");
                }
            }
        }
        out
    }

    /// Presses on behalf of a non-device source such as playback highlights.
    pub fn press_source(&mut self, lane: Lane, source: InputSource) -> Option<LaneChange> {
        let mut out = Vec::new();
        self.press(lane, source, DEFAULT_VELOCITY, &mut out);
        first_change(out)
    }

    pub fn release_source(&mut self, lane: Lane, source: InputSource) -> Option<LaneChange> {
        let mut out = Vec::new();
        self.release(lane, source, &mut out);
        first_change(out)
    }

    /// Releases every lane held by `source`.
    pub fn release_all_from(&mut self, source: InputSource) -> Vec<LaneChange> {
        self.activation
            .release_where(|held| held == source)
            .into_iter()
            .map(|lane| LaneChange {
                lane,
                active: false,
                velocity: 0,
                source,
            })
            .collect()
    }

    fn press(&mut self, lane: Lane, source: InputSource, velocity: u8, out: &mut Vec<Routed>) {
        if self.activation.is_held_by(lane, source) {
            return;
        }
        let change = LaneChange {
            lane,
            active: true,
            velocity,
            source,
        };
        out.push(Routed::Source(change));
        if self.activation.press(lane, source) {
            out.push(Routed::Lane(change));
        }
    }

    fn release(&mut self, lane: Lane, source: InputSource, out: &mut Vec<Routed>) {
        if !self.activation.is_held_by(lane, source) {
            return;
        }
        let change = LaneChange {
            lane,
            active: false,
            velocity: 0,
            source,
        };
        out.push(Routed::Source(change));
        if self.activation.release(lane, source) {
            out.push(Routed::Lane(change));
        }
    }
}

fn first_change(out: Vec<Routed>) -> Option<LaneChange> {
    out.into_iter().find_map(|routed| match routed {
        Routed::Lane(change) => Some(change),
        Routed::Source(_) | Routed::Pedal { .. } => None,
    })
}
