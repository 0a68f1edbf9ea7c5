use serde::{Deserialize, Serialize};
use std::fmt;

pub type Seconds = f64; // transport time, seconds from timeline start
pub type SampleTime = u64; // audio sample index, monotonic while stream running

/// A column of the play field: a MIDI pitch in piano mode, a track index in rhythm mode.
pub type Lane = u8;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bus {
    /// Notes played live from any input source.
    Live,
    /// Notes triggered by timeline playback.
    Playback,
    /// Game feedback cues (hit, damage, success).
    Fx,
}

impl Bus {
    pub const ALL: [Bus; 3] = [Bus::Live, Bus::Playback, Bus::Fx];

    pub fn index(self) -> usize {
        match self {
            Bus::Live => 0,
            Bus::Playback => 1,
            Bus::Fx => 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiInputDevice {
    pub id: DeviceId,
    pub name: String,
    pub is_available: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioOutputDevice {
    pub id: DeviceId,
    pub name: String,
    pub default_config: AudioConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub buffer_size_frames: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            channels: 2,
            buffer_size_frames: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Volume01(pub f32);

impl Volume01 {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True for the pitch classes drawn as black keys.
pub fn is_accidental(pitch: Lane) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}
