use crate::input_router::RawInput;
use keyfall_domain_eval::{GamePhase, JudgeStats};
use keyfall_ports::types::{
    AudioConfig, AudioOutputDevice, Bus, DeviceId, Lane, MidiInputDevice, Seconds, Volume01,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TimelineRequest {
    MidiFile(String),
    MidiBytes { name: String, bytes: Vec<u8> },
    /// File name inside the configured demo directory.
    Demo(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    ListMidiInputs,
    SelectMidiInput { device_id: DeviceId },
    ListAudioOutputs,
    SelectAudioOutput { device_id: DeviceId, config: Option<AudioConfig> },
    SetMasterVolume { volume: Volume01 },
    SetBusVolume { bus: Bus, volume: Volume01 },
    LoadSoundFont { path: String },
    /// General MIDI program for the live and playback buses.
    SetInstrument { gm_program: u8 },
    SetSustain { enabled: bool },
    SetTheme { name: String },
    LoadTimeline { request: TimelineRequest },
    Unload,
    Play,
    Pause,
    TogglePlay,
    Seek { position: Seconds },
    /// Seek to a fraction of the timeline duration.
    SeekFraction { fraction: f64 },
    Input { input: RawInput },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    MidiInputsUpdated { devices: Vec<MidiInputDevice> },
    AudioOutputsUpdated { devices: Vec<AudioOutputDevice> },
    /// Whether an external controller is currently reachable.
    ControllerPresence { connected: bool },
    TimelineLoaded {
        title: Option<String>,
        duration: Seconds,
        note_count: usize,
    },
    TimelineUnloaded,
    LoadFailed { message: String },
    TransportUpdated {
        position: Seconds,
        duration: Seconds,
        progress: f64,
        playing: bool,
    },
    LaneHighlight { lane: Lane, active: bool },
    ThemeChanged { name: String },
}

/// Sounds a game asks the host to play; the session routes them to the FX bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    LaneHit { lane: Lane },
    Damage,
    Success,
    Failure,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum GameEvent {
    PhaseChanged { phase: GamePhase },
    CountdownTick { remaining: u32 },
    Stats(JudgeStats),
    Hit { lane: Lane, points: i64 },
    Miss { lane: Lane },
    /// A lane lit during a memory demonstration, or by the player.
    PadLit { lane: Lane, lit: bool },
    /// Input timer progress in [0, 1], memory game only.
    TimerProgress { fraction: f64 },
    LivesChanged { lives: u8 },
    RoundStarted { length: usize },
    Sound(SoundCue),
    GameOver { score: i64, longest_combo: u32 },
}
