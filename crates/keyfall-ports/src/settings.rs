use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_lead_secs() -> Seconds {
    8.0
}

fn default_start_delay_secs() -> Seconds {
    0.1
}

fn default_lookahead_ms() -> u64 {
    30
}

fn default_master_volume() -> Volume01 {
    Volume01::new(0.8)
}

fn default_bus_volume() -> Volume01 {
    Volume01::new(0.8)
}

fn default_fx_volume() -> Volume01 {
    Volume01::new(0.6)
}

fn default_theme() -> String {
    "Classic".to_string()
}

fn default_demo_dir() -> String {
    "demos".to_string()
}

/// Session settings. Every field has a default so partial JSON files load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Seconds a bar takes to fall from the top of the track to the hit line.
    #[serde(default = "default_lead_secs")]
    pub lead_secs: Seconds,
    #[serde(default = "default_start_delay_secs")]
    pub start_delay_secs: Seconds,
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: u64,
    #[serde(default = "default_master_volume")]
    pub master_volume: Volume01,
    #[serde(default = "default_bus_volume")]
    pub live_volume: Volume01,
    #[serde(default = "default_bus_volume")]
    pub playback_volume: Volume01,
    #[serde(default = "default_fx_volume")]
    pub fx_volume: Volume01,
    pub sustain: bool,
    /// General MIDI program used for the live and playback buses.
    pub instrument: u8,
    #[serde(default = "default_theme")]
    pub theme: String,
    pub soundfont_path: Option<String>,
    /// TrueType or OpenType font for score card text. Common system fonts are
    /// tried when unset.
    pub card_font_path: Option<String>,
    #[serde(default = "default_demo_dir")]
    pub demo_dir: String,
    pub input_offset_ms: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lead_secs: default_lead_secs(),
            start_delay_secs: default_start_delay_secs(),
            lookahead_ms: default_lookahead_ms(),
            master_volume: default_master_volume(),
            live_volume: default_bus_volume(),
            playback_volume: default_bus_volume(),
            fx_volume: default_fx_volume(),
            sustain: false,
            instrument: 0,
            theme: default_theme(),
            soundfont_path: None,
            card_font_path: None,
            demo_dir: default_demo_dir(),
            input_offset_ms: 0,
        }
    }
}

impl EngineSettings {
    /// Parses settings JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = serde_json::from_str(text)?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Input latency compensation in seconds.
    pub fn input_offset_secs(&self) -> Seconds {
        self.input_offset_ms as f64 / 1000.0
    }

    fn sanitize(&mut self) {
        if !self.lead_secs.is_finite() || self.lead_secs <= 0.0 {
            self.lead_secs = default_lead_secs();
        }
        if !self.start_delay_secs.is_finite() || self.start_delay_secs < 0.0 {
            self.start_delay_secs = default_start_delay_secs();
        }
        self.instrument = self.instrument.min(127);
    }

    pub fn bus_volume(&self, bus: Bus) -> Volume01 {
        match bus {
            Bus::Live => self.live_volume,
            Bus::Playback => self.playback_volume,
            Bus::Fx => self.fx_volume,
        }
    }
}
