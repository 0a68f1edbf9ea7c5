use crate::midi::MidiLikeEvent;
use crate::types::*;

#[derive(thiserror::Error, Debug)]
pub enum SamplerError {
    #[error("soundfont load failed: {0}")]
    SoundFontLoad(String),
    #[error("no soundfont loaded")]
    NotLoaded,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug)]
pub struct SoundFontInfo {
    pub name: String,
    pub preset_count: usize,
}

/// The sound-producing collaborator.
///
/// Thread model:
/// - `load_soundfont_from_path` / `set_instrument` are called from the session thread and may lock
/// - `handle_event` / `render` are called from the audio thread and must skip work rather than block
///
/// Changing the instrument replaces the bus voice; events arriving while a voice is
/// being rebuilt are dropped, never applied to a disposed voice.
pub trait SamplerPort: Send + Sync {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SamplerError>;
    fn set_sample_rate(&self, sample_rate_hz: u32);
    fn set_instrument(&self, bus: Bus, gm_program: u8) -> Result<(), SamplerError>;

    fn handle_event(&self, bus: Bus, event: MidiLikeEvent, at: SampleTime);
    fn render(&self, bus: Bus, frames: usize, out_l: &mut [f32], out_r: &mut [f32]);
}
