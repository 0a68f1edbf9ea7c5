use crate::score_card::ScoreCardError;
use keyfall_domain_eval::PhaseError;
use keyfall_domain_timeline::ImportError;
use keyfall_ports::audio::AudioError;
use keyfall_ports::midi::MidiError;
use keyfall_ports::sampler::SamplerError;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),
    #[error("timeline load failed: {0}")]
    Import(#[from] ImportError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("score card export failed: {0}")]
    ScoreCard(#[from] ScoreCardError),
}
