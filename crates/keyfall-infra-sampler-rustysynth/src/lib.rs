use keyfall_ports::midi::MidiLikeEvent;
use keyfall_ports::sampler::{SamplerError, SamplerPort, SoundFontInfo};
use keyfall_ports::types::{Bus, SampleTime};
use parking_lot::Mutex;
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// GM program for game feedback cues.
pub const FX_PROGRAM: u8 = 13;
const MASTER_GAIN: f32 = 0.25;

/// SoundFont sampler with one synthesizer per bus, so swapping the piano
/// voice never cuts the feedback cues.
///
/// Until a SoundFont is loaded every bus renders silence.
pub struct RustySampler {
    sample_rate_hz: AtomicU32,
    sound_font: Mutex<Option<Arc<SoundFont>>>,
    voices: [Voice; 3],
}

struct Voice {
    program: AtomicU8,
    synth: Mutex<Option<Synthesizer>>,
}

impl Voice {
    fn new(program: u8) -> Self {
        Self {
            program: AtomicU8::new(program),
            synth: Mutex::new(None),
        }
    }
}

impl Default for RustySampler {
    fn default() -> Self {
        Self::new(48_000)
    }
}

impl RustySampler {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: AtomicU32::new(sample_rate_hz),
            sound_font: Mutex::new(None),
            voices: [Voice::new(0), Voice::new(0), Voice::new(FX_PROGRAM)],
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.sound_font.lock().is_some()
    }

    pub fn program(&self, bus: Bus) -> u8 {
        self.voices[bus.index()].program.load(Ordering::Relaxed)
    }

    fn build_voice(&self, sound_font: &Arc<SoundFont>, program: u8) -> Result<Synthesizer, SamplerError> {
        let sample_rate_hz = self.sample_rate_hz.load(Ordering::Relaxed) as i32;
        let mut settings = SynthesizerSettings::new(sample_rate_hz);
        settings.enable_reverb_and_chorus = false;
        let mut synth = Synthesizer::new(sound_font, &settings)
            .map_err(|e| SamplerError::Backend(e.to_string()))?;
        synth.set_master_volume(MASTER_GAIN);
        if program != 0 {
            synth.process_midi_message(0, 0xC0, program as i32, 0);
        }
        Ok(synth)
    }

    fn rebuild_all(&self, sound_font: &Arc<SoundFont>) -> Result<(), SamplerError> {
        for voice in &self.voices {
            let synth = self.build_voice(sound_font, voice.program.load(Ordering::Relaxed))?;
            *voice.synth.lock() = Some(synth);
        }
        Ok(())
    }

    /// Runs `f` on the bus synthesizer unless it is missing or being swapped.
    fn with_voice<T>(&self, bus: Bus, f: impl FnOnce(&mut Synthesizer) -> T) -> Option<T> {
        let mut guard = self.voices[bus.index()].synth.try_lock()?;
        guard.as_mut().map(f)
    }
}

impl SamplerPort for RustySampler {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SamplerError> {
        let mut file = File::open(path).map_err(|e| SamplerError::SoundFontLoad(e.to_string()))?;
        let sound_font = Arc::new(
            SoundFont::new(&mut file).map_err(|e| SamplerError::SoundFontLoad(e.to_string()))?,
        );

        let bank = sound_font.get_info().get_bank_name().trim().to_string();
        let name = if bank.is_empty() {
            Path::new(path)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("SoundFont")
                .to_string()
        } else {
            bank
        };
        let preset_count = sound_font.get_presets().len();

        self.rebuild_all(&sound_font)?;
        *self.sound_font.lock() = Some(sound_font);
        log::debug!("soundfont {name} ready on all buses");
        Ok(SoundFontInfo { name, preset_count })
    }

    fn set_sample_rate(&self, sample_rate_hz: u32) {
        self.sample_rate_hz.store(sample_rate_hz, Ordering::Relaxed);
        let sound_font = self.sound_font.lock().clone();
        if let Some(sound_font) = sound_font {
            if let Err(err) = self.rebuild_all(&sound_font) {
                log::warn!("could not rebuild voices at {sample_rate_hz} Hz: {err}");
            }
        }
    }

    fn set_instrument(&self, bus: Bus, gm_program: u8) -> Result<(), SamplerError> {
        let voice = &self.voices[bus.index()];
        voice.program.store(gm_program, Ordering::Relaxed);
        let sound_font = self.sound_font.lock().clone();
        let Some(sound_font) = sound_font else {
            return Ok(());
        };
        // built off to the side; the audio thread sees the old voice or the new one
        let synth = self.build_voice(&sound_font, gm_program)?;
        *voice.synth.lock() = Some(synth);
        Ok(())
    }

    fn handle_event(&self, bus: Bus, event: MidiLikeEvent, _at: SampleTime) {
        self.with_voice(bus, |synth| match event {
            MidiLikeEvent::NoteOn { note, velocity } => {
                synth.note_on(0, note as i32, velocity as i32);
            }
            MidiLikeEvent::NoteOff { note } => {
                synth.note_off(0, note as i32);
            }
            MidiLikeEvent::Cc64 { value } => {
                synth.process_midi_message(0, 0xB0, 0x40, value as i32);
            }
        });
    }

    fn render(&self, bus: Bus, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = frames.min(out_l.len()).min(out_r.len());
        let rendered = self.with_voice(bus, |synth| {
            synth.render(&mut out_l[..frames], &mut out_r[..frames]);
        });
        if rendered.is_none() {
            out_l[..frames].fill(0.0);
            out_r[..frames].fill(0.0);
        }
    }
}
