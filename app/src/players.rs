//! Scripted players for the game subcommands. They drive a session the same
//! way a window would, through raw key and controller input.

use crate::{pick_output, FRAME};
use anyhow::{Context, Result};
use keyfall_core::{
    AudioEngine, GameEvent, HostClock, KeyBindings, MemoryPhase, MemorySession, RawInput,
    RhythmOptions, RhythmSession, ScoreCard, SoundCue, WallClock,
};
use keyfall_domain_eval::{Difficulty, GamePhase, MemoryDifficulty};
use keyfall_infra_audio_cpal::CpalOutputPort;
use keyfall_infra_sampler_rustysynth::RustySampler;
use keyfall_ports::midi::MidiLikeEvent;
use keyfall_ports::settings::EngineSettings;
use keyfall_ports::types::{Lane, Seconds};
use std::collections::HashSet;
use std::sync::Arc;

/// Rhythm games with a bot that never misses run until this much game time.
const RHYTHM_TIME_LIMIT_SECS: Seconds = 300.0;
const MEMORY_TIME_LIMIT_SECS: Seconds = 600.0;

/// Advances host time either by a fixed frame or by the wall clock.
struct Pacer {
    wall: Option<WallClock>,
    now: Seconds,
}

impl Pacer {
    fn new(realtime: bool) -> Self {
        Self {
            wall: realtime.then(WallClock::new),
            now: 0.0,
        }
    }

    fn now(&self) -> Seconds {
        self.now
    }

    fn step(&mut self) -> Seconds {
        match &self.wall {
            Some(wall) => {
                std::thread::sleep(FRAME);
                self.now = wall.now_secs();
            }
            None => self.now += FRAME.as_secs_f64(),
        }
        self.now
    }
}

/// Plays game cues through the sampler when running in real time.
struct CueOutput {
    engine: Option<AudioEngine>,
}

impl CueOutput {
    fn open(settings: &EngineSettings, realtime: bool) -> Self {
        if !realtime {
            return Self { engine: None };
        }
        match Self::open_engine(settings) {
            Ok(engine) => Self {
                engine: Some(engine),
            },
            Err(err) => {
                log::warn!("game sounds disabled: {err:#}");
                Self { engine: None }
            }
        }
    }

    fn open_engine(settings: &EngineSettings) -> Result<AudioEngine> {
        let port = CpalOutputPort::new();
        let device = pick_output(&port, None)?;
        let mut engine = AudioEngine::new(
            Box::new(port),
            Arc::new(RustySampler::default()),
            settings,
        );
        engine
            .open_output(&device.id, Some(device.default_config))
            .context("opening audio output")?;
        if let Some(path) = &settings.soundfont_path {
            engine.load_soundfont(path).context("loading soundfont")?;
        }
        Ok(engine)
    }

    fn play(&mut self, cue: SoundCue) {
        if let Some(engine) = &mut self.engine {
            engine.play_cue(cue);
        }
    }
}

fn log_events(events: &[GameEvent], cues: &mut CueOutput) {
    for event in events {
        match event {
            GameEvent::Sound(cue) => cues.play(*cue),
            GameEvent::TimerProgress { .. } => {}
            other => log::debug!("{other:?}"),
        }
    }
}

pub fn run_rhythm(
    settings: &EngineSettings,
    difficulty: Difficulty,
    seed: Option<u64>,
    miss_every: u32,
    realtime: bool,
) -> Result<ScoreCard> {
    let cfg = difficulty.config();
    let bindings = KeyBindings::rhythm(cfg.lanes.max(1));
    let mut session = RhythmSession::new(
        cfg,
        RhythmOptions {
            seed,
            input_offset_secs: settings.input_offset_secs(),
            label: difficulty.name().to_string(),
            ..RhythmOptions::default()
        },
    );
    let mut pacer = Pacer::new(realtime);
    let mut cues = CueOutput::open(settings, realtime);

    session.start(pacer.now())?;
    log::info!("rhythm game started on {}", difficulty.name());

    let mut seen: HashSet<(Lane, u64)> = HashSet::new();
    let mut judged = 0u32;
    while session.phase() != GamePhase::Over {
        let now = pacer.step();
        session.tick(now);
        log_events(&session.drain_events(), &mut cues);
        if session.phase() == GamePhase::Over {
            break;
        }
        if now >= RHYTHM_TIME_LIMIT_SECS {
            log::info!("time limit reached");
            session.quit_to_menu();
            break;
        }

        let position = session.position();
        let timeline = session.timeline();
        let due: Vec<(Lane, u64)> = timeline
            .notes()
            .iter()
            .filter(|note| !note.consumed && timeline.impact_time(note) <= position)
            .map(|note| (note.lane, note.onset.to_bits()))
            .filter(|key| !seen.contains(key))
            .collect();

        for key in due {
            seen.insert(key);
            judged += 1;
            if miss_every > 0 && judged % miss_every == 0 {
                continue;
            }
            let Some(code) = bindings.code_for(key.0) else {
                continue;
            };
            for down in [true, false] {
                session.handle_input(
                    RawInput::Key {
                        code: code.to_string(),
                        down,
                        repeat: false,
                    },
                    now,
                );
            }
        }
        log_events(&session.drain_events(), &mut cues);
    }

    let stats = session.stats();
    log::info!(
        "rhythm game finished: {} hits, {} misses",
        stats.hits,
        stats.misses
    );
    Ok(session.score_card())
}

pub fn run_memory(
    settings: &EngineSettings,
    difficulty: MemoryDifficulty,
    seed: Option<u64>,
    rounds: usize,
    realtime: bool,
) -> Result<ScoreCard> {
    let mut session = MemorySession::new(difficulty, seed);
    let mut pacer = Pacer::new(realtime);
    let mut cues = CueOutput::open(settings, realtime);
    let lanes = session.rules().preset().lanes.max(1);

    session.start(pacer.now());
    log::info!("memory game started on {}", difficulty.name());

    // The bot answers one pad per frame while input is open.
    let mut cursor = 0usize;
    let mut was_input = false;
    while session.phase() != MemoryPhase::Over {
        let now = pacer.step();
        session.tick(now);
        log_events(&session.drain_events(), &mut cues);
        if now >= MEMORY_TIME_LIMIT_SECS {
            log::info!("time limit reached");
            session.quit_to_menu();
            break;
        }

        let input_open = session.phase() == MemoryPhase::Input;
        if input_open && !was_input {
            cursor = 0;
        }
        was_input = input_open;
        if !input_open {
            continue;
        }

        let sequence = session.rules().sequence();
        let Some(&expected) = sequence.get(cursor) else {
            continue;
        };
        let lane = if sequence.len() > rounds {
            (expected + 1) % lanes
        } else {
            expected
        };
        cursor += 1;
        for event in [
            MidiLikeEvent::NoteOn {
                note: lane,
                velocity: 100,
            },
            MidiLikeEvent::NoteOff { note: lane },
        ] {
            session.handle_input(RawInput::Midi(event), now);
        }
        log_events(&session.drain_events(), &mut cues);
    }

    log::info!(
        "memory game finished: score {} after {} rounds",
        session.rules().score(),
        session.rules().longest_combo()
    );
    Ok(session.score_card())
}
