mod players;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keyfall_core::{
    CardFont, Command, Event, FrameInput, LaneLayout, PianoSession, RasterSurface, ScoreCard,
    ScrollRenderer, ThemeState, TimelineRequest, WallClock,
};
use keyfall_domain_eval::{Difficulty, MemoryDifficulty};
use keyfall_domain_timeline::{grid_beatmap, import_midi_path, GridPattern, LaneGenerator};
use keyfall_infra_audio_cpal::CpalOutputPort;
use keyfall_infra_midi_midir::MidirInputPort;
use keyfall_infra_sampler_rustysynth::RustySampler;
use keyfall_ports::audio::AudioOutputPort;
use keyfall_ports::midi::MidiInputPort;
use keyfall_ports::settings::EngineSettings;
use keyfall_ports::types::AudioOutputDevice;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "keyfall", about = "Falling-note piano with rhythm and memory games")]
struct Cli {
    /// Settings JSON file. Missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio outputs and MIDI controllers.
    Devices,
    /// Play a MIDI file through the sampler. JSON commands are read from stdin
    /// and session events are printed as JSON lines.
    Play {
        /// MIDI file to load.
        file: Option<PathBuf>,
        /// Demo file name inside the configured demo directory.
        #[arg(long, conflicts_with = "file")]
        demo: Option<String>,
        /// Audio output id as printed by `devices`; defaults to the first output.
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        soundfont: Option<PathBuf>,
        /// Keep running after the timeline ends.
        #[arg(long)]
        stay: bool,
    },
    /// Render one frame of a MIDI file, or of a generated grid chart, to PNG.
    Snapshot {
        #[arg(required_unless_present = "grid")]
        file: Option<PathBuf>,
        /// Generate a four-lane grid chart instead of reading a file.
        #[arg(long, value_enum, conflicts_with = "file")]
        grid: Option<GridLevel>,
        #[arg(long)]
        seed: Option<u64>,
        /// Transport position in seconds.
        #[arg(long, default_value_t = 10.0)]
        at: f64,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Run a rhythm game with an automatic player.
    Rhythm {
        #[arg(long, value_enum, default_value_t = RhythmLevel::Easy)]
        difficulty: RhythmLevel,
        #[arg(long)]
        seed: Option<u64>,
        /// The bot lets every n-th note pass. 0 never misses.
        #[arg(long, default_value_t = 4)]
        miss_every: u32,
        /// Pace the game in real time and play its cues.
        #[arg(long)]
        realtime: bool,
        /// Write the final score card here.
        #[arg(long)]
        card: Option<PathBuf>,
    },
    /// Run a memory game with an automatic player.
    Memory {
        #[arg(long, value_enum, default_value_t = MemoryLevel::Easy)]
        difficulty: MemoryLevel,
        #[arg(long)]
        seed: Option<u64>,
        /// Rounds the bot completes before it starts failing.
        #[arg(long, default_value_t = 5)]
        rounds: usize,
        #[arg(long)]
        realtime: bool,
        #[arg(long)]
        card: Option<PathBuf>,
    },
    /// Render a score card without playing.
    ScoreCard {
        #[arg(long, default_value = "Rhythm")]
        title: String,
        #[arg(long)]
        score: i64,
        #[arg(long, default_value_t = 0)]
        combo: u32,
        #[arg(long, default_value = "Easy")]
        difficulty: String,
        #[arg(long, short)]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RhythmLevel {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl From<RhythmLevel> for Difficulty {
    fn from(level: RhythmLevel) -> Self {
        match level {
            RhythmLevel::Easy => Difficulty::Easy,
            RhythmLevel::Normal => Difficulty::Normal,
            RhythmLevel::Hard => Difficulty::Hard,
            RhythmLevel::Expert => Difficulty::Expert,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GridLevel {
    Beginner,
    Medium,
    Expert,
}

impl From<GridLevel> for GridPattern {
    fn from(level: GridLevel) -> Self {
        match level {
            GridLevel::Beginner => GridPattern::BEGINNER,
            GridLevel::Medium => GridPattern::MEDIUM,
            GridLevel::Expert => GridPattern::EXPERT,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MemoryLevel {
    Easy,
    Normal,
    Hard,
    Harder,
    Insane,
}

impl From<MemoryLevel> for MemoryDifficulty {
    fn from(level: MemoryLevel) -> Self {
        match level {
            MemoryLevel::Easy => MemoryDifficulty::Easy,
            MemoryLevel::Normal => MemoryDifficulty::Normal,
            MemoryLevel::Hard => MemoryDifficulty::Hard,
            MemoryLevel::Harder => MemoryDifficulty::Harder,
            MemoryLevel::Insane => MemoryDifficulty::Insane,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Play {
            file,
            demo,
            output,
            soundfont,
            stay,
        } => {
            let request = match (file, demo) {
                (Some(file), None) => TimelineRequest::MidiFile(file.to_string_lossy().into_owned()),
                (None, Some(demo)) => TimelineRequest::Demo(demo),
                _ => bail!("give a MIDI file or --demo"),
            };
            let mut settings = settings;
            if let Some(path) = soundfont {
                settings.soundfont_path = Some(path.to_string_lossy().into_owned());
            }
            play(settings, request, output, stay)
        }
        Commands::Snapshot {
            file,
            grid,
            seed,
            at,
            width,
            height,
            out,
        } => {
            let source = match (file, grid) {
                (Some(file), _) => ChartSource::File(file),
                (None, Some(level)) => ChartSource::Grid(level.into(), seed),
                (None, None) => bail!("give a MIDI file or --grid"),
            };
            snapshot(&settings, source, at, (width, height), &out)
        }
        Commands::Rhythm {
            difficulty,
            seed,
            miss_every,
            realtime,
            card,
        } => {
            let card_data =
                players::run_rhythm(&settings, difficulty.into(), seed, miss_every, realtime)?;
            finish_card(&settings, card_data, card.as_deref())
        }
        Commands::Memory {
            difficulty,
            seed,
            rounds,
            realtime,
            card,
        } => {
            let card_data = players::run_memory(&settings, difficulty.into(), seed, rounds, realtime)?;
            finish_card(&settings, card_data, card.as_deref())
        }
        Commands::ScoreCard {
            title,
            score,
            combo,
            difficulty,
            out,
        } => {
            let card = ScoreCard {
                title,
                score,
                longest_combo: combo,
                difficulty,
            };
            let font = CardFont::locate(settings.card_font_path.as_deref());
            card.save_png(&out, font.as_ref())
                .with_context(|| format!("writing {}", out.display()))
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    match path {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(EngineSettings::default()),
    }
}

fn list_devices() -> Result<()> {
    let outputs = CpalOutputPort::new()
        .list_outputs()
        .context("listing audio outputs")?;
    println!("audio outputs:");
    for device in outputs {
        println!(
            "  {}  {} ({} Hz, {} ch)",
            device.id, device.name, device.default_config.sample_rate_hz, device.default_config.channels
        );
    }

    println!("midi inputs:");
    match MidirInputPort::default().list_inputs() {
        Ok(inputs) if inputs.is_empty() => println!("  none"),
        Ok(inputs) => {
            for device in inputs {
                println!("  {}  {}", device.id, device.name);
            }
        }
        Err(err) => println!("  unavailable: {err}"),
    }
    Ok(())
}

/// First output, or the one whose id matches `wanted`.
pub(crate) fn pick_output(port: &CpalOutputPort, wanted: Option<&str>) -> Result<AudioOutputDevice> {
    let outputs = port.list_outputs().context("listing audio outputs")?;
    let device = match wanted {
        Some(id) => outputs.into_iter().find(|device| device.id.0 == id),
        None => outputs.into_iter().next(),
    };
    device.context("no matching audio output")
}

fn play(
    settings: EngineSettings,
    request: TimelineRequest,
    output: Option<String>,
    stay: bool,
) -> Result<()> {
    let audio_port = CpalOutputPort::new();
    let device = pick_output(&audio_port, output.as_deref())?;
    let soundfont = settings.soundfont_path.clone();
    let instrument = settings.instrument;

    let mut session = PianoSession::new(
        Box::new(audio_port),
        Box::new(MidirInputPort::default()),
        Arc::new(RustySampler::default()),
        Arc::new(WallClock::new()),
        settings,
    );
    session.handle_command(Command::SelectAudioOutput {
        device_id: device.id.clone(),
        config: Some(device.default_config),
    })?;
    if let Some(path) = soundfont {
        if let Err(err) = session.handle_command(Command::LoadSoundFont { path }) {
            log::warn!("playing without a soundfont: {err}");
        }
    }
    session.handle_command(Command::SetInstrument {
        gm_program: instrument,
    })?;
    let controllers = session.midi().connect_all();
    log::info!("{controllers} midi controllers connected");
    session.handle_command(Command::ListMidiInputs)?;

    session.handle_command(Command::LoadTimeline { request })?;
    let loaded = session.drain_events();
    for event in &loaded {
        if let Event::LoadFailed { message } = event {
            bail!("{message}");
        }
    }
    print_events(&loaded);
    session.handle_command(Command::Play)?;

    let session = Arc::new(Mutex::new(session));
    spawn_command_reader(session.clone());

    loop {
        let events = {
            let mut session = session.lock();
            session.tick();
            session.drain_events()
        };
        print_events(&events);
        let finished = events.iter().any(|event| {
            matches!(event, Event::TransportUpdated { playing: false, progress, .. } if *progress >= 1.0)
        });
        if finished && !stay {
            break;
        }
        std::thread::sleep(FRAME);
    }
    session.lock().midi().close_all();
    Ok(())
}

/// Forwards JSON commands from stdin to the session, one per line.
fn spawn_command_reader(session: Arc<Mutex<PianoSession>>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Command>(&line) {
                Ok(command) => {
                    if let Err(err) = session.lock().handle_command(command) {
                        log::warn!("command failed: {err}");
                    }
                }
                Err(err) => log::warn!("ignoring command {line:?}: {err}"),
            }
        }
    });
}

fn print_events(events: &[Event]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(json) => println!("{json}"),
            Err(err) => log::warn!("could not encode event: {err}"),
        }
    }
}

enum ChartSource {
    File(PathBuf),
    Grid(GridPattern, Option<u64>),
}

const GRID_LANES: u8 = 4;
const GRID_LENGTH_SECS: f64 = 35.0;

fn snapshot(
    settings: &EngineSettings,
    source: ChartSource,
    at: f64,
    (width, height): (u32, u32),
    out: &Path,
) -> Result<()> {
    let (timeline, layout) = match source {
        ChartSource::File(file) => (
            import_midi_path(&file, settings.lead_secs)
                .with_context(|| format!("loading {}", file.display()))?,
            LaneLayout::piano(width as f32, height as f32),
        ),
        ChartSource::Grid(pattern, seed) => (
            grid_beatmap(
                pattern,
                &mut LaneGenerator::new(GRID_LANES, seed),
                GRID_LENGTH_SECS,
                settings.lead_secs,
            ),
            LaneLayout::rhythm(GRID_LANES, width as f32, height as f32),
        ),
    };
    log::info!("snapshot of {} notes at {at:.2}s", timeline.len());

    let mut renderer = ScrollRenderer::new(layout);
    let mut surface = RasterSurface::new(width, height);
    let palette = ThemeState::new(&settings.theme).palette();
    let active = HashSet::new();

    let report = renderer.render(
        &mut surface,
        FrameInput {
            timeline: Some(&timeline),
            now: at,
            active: &active,
            palette: &palette,
            live_heights: None,
            damage: 0.0,
        },
    );
    let Some(report) = report else {
        bail!("snapshot surface has no size");
    };
    log::info!("{} bars on screen", report.bars.len());
    surface
        .into_image()
        .save(out)
        .with_context(|| format!("writing {}", out.display()))
}

fn finish_card(settings: &EngineSettings, card: ScoreCard, out: Option<&Path>) -> Result<()> {
    println!(
        "{}: score {} longest combo {} ({})",
        card.title, card.score, card.longest_combo, card.difficulty
    );
    if let Some(out) = out {
        let font = CardFont::locate(settings.card_font_path.as_deref());
        card.save_png(out, font.as_ref())
            .with_context(|| format!("writing {}", out.display()))?;
    }
    Ok(())
}
