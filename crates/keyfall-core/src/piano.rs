use crate::audio_graph::ScheduledEvent;
use crate::engine::{AudioEngine, MidiHub};
use crate::error::SessionError;
use crate::input_router::{InputRouter, InputSource, KeyBindings, LaneChange, MidiLaneMap, RawInput, Routed};
use crate::ipc::{Command, Event, TimelineRequest};
use crate::layout::LaneLayout;
use crate::playback::{BridgeConfig, PlaybackBridge};
use crate::scroll::{FrameInput, FrameReport, ScrollRenderer};
use crate::theme::ThemeState;
use crate::transport::{HostClock, Transport};
use keyfall_domain_timeline::{import_midi_bytes, import_midi_path, ImportError, Timeline, TimelineSource};
use keyfall_ports::audio::AudioOutputPort;
use keyfall_ports::midi::{MidiInputPort, MidiLikeEvent};
use keyfall_ports::render::RenderSurface;
use keyfall_ports::sampler::SamplerPort;
use keyfall_ports::settings::EngineSettings;
use keyfall_ports::types::{Bus, Lane, Seconds};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// Minimum spacing of unforced transport updates.
const TRANSPORT_EMIT_SECS: Seconds = 0.033;
const DEFAULT_VIEWPORT: (f32, f32) = (1280.0, 720.0);

/// Free-play piano with optional timeline playback.
///
/// `tick` runs once per frame: inputs are applied before the transport-driven
/// highlights and before `render`, so a press shows up in the same frame.
pub struct PianoSession {
    audio: AudioEngine,
    midi: MidiHub,
    clock: Arc<dyn HostClock>,
    settings: EngineSettings,
    transport: Transport,
    timeline: Option<Timeline>,
    bridge: PlaybackBridge,
    router: InputRouter,
    renderer: ScrollRenderer,
    theme: ThemeState,
    pending_inputs: VecDeque<RawInput>,
    live_pressed: HashMap<Lane, Seconds>,
    events: VecDeque<Event>,
    last_transport_emit: Option<Seconds>,
    scheduling_enabled: bool,
}

impl PianoSession {
    pub fn new(
        audio_port: Box<dyn AudioOutputPort>,
        midi_port: Box<dyn MidiInputPort>,
        sampler: Arc<dyn SamplerPort>,
        clock: Arc<dyn HostClock>,
        settings: EngineSettings,
    ) -> Self {
        let audio = AudioEngine::new(audio_port, sampler, &settings);
        let bridge = PlaybackBridge::new(BridgeConfig {
            lookahead_secs: settings.lookahead_ms as f64 / 1000.0,
        });
        let (width, height) = DEFAULT_VIEWPORT;
        Self {
            audio,
            midi: MidiHub::new(midi_port),
            clock,
            transport: Transport::new(settings.start_delay_secs),
            timeline: None,
            bridge,
            router: InputRouter::new(KeyBindings::piano(), MidiLaneMap::Pitch),
            renderer: ScrollRenderer::new(LaneLayout::piano(width, height)),
            theme: ThemeState::new(&settings.theme),
            pending_inputs: VecDeque::new(),
            live_pressed: HashMap::new(),
            events: VecDeque::new(),
            last_transport_emit: None,
            scheduling_enabled: true,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn theme(&self) -> &ThemeState {
        &self.theme
    }

    pub fn is_lane_active(&self, lane: Lane) -> bool {
        self.router.activation().is_active(lane)
    }

    pub fn position(&self) -> Seconds {
        self.transport.position()
    }

    pub fn duration(&self) -> Seconds {
        self.timeline.as_ref().map(Timeline::duration).unwrap_or(0.0)
    }

    /// Fraction of the timeline played, in [0, 1].
    pub fn progress(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        (self.position() / duration).clamp(0.0, 1.0)
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), SessionError> {
        match cmd {
            Command::ListMidiInputs => match self.midi.list_inputs() {
                Ok(devices) => {
                    let connected = !devices.is_empty();
                    self.events.push_back(Event::MidiInputsUpdated { devices });
                    self.events.push_back(Event::ControllerPresence { connected });
                }
                Err(err) => {
                    log::info!("midi inputs unavailable: {err}");
                    self.events.push_back(Event::MidiInputsUpdated {
                        devices: Vec::new(),
                    });
                    self.events
                        .push_back(Event::ControllerPresence { connected: false });
                }
            },
            Command::SelectMidiInput { device_id } => {
                self.midi.select(&device_id)?;
                self.events
                    .push_back(Event::ControllerPresence { connected: true });
            }
            Command::ListAudioOutputs => {
                let devices = self.audio.list_outputs()?;
                self.events.push_back(Event::AudioOutputsUpdated { devices });
            }
            Command::SelectAudioOutput { device_id, config } => {
                self.audio.open_output(&device_id, config)?;
                self.follow_audio_clock();
            }
            Command::SetMasterVolume { volume } => {
                self.settings.master_volume = volume;
                self.audio.set_master(volume);
            }
            Command::SetBusVolume { bus, volume } => {
                match bus {
                    Bus::Live => self.settings.live_volume = volume,
                    Bus::Playback => self.settings.playback_volume = volume,
                    Bus::Fx => self.settings.fx_volume = volume,
                }
                self.audio.set_bus_volume(bus, volume);
            }
            Command::LoadSoundFont { path } => {
                self.audio.load_soundfont(&path)?;
                self.settings.soundfont_path = Some(path);
            }
            Command::SetInstrument { gm_program } => {
                self.scheduling_enabled = false;
                let result = self.audio.set_instrument(gm_program);
                self.scheduling_enabled = true;
                result?;
                self.settings.instrument = gm_program;
                // notes already handed to the old voice were silenced
                let position = self.transport.position();
                self.bridge.seek(position);
                self.release_playback_highlights();
            }
            Command::SetSustain { enabled } => {
                self.settings.sustain = enabled;
                self.audio.set_sustain(enabled);
            }
            Command::SetTheme { name } => {
                if self.theme.select(&name) {
                    self.settings.theme = name.clone();
                    self.events.push_back(Event::ThemeChanged { name });
                }
            }
            Command::LoadTimeline { request } => self.load_timeline(request),
            Command::Unload => self.unload(),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::TogglePlay => {
                if self.transport.is_playing() {
                    self.pause();
                } else {
                    self.play();
                }
            }
            Command::Seek { position } => self.seek(position),
            Command::SeekFraction { fraction } => {
                let fraction = if fraction.is_finite() {
                    fraction.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                self.seek(fraction * self.duration());
            }
            Command::Input { input } => self.handle_input(input),
        }
        Ok(())
    }

    /// Queues raw input for the next `tick`.
    pub fn handle_input(&mut self, input: RawInput) {
        self.pending_inputs.push_back(input);
    }

    pub fn tick(&mut self) {
        let host_now = self.clock.now_secs();
        self.process_midi_inputs();
        self.process_inputs(host_now);

        let position = self.transport.sync(host_now);
        if self.transport.is_playing() {
            self.apply_highlights(position);
            self.schedule_playback(position);
            if position >= self.duration() {
                log::debug!("end of timeline at {position:.3}s");
                self.transport.pause(host_now);
                self.release_playback_highlights();
                self.emit_transport(true);
            }
        }
        self.emit_transport(false);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    /// Draws one frame. `None` when the surface is not ready.
    pub fn render(&mut self, surface: &mut dyn RenderSurface) -> Option<FrameReport> {
        let host_now = self.clock.now_secs();
        let active = self.router.active_lanes();
        let palette = self.theme.palette();
        let track_height = self.renderer.layout().track_height();
        let speed = track_height / self.settings.lead_secs.max(0.1) as f32;
        let pressed = &self.live_pressed;
        let live_height = move |lane: Lane| -> f32 {
            pressed
                .get(&lane)
                .map(|at| ((host_now - at).max(0.0) as f32) * speed)
                .unwrap_or(track_height)
        };
        self.renderer.render(
            surface,
            FrameInput {
                timeline: self.timeline.as_ref(),
                now: self.transport.position(),
                active: &active,
                palette: &palette,
                live_heights: Some(&live_height),
                damage: 0.0,
            },
        )
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.renderer.set_layout(LaneLayout::piano(width, height));
    }

    pub fn layout(&self) -> &LaneLayout {
        self.renderer.layout()
    }

    pub fn midi(&mut self) -> &mut MidiHub {
        &mut self.midi
    }

    fn follow_audio_clock(&mut self) {
        let old_now = self.clock.now_secs();
        self.transport.sync(old_now);
        self.clock = self.audio.clock();
        self.transport.rebase(self.clock.now_secs());
    }

    fn load_timeline(&mut self, request: TimelineRequest) {
        let lead = self.settings.lead_secs;
        let (label, demo, result) = match request {
            TimelineRequest::MidiFile(path) => {
                let result = import_midi_path(Path::new(&path), lead);
                (path, None, result)
            }
            TimelineRequest::MidiBytes { name, bytes } => {
                let result = import_midi_bytes(&bytes, lead);
                (name, None, result)
            }
            TimelineRequest::Demo(name) => {
                let result = self.read_demo(&name, lead);
                (name.clone(), Some(name), result)
            }
        };

        let mut timeline = match result {
            Ok(timeline) => timeline,
            Err(err) => {
                log::warn!("could not load {label}: {err}");
                self.events.push_back(Event::LoadFailed {
                    message: format!("could not load {label}: {err}"),
                });
                return;
            }
        };

        if let Some(name) = demo.as_ref() {
            timeline.source = TimelineSource::Demo(name.clone());
        }
        if timeline.title.is_none() {
            timeline.title = Some(display_name(&label));
        }

        self.stop_playback();
        self.bridge.load(&timeline);
        self.theme.on_demo_loaded(demo.as_deref());
        log::info!(
            "loaded {} ({} notes, {:.1}s)",
            label,
            timeline.len(),
            timeline.duration()
        );
        self.events.push_back(Event::TimelineLoaded {
            title: timeline.title.clone(),
            duration: timeline.duration(),
            note_count: timeline.len(),
        });
        self.timeline = Some(timeline);
        self.emit_transport(true);
    }

    fn read_demo(&self, name: &str, lead: Seconds) -> Result<Timeline, ImportError> {
        // demo names are bare file names inside the demo directory
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(ImportError::Io(format!("invalid demo name {name:?}")));
        }
        let path = Path::new(&self.settings.demo_dir).join(name);
        import_midi_path(&path, lead)
    }

    fn unload(&mut self) {
        self.stop_playback();
        self.timeline = None;
        self.bridge.clear();
        self.theme.clear_override();
        self.release_all_lanes();
        self.events.push_back(Event::TimelineUnloaded);
        self.emit_transport(true);
    }

    fn play(&mut self) {
        let Some(duration) = self.timeline.as_ref().map(Timeline::duration) else {
            log::debug!("play ignored: no timeline");
            return;
        };
        let host_now = self.clock.now_secs();
        let from = if self.transport.position() >= duration {
            self.bridge.seek(0.0);
            Some(0.0)
        } else {
            None
        };
        self.transport.start(from, host_now);
        self.emit_transport(true);
    }

    fn pause(&mut self) {
        self.transport.pause(self.clock.now_secs());
        let position = self.transport.position();
        self.bridge.seek(position);
        self.silence_playback();
        self.emit_transport(true);
    }

    fn seek(&mut self, position: Seconds) {
        let upper = self.duration();
        let position = if position.is_finite() {
            position.clamp(0.0, upper)
        } else {
            0.0
        };
        self.transport.seek(position, self.clock.now_secs());
        self.bridge.seek(position);
        self.silence_playback();
        self.emit_transport(true);
    }

    fn stop_playback(&mut self) {
        self.transport.stop();
        self.bridge.seek(0.0);
        self.silence_playback();
    }

    fn silence_playback(&mut self) {
        self.release_playback_highlights();
        self.audio.flush(Bus::Playback);
    }

    fn release_playback_highlights(&mut self) {
        for lane in self.router.release_all_from(InputSource::Playback) {
            self.events.push_back(Event::LaneHighlight {
                lane: lane.lane,
                active: false,
            });
        }
    }

    fn process_midi_inputs(&mut self) {
        for event in self.midi.drain() {
            self.pending_inputs.push_back(RawInput::Midi(event.event));
        }
    }

    fn process_inputs(&mut self, host_now: Seconds) {
        while let Some(input) = self.pending_inputs.pop_front() {
            if let RawInput::Key {
                code,
                down: true,
                repeat: false,
            } = &input
            {
                if code == "Space" {
                    self.handle_space();
                    continue;
                }
            }
            let routed_inputs = self.router.handle(input, self.renderer.layout());
            self.apply_routed(routed_inputs, host_now);
        }
    }

    fn apply_routed(&mut self, routed_inputs: Vec<Routed>, host_now: Seconds) {
        for routed in routed_inputs {
            match routed {
                Routed::Source(change) if change.source.is_device() => {
                    self.on_device_change(change, host_now)
                }
                Routed::Source(_) => {}
                Routed::Lane(change) => self.events.push_back(Event::LaneHighlight {
                    lane: change.lane,
                    active: change.active,
                }),
                Routed::Pedal { value } => {
                    for bus in [Bus::Live, Bus::Playback] {
                        self.audio.send_now(bus, MidiLikeEvent::Cc64 { value });
                    }
                }
            }
        }
    }

    fn release_all_lanes(&mut self) {
        let host_now = self.clock.now_secs();
        let released = self.router.handle(RawInput::FocusLost, self.renderer.layout());
        self.apply_routed(released, host_now);
    }

    fn handle_space(&mut self) {
        if self.timeline.is_none() {
            return;
        }
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Live sound follows the device holds alone, so a key pressed on a lane
    /// that playback already lights still strikes.
    fn on_device_change(&mut self, change: LaneChange, host_now: Seconds) {
        let held = self
            .router
            .activation()
            .count_where(change.lane, InputSource::is_device);
        if change.active && held == 1 {
            self.live_pressed.insert(change.lane, host_now);
            self.audio.send_now(
                Bus::Live,
                MidiLikeEvent::NoteOn {
                    note: change.lane,
                    velocity: change.velocity,
                },
            );
        } else if !change.active && held == 0 {
            self.live_pressed.remove(&change.lane);
            self.audio
                .send_now(Bus::Live, MidiLikeEvent::NoteOff { note: change.lane });
        }
    }

    fn apply_highlights(&mut self, position: Seconds) {
        for highlight in self.bridge.highlights(position) {
            let change = if highlight.on {
                self.router.press_source(highlight.lane, InputSource::Playback)
            } else {
                self.router.release_source(highlight.lane, InputSource::Playback)
            };
            if let Some(change) = change {
                self.events.push_back(Event::LaneHighlight {
                    lane: change.lane,
                    active: change.active,
                });
            }
        }
    }

    fn schedule_playback(&mut self, position: Seconds) {
        if !self.scheduling_enabled || !self.audio.is_open() {
            return;
        }
        let transport = &self.transport;
        let audio = &self.audio;
        let scheduled: Vec<ScheduledEvent> = self
            .bridge
            .schedule(position, |at| audio.sample_at(transport.host_time_of(at)));
        for event in scheduled {
            self.audio.push(event);
        }
    }

    fn emit_transport(&mut self, force: bool) {
        let now = self.clock.now_secs();
        if !force {
            if let Some(last) = self.last_transport_emit {
                if now - last < TRANSPORT_EMIT_SECS {
                    return;
                }
            }
        }
        self.events.push_back(Event::TransportUpdated {
            position: self.position(),
            duration: self.duration(),
            progress: self.progress(),
            playing: self.transport.is_playing(),
        });
        self.last_transport_emit = Some(now);
    }
}

fn display_name(label: &str) -> String {
    let file = Path::new(label)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(label);
    file.to_string()
}
