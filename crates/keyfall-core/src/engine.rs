use crate::audio_graph::{AudioClock, AudioGraph, QueuedEvent, ScheduledEvent};
use crate::audio_params::AudioParams;
use crate::ipc::SoundCue;
use keyfall_ports::audio::{AudioError, AudioOutputPort, AudioStreamHandle};
use keyfall_ports::midi::{MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent};
use keyfall_ports::sampler::{SamplerError, SamplerPort, SoundFontInfo};
use keyfall_ports::settings::EngineSettings;
use keyfall_ports::types::{
    AudioConfig, AudioOutputDevice, Bus, DeviceId, MidiInputDevice, SampleTime, Seconds, Volume01,
};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::Arc;

const AUDIO_QUEUE_CAPACITY: usize = 4096;
const MIDI_QUEUE_CAPACITY: usize = 2048;
const MAX_BLOCK_FRAMES: usize = 4096;
/// Length of feedback cues on the FX bus.
const CUE_SECS: Seconds = 0.15;
const LANE_CUE_NOTES: [u8; 4] = [60, 64, 67, 72];
const DAMAGE_NOTE: u8 = 36;

/// Output stream, mix levels and the queue feeding the audio thread.
pub struct AudioEngine {
    port: Box<dyn AudioOutputPort>,
    sampler: Arc<dyn SamplerPort>,
    params: Arc<AudioParams>,
    clock: Arc<AudioClock>,
    stream: Option<Box<dyn AudioStreamHandle>>,
    queue_tx: Option<Producer<QueuedEvent>>,
}

impl AudioEngine {
    pub fn new(
        port: Box<dyn AudioOutputPort>,
        sampler: Arc<dyn SamplerPort>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            port,
            sampler,
            params: Arc::new(AudioParams::new(settings)),
            clock: Arc::new(AudioClock::new(AudioConfig::default().sample_rate_hz)),
            stream: None,
            queue_tx: None,
        }
    }

    pub fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        self.port.list_outputs()
    }

    pub fn open_output(
        &mut self,
        device_id: &DeviceId,
        config: Option<AudioConfig>,
    ) -> Result<(), AudioError> {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.queue_tx = None;

        let config = config.unwrap_or_default();
        self.clock.set_sample_rate(config.sample_rate_hz);
        self.clock.set(0);
        self.sampler.set_sample_rate(config.sample_rate_hz);

        let (producer, consumer) = RingBuffer::new(AUDIO_QUEUE_CAPACITY);
        let graph = AudioGraph::new(
            self.sampler.clone(),
            self.params.clone(),
            consumer,
            self.clock.clone(),
            MAX_BLOCK_FRAMES,
        );
        let stream = self.port.open_output(device_id, config, Box::new(graph))?;
        log::info!(
            "audio output {} open at {} Hz",
            device_id,
            config.sample_rate_hz
        );
        self.stream = Some(stream);
        self.queue_tx = Some(producer);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.queue_tx.is_some()
    }

    pub fn close(&mut self) {
        self.queue_tx = None;
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    pub fn clock(&self) -> Arc<AudioClock> {
        self.clock.clone()
    }

    pub fn now_sample(&self) -> SampleTime {
        self.clock.get()
    }

    pub fn sample_at(&self, host_secs: Seconds) -> SampleTime {
        self.clock.sample_at(host_secs)
    }

    /// Queues an event for the audio thread. Dropped while no stream is open
    /// or the queue is full.
    pub fn push(&mut self, event: ScheduledEvent) -> bool {
        let Some(producer) = self.queue_tx.as_mut() else {
            return false;
        };
        let queued = QueuedEvent {
            event,
            epoch: self.params.epoch(event.bus),
        };
        if producer.push(queued).is_err() {
            log::warn!("audio queue full, dropping {:?}", event.event);
            return false;
        }
        true
    }

    /// Plays `event` on `bus` as soon as possible.
    pub fn send_now(&mut self, bus: Bus, event: MidiLikeEvent) -> bool {
        let sample_time = self.now_sample();
        self.push(ScheduledEvent {
            sample_time,
            bus,
            event,
        })
    }

    /// Releases every key and the pedal on `bus`. Events already queued for
    /// the bus, including ones stamped in the future, are discarded.
    pub fn flush(&mut self, bus: Bus) {
        self.params.bump_epoch(bus);
        for note in 0..128u8 {
            self.send_now(bus, MidiLikeEvent::NoteOff { note });
        }
        self.send_now(bus, MidiLikeEvent::Cc64 { value: 0 });
    }

    pub fn set_sustain(&mut self, enabled: bool) {
        let value = if enabled { 127 } else { 0 };
        for bus in Bus::ALL {
            self.send_now(bus, MidiLikeEvent::Cc64 { value });
        }
    }

    pub fn set_master(&self, volume: Volume01) {
        self.params.set_master(volume);
    }

    pub fn set_bus_volume(&self, bus: Bus, volume: Volume01) {
        self.params.set_bus(bus, volume);
    }

    pub fn load_soundfont(&self, path: &str) -> Result<SoundFontInfo, SamplerError> {
        let info = self.sampler.load_soundfont_from_path(path)?;
        log::info!("loaded soundfont {} ({} presets)", info.name, info.preset_count);
        Ok(info)
    }

    /// Silences the buses, then swaps the voice. Callers stop scheduling first.
    pub fn set_instrument(&mut self, gm_program: u8) -> Result<(), SamplerError> {
        for bus in [Bus::Live, Bus::Playback] {
            self.flush(bus);
            self.sampler.set_instrument(bus, gm_program)?;
        }
        log::debug!("instrument set to GM program {gm_program}");
        Ok(())
    }

    /// Short feedback sound on the FX bus.
    pub fn play_cue(&mut self, cue: SoundCue) {
        let (note, velocity) = match cue {
            SoundCue::LaneHit { lane } => (LANE_CUE_NOTES[lane as usize % LANE_CUE_NOTES.len()], 90),
            SoundCue::Damage => (DAMAGE_NOTE, 120),
            SoundCue::Success => (84, 100),
            SoundCue::Failure => (40, 110),
        };
        let start = self.now_sample();
        let length = (CUE_SECS * self.clock.sample_rate_hz() as f64).round() as SampleTime;
        self.push(ScheduledEvent {
            sample_time: start,
            bus: Bus::Fx,
            event: MidiLikeEvent::NoteOn { note, velocity },
        });
        self.push(ScheduledEvent {
            sample_time: start + length,
            bus: Bus::Fx,
            event: MidiLikeEvent::NoteOff { note },
        });
    }
}

/// Controller inputs feeding one queue drained by the session.
pub struct MidiHub {
    port: Box<dyn MidiInputPort>,
    streams: Vec<Box<dyn MidiInputStream>>,
    queue_tx: Arc<Mutex<Producer<PlayerEvent>>>,
    queue_rx: Consumer<PlayerEvent>,
}

impl MidiHub {
    pub fn new(port: Box<dyn MidiInputPort>) -> Self {
        let (producer, consumer) = RingBuffer::new(MIDI_QUEUE_CAPACITY);
        Self {
            port,
            streams: Vec::new(),
            queue_tx: Arc::new(Mutex::new(producer)),
            queue_rx: consumer,
        }
    }

    pub fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        self.port.list_inputs()
    }

    pub fn connected(&self) -> usize {
        self.streams.len()
    }

    /// Replaces any open inputs with `device_id`.
    pub fn select(&mut self, device_id: &DeviceId) -> Result<(), MidiError> {
        self.close_all();
        self.open(device_id)
    }

    /// Opens every available input. A host without MIDI support yields zero.
    pub fn connect_all(&mut self) -> usize {
        self.close_all();
        let devices = match self.port.list_inputs() {
            Ok(devices) => devices,
            Err(err) => {
                log::info!("no midi input available: {err}");
                return 0;
            }
        };
        for device in devices.iter().filter(|d| d.is_available) {
            if let Err(err) = self.open(&device.id) {
                log::warn!("failed to open midi input {}: {err}", device.name);
            }
        }
        self.streams.len()
    }

    pub fn close_all(&mut self) {
        for stream in self.streams.drain(..) {
            stream.close();
        }
    }

    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.queue_rx.pop() {
            events.push(event);
        }
        events
    }

    fn open(&mut self, device_id: &DeviceId) -> Result<(), MidiError> {
        let producer = self.queue_tx.clone();
        let cb = Arc::new(move |event: PlayerEvent| {
            match producer.try_lock() {
                Some(mut guard) => {
                    if guard.push(event).is_err() {
                        log::warn!("midi queue full, dropping {:?}", event.event);
                    }
                }
                None => log::warn!("midi queue busy, dropping {:?}", event.event),
            }
        });
        let stream = self.port.open_input(device_id, cb)?;
        log::info!("midi input {device_id} connected");
        self.streams.push(stream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfall_ports::midi::PlayerEventCallback;
    use std::time::Instant;

    /// Hands the callback of the opened input back to the test.
    struct Keyboard {
        cb: Arc<Mutex<Option<PlayerEventCallback>>>,
    }

    struct Stream;

    impl MidiInputStream for Stream {
        fn close(self: Box<Self>) {}
    }

    impl MidiInputPort for Keyboard {
        fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
            Ok(Vec::new())
        }

        fn open_input(
            &self,
            _device_id: &DeviceId,
            cb: PlayerEventCallback,
        ) -> Result<Box<dyn MidiInputStream>, MidiError> {
            *self.cb.lock() = Some(cb);
            Ok(Box::new(Stream))
        }
    }

    fn key(note: u8) -> PlayerEvent {
        PlayerEvent {
            at: Instant::now(),
            event: MidiLikeEvent::NoteOn { note, velocity: 64 },
        }
    }

    #[test]
    fn overflowing_midi_input_keeps_the_queued_events() {
        let slot = Arc::new(Mutex::new(None));
        let mut hub = MidiHub::new(Box::new(Keyboard { cb: slot.clone() }));
        hub.select(&DeviceId("keys".to_string())).unwrap();
        let cb: PlayerEventCallback = slot.lock().clone().unwrap();

        for i in 0..MIDI_QUEUE_CAPACITY + 10 {
            cb(key((i % 128) as u8));
        }
        let drained = hub.drain();
        assert_eq!(drained.len(), MIDI_QUEUE_CAPACITY);
        assert_eq!(drained[0].event, MidiLikeEvent::NoteOn { note: 0, velocity: 64 });

        // the queue accepts input again once drained
        cb(key(60));
        assert_eq!(hub.drain().len(), 1);
    }

    #[test]
    fn flush_invalidates_events_already_queued() {
        struct NoOutput;
        impl AudioOutputPort for NoOutput {
            fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
                Ok(Vec::new())
            }
            fn open_output(
                &self,
                device_id: &DeviceId,
                _config: AudioConfig,
                _cb: Box<dyn keyfall_ports::audio::AudioRenderCallback>,
            ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
                Err(AudioError::DeviceNotFound(device_id.0.clone()))
            }
        }
        struct Silent;
        impl SamplerPort for Silent {
            fn load_soundfont_from_path(&self, _path: &str) -> Result<SoundFontInfo, SamplerError> {
                Err(SamplerError::NotLoaded)
            }
            fn set_sample_rate(&self, _sample_rate_hz: u32) {}
            fn set_instrument(&self, _bus: Bus, _gm_program: u8) -> Result<(), SamplerError> {
                Ok(())
            }
            fn handle_event(&self, _bus: Bus, _event: MidiLikeEvent, _at: SampleTime) {}
            fn render(&self, _bus: Bus, _frames: usize, _l: &mut [f32], _r: &mut [f32]) {}
        }

        let mut engine = AudioEngine::new(
            Box::new(NoOutput),
            Arc::new(Silent),
            &EngineSettings::default(),
        );
        let before = engine.params.epoch(Bus::Playback);
        engine.flush(Bus::Playback);
        assert_eq!(engine.params.epoch(Bus::Playback), before.wrapping_add(1));
        assert_eq!(engine.params.epoch(Bus::Live), 0);
    }
}
