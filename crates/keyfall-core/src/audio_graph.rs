use crate::audio_params::AudioParams;
use crate::transport::HostClock;
use keyfall_ports::audio::AudioRenderCallback;
use keyfall_ports::midi::MidiLikeEvent;
use keyfall_ports::sampler::SamplerPort;
use keyfall_ports::types::{Bus, SampleTime, Seconds};
use rtrb::Consumer;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc,
};

/// A sampler event stamped with the absolute sample at which it must sound.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub sample_time: SampleTime,
    pub bus: Bus,
    pub event: MidiLikeEvent,
}

impl ScheduledEvent {
    /// Order within one sample: pedal down, releases, attacks, pedal up.
    fn dispatch_key(&self) -> (SampleTime, u8, Option<u8>) {
        let rank = match self.event {
            MidiLikeEvent::Cc64 { value } if value >= 64 => 0,
            MidiLikeEvent::NoteOff { .. } => 1,
            MidiLikeEvent::NoteOn { .. } => 2,
            MidiLikeEvent::Cc64 { .. } => 3,
        };
        (self.sample_time, rank, self.event.note())
    }
}

/// A scheduled event tagged with its bus epoch at the time it was queued.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuedEvent {
    pub event: ScheduledEvent,
    pub epoch: u32,
}

/// Samples rendered so far by the output stream. Serves as the transport's
/// host clock while a stream is open.
pub struct AudioClock {
    rendered: AtomicU64,
    rate: AtomicU32,
}

impl AudioClock {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            rendered: AtomicU64::new(0),
            rate: AtomicU32::new(sample_rate_hz.max(1)),
        }
    }

    pub fn set(&self, sample_time: SampleTime) {
        self.rendered.store(sample_time, Ordering::Relaxed);
    }

    pub fn get(&self) -> SampleTime {
        self.rendered.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, sample_rate_hz: u32) {
        self.rate.store(sample_rate_hz.max(1), Ordering::Relaxed);
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.rate.load(Ordering::Relaxed)
    }

    /// Sample index for a host time on this clock.
    pub fn sample_at(&self, secs: Seconds) -> SampleTime {
        if secs.is_finite() && secs > 0.0 {
            (secs * f64::from(self.sample_rate_hz())).round() as SampleTime
        } else {
            0
        }
    }
}

impl HostClock for AudioClock {
    fn now_secs(&self) -> Seconds {
        self.get() as f64 / f64::from(self.sample_rate_hz())
    }
}

const LIMIT: f32 = 0.98;
const ATTACK: f32 = 0.25;
const RELEASE: f32 = 0.01;

/// Block-rate peak limiter: clamps fast, recovers slowly.
#[derive(Debug)]
struct Limiter {
    gain: f32,
}

impl Limiter {
    fn apply(&mut self, left: &mut [f32], right: &mut [f32]) {
        let peak = left
            .iter()
            .chain(right.iter())
            .fold(0.0_f32, |peak, v| peak.max(v.abs()));
        let target = if peak > LIMIT { LIMIT / peak } else { 1.0 };
        let speed = if target < self.gain { ATTACK } else { RELEASE };
        self.gain = (self.gain + speed * (target - self.gain)).clamp(0.0, 1.0);

        if self.gain < 0.999 {
            for v in left.iter_mut().chain(right.iter_mut()) {
                *v *= self.gain;
            }
        }
    }
}

/// Render callback feeding the sampler. Each block is split at event
/// boundaries so every event lands on its own sample; the three buses are
/// mixed with their levels and the master level, then limited.
///
/// Events whose epoch no longer matches their bus are discarded unplayed.
pub struct AudioGraph {
    sampler: Arc<dyn SamplerPort>,
    params: Arc<AudioParams>,
    clock: Arc<AudioClock>,
    queue: Consumer<QueuedEvent>,
    pending: Vec<QueuedEvent>,
    due: Vec<ScheduledEvent>,
    bus_l: Vec<f32>,
    bus_r: Vec<f32>,
    limiter: Limiter,
}

impl AudioGraph {
    pub fn new(
        sampler: Arc<dyn SamplerPort>,
        params: Arc<AudioParams>,
        queue: Consumer<QueuedEvent>,
        clock: Arc<AudioClock>,
        max_frames: usize,
    ) -> Self {
        Self {
            sampler,
            params,
            clock,
            queue,
            pending: Vec::with_capacity(1024),
            due: Vec::with_capacity(512),
            bus_l: vec![0.0; max_frames],
            bus_r: vec![0.0; max_frames],
            limiter: Limiter { gain: 1.0 },
        }
    }

    /// Drains the queue, drops stale events, then moves everything that
    /// sounds before `block_end` into `due`.
    fn take_due(&mut self, block_end: SampleTime) {
        while let Ok(queued) = self.queue.pop() {
            self.pending.push(queued);
        }
        let params = &self.params;
        self.pending
            .retain(|queued| queued.epoch == params.epoch(queued.event.bus));

        self.due.clear();
        let due = &mut self.due;
        self.pending.retain(|queued| {
            if queued.event.sample_time < block_end {
                due.push(queued.event);
                false
            } else {
                true
            }
        });
        self.due.sort_by_key(ScheduledEvent::dispatch_key);
    }

    fn mix(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len();
        if self.bus_l.len() < frames {
            self.bus_l.resize(frames, 0.0);
            self.bus_r.resize(frames, 0.0);
        }
        out_l.fill(0.0);
        out_r.fill(0.0);

        let master = self.params.master();
        for bus in Bus::ALL {
            let (bus_l, bus_r) = (&mut self.bus_l[..frames], &mut self.bus_r[..frames]);
            bus_l.fill(0.0);
            bus_r.fill(0.0);
            self.sampler.render(bus, frames, bus_l, bus_r);

            let gain = self.params.bus(bus) * master;
            for (out, v) in out_l.iter_mut().zip(bus_l.iter()) {
                *out += v * gain;
            }
            for (out, v) in out_r.iter_mut().zip(bus_r.iter()) {
                *out += v * gain;
            }
        }
        self.limiter.apply(out_l, out_r);
    }
}

impl AudioRenderCallback for AudioGraph {
    fn render(&mut self, block_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let block_end = block_start.saturating_add(frames as SampleTime);
        self.take_due(block_end);

        let mut done = 0usize;
        for index in 0..self.due.len() {
            let event = self.due[index];
            // late events sound at the current cursor
            let offset = (event.sample_time.saturating_sub(block_start) as usize).max(done);
            if offset > done {
                self.mix(&mut out_l[done..offset], &mut out_r[done..offset]);
                done = offset;
            }
            self.sampler
                .handle_event(event.bus, event.event, block_start + done as SampleTime);
        }
        if done < frames {
            self.mix(&mut out_l[done..frames], &mut out_r[done..frames]);
        }

        self.clock.set(block_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfall_ports::sampler::{SamplerError, SoundFontInfo};
    use keyfall_ports::settings::EngineSettings;
    use parking_lot::Mutex;
    use rtrb::RingBuffer;

    /// Outputs a constant level per bus and records event positions.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(SampleTime, MidiLikeEvent)>>,
    }

    impl SamplerPort for Recorder {
        fn load_soundfont_from_path(&self, _path: &str) -> Result<SoundFontInfo, SamplerError> {
            Err(SamplerError::NotLoaded)
        }
        fn set_sample_rate(&self, _sample_rate_hz: u32) {}
        fn set_instrument(&self, _bus: Bus, _gm_program: u8) -> Result<(), SamplerError> {
            Ok(())
        }
        fn handle_event(&self, _bus: Bus, event: MidiLikeEvent, at: SampleTime) {
            self.events.lock().push((at, event));
        }
        fn render(&self, bus: Bus, _frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
            let level = if bus == Bus::Live { 0.1 } else { 0.0 };
            out_l.fill(level);
            out_r.fill(level);
        }
    }

    fn graph() -> (
        AudioGraph,
        rtrb::Producer<QueuedEvent>,
        Arc<Recorder>,
        Arc<AudioClock>,
    ) {
        let settings = EngineSettings {
            master_volume: keyfall_ports::types::Volume01::new(1.0),
            ..EngineSettings::default()
        };
        let sampler = Arc::new(Recorder::default());
        let clock = Arc::new(AudioClock::new(1000));
        let (producer, consumer) = RingBuffer::new(16);
        let graph = AudioGraph::new(
            sampler.clone(),
            Arc::new(AudioParams::new(&settings)),
            consumer,
            clock.clone(),
            8,
        );
        (graph, producer, sampler, clock)
    }

    fn at(sample_time: SampleTime, event: MidiLikeEvent) -> QueuedEvent {
        QueuedEvent {
            event: ScheduledEvent {
                sample_time,
                bus: Bus::Live,
                event,
            },
            epoch: 0,
        }
    }

    #[test]
    fn events_land_on_their_sample_and_later_ones_wait() {
        let (mut graph, mut producer, sampler, clock) = graph();
        for event in [
            at(3, MidiLikeEvent::NoteOn { note: 60, velocity: 90 }),
            at(3, MidiLikeEvent::NoteOff { note: 60 }),
            at(12, MidiLikeEvent::NoteOff { note: 60 }),
        ] {
            producer.push(event).unwrap();
        }

        let (mut l, mut r) = ([0.0; 8], [0.0; 8]);
        graph.render(0, &mut l, &mut r);
        assert_eq!(clock.get(), 8);
        assert_eq!(
            *sampler.events.lock(),
            vec![
                (3, MidiLikeEvent::NoteOff { note: 60 }),
                (3, MidiLikeEvent::NoteOn { note: 60, velocity: 90 }),
            ]
        );

        graph.render(8, &mut l, &mut r);
        assert_eq!(sampler.events.lock().len(), 3);
        assert_eq!(sampler.events.lock()[2].0, 12);
    }

    #[test]
    fn late_events_play_at_block_start() {
        let (mut graph, mut producer, sampler, _clock) = graph();
        producer
            .push(at(2, MidiLikeEvent::NoteOn { note: 61, velocity: 80 }))
            .unwrap();
        let (mut l, mut r) = ([0.0; 8], [0.0; 8]);
        graph.render(16, &mut l, &mut r);
        assert_eq!(sampler.events.lock()[0].0, 16);
    }

    #[test]
    fn events_from_an_older_epoch_never_sound() {
        let (mut graph, mut producer, sampler, _clock) = graph();
        producer
            .push(at(6, MidiLikeEvent::NoteOn { note: 60, velocity: 100 }))
            .unwrap();
        // first block leaves the note-on pending
        let (mut l, mut r) = ([0.0; 4], [0.0; 4]);
        graph.render(0, &mut l, &mut r);
        assert!(sampler.events.lock().is_empty());

        let epoch = graph.params.bump_epoch(Bus::Live);
        let mut release = at(0, MidiLikeEvent::NoteOff { note: 60 });
        release.epoch = epoch;
        producer.push(release).unwrap();
        graph.render(4, &mut l, &mut r);
        graph.render(8, &mut l, &mut r);
        assert_eq!(
            *sampler.events.lock(),
            vec![(4, MidiLikeEvent::NoteOff { note: 60 })]
        );
    }

    #[test]
    fn buses_mix_with_their_levels() {
        let (mut graph, _producer, _sampler, _clock) = graph();
        let (mut l, mut r) = ([0.0; 4], [0.0; 4]);
        graph.render(0, &mut l, &mut r);
        let expected = 0.1 * EngineSettings::default().live_volume.get();
        assert!(l.iter().chain(r.iter()).all(|v| (v - expected).abs() < 1e-6));
    }

    #[test]
    fn limiter_pulls_peaks_under_the_ceiling() {
        let mut limiter = Limiter { gain: 1.0 };
        let (mut l, mut r) = (vec![2.0_f32; 64], vec![-2.0_f32; 64]);
        for _ in 0..40 {
            l.fill(2.0);
            r.fill(-2.0);
            limiter.apply(&mut l, &mut r);
        }
        assert!(l.iter().all(|v| *v <= LIMIT + 1e-3));
    }
}
