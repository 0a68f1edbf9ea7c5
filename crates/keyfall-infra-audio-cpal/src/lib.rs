use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use keyfall_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use keyfall_ports::types::{AudioConfig, AudioOutputDevice, DeviceId};
use std::sync::mpsc;
use std::thread;

const UNKNOWN_OUTPUT: &str = "Unknown Output";
/// Scratch size used until the first callback reports its real block size.
const DEFAULT_BLOCK_FRAMES: usize = 4096;

/// Audio output through cpal. The stream lives on its own thread because
/// cpal streams are not `Send` on every platform.
pub struct CpalOutputPort {
    host: cpal::Host,
}

impl CpalOutputPort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn devices(host: &cpal::Host) -> Result<Vec<(DeviceId, String, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;
        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_else(|_| UNKNOWN_OUTPUT.to_string());
                let id = DeviceId(format!("cpal:{host_id}:{index}:{name}"));
                (id, name, device)
            })
            .collect())
    }
}

impl Default for CpalOutputPort {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CpalStreamHandle {
    stop_tx: mpsc::Sender<()>,
    worker: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("audio thread panicked while closing");
            }
        }
    }
}

impl AudioOutputPort for CpalOutputPort {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        let outputs = Self::devices(&self.host)?
            .into_iter()
            .filter_map(|(id, name, device)| {
                let default = device.default_output_config().ok()?;
                Some(AudioOutputDevice {
                    id,
                    name,
                    default_config: AudioConfig {
                        sample_rate_hz: default.sample_rate().0,
                        channels: default.channels(),
                        buffer_size_frames: None,
                    },
                })
            })
            .collect();
        Ok(outputs)
    }

    fn open_output(
        &self,
        device_id: &DeviceId,
        config: AudioConfig,
        cb: Box<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let device_id = device_id.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("keyfall-audio".to_string())
            .spawn(move || {
                let stream = match start_stream(&device_id, config, cb) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("audio stream {device_id} closed");
            })
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))??;
        Ok(Box::new(CpalStreamHandle {
            stop_tx,
            worker: Some(worker),
        }))
    }
}

fn start_stream(
    device_id: &DeviceId,
    desired: AudioConfig,
    cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let (_, name, device) = CpalOutputPort::devices(&host)?
        .into_iter()
        .find(|(id, _, _)| id == device_id)
        .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::Backend(e.to_string()))?;
    let chosen = choose_config(supported, desired)?;
    let sample_format = chosen.sample_format();
    let mut stream_config = chosen.config();
    stream_config.buffer_size = match desired.buffer_size_frames {
        Some(frames) => BufferSize::Fixed(frames),
        None => BufferSize::Default,
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, cb),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, cb),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, cb),
        other => {
            return Err(AudioError::UnsupportedConfig(format!(
                "sample format {other:?}"
            )))
        }
    }
    .map_err(|e| AudioError::Backend(e.to_string()))?;
    stream
        .play()
        .map_err(|e| AudioError::Backend(e.to_string()))?;

    log::info!(
        "audio stream on {name}: {} Hz, {} ch, {sample_format:?}",
        stream_config.sample_rate.0,
        stream_config.channels
    );
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut left = vec![0.0f32; DEFAULT_BLOCK_FRAMES];
    let mut right = vec![0.0f32; DEFAULT_BLOCK_FRAMES];
    let mut sample_time: u64 = 0;

    device.build_output_stream(
        config,
        move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels.max(1);
            if frames > left.len() {
                left.resize(frames, 0.0);
                right.resize(frames, 0.0);
            }
            cb.render(sample_time, &mut left[..frames], &mut right[..frames]);
            interleave(data, channels, &left[..frames], &right[..frames]);
            sample_time = sample_time.saturating_add(frames as u64);
        },
        |err| log::error!("audio stream error: {err}"),
        None,
    )
}

/// Best match for the requested channel count and rate, preferring float
/// formats.
fn choose_config(
    supported: impl Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Result<SupportedStreamConfig, AudioError> {
    supported
        .filter(|range| range.channels() == desired.channels)
        .filter(|range| {
            (range.min_sample_rate().0..=range.max_sample_rate().0)
                .contains(&desired.sample_rate_hz)
        })
        .filter_map(|range| format_rank(range.sample_format()).map(|rank| (rank, range)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, range)| range.with_sample_rate(SampleRate(desired.sample_rate_hz)))
        .ok_or_else(|| {
            AudioError::UnsupportedConfig(format!(
                "{} ch at {} Hz",
                desired.channels, desired.sample_rate_hz
            ))
        })
}

fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(3),
        SampleFormat::I16 => Some(2),
        SampleFormat::U16 => Some(1),
        _ => None,
    }
}

/// Writes the stereo mix into an interleaved buffer. Mono gets the average;
/// channels past the second are silent.
fn interleave<T>(data: &mut [T], channels: usize, left: &[f32], right: &[f32])
where
    T: SizedSample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, out) in data.chunks_exact_mut(channels).enumerate() {
        let l = left.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let r = right.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        if channels == 1 {
            out[0] = T::from_sample((l + r) * 0.5);
            continue;
        }
        out[0] = T::from_sample(l);
        out[1] = T::from_sample(r);
        for sample in &mut out[2..] {
            *sample = T::from_sample(0.0f32);
        }
    }
}
