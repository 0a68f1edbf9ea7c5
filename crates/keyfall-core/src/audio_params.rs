use keyfall_ports::settings::EngineSettings;
use keyfall_ports::types::{Bus, Volume01};
use std::sync::atomic::{AtomicU32, Ordering};

/// Mix levels shared between the session thread and the audio callback.
///
/// Each bus also carries an epoch. Flushing a bus bumps it, and the audio
/// thread drops queued events stamped with an older one.
#[derive(Debug)]
pub struct AudioParams {
    master: AtomicU32,
    buses: [AtomicU32; 3],
    epochs: [AtomicU32; 3],
}

impl AudioParams {
    pub fn new(settings: &EngineSettings) -> Self {
        let level = |bus| AtomicU32::new(settings.bus_volume(bus).get().to_bits());
        Self {
            master: AtomicU32::new(settings.master_volume.get().to_bits()),
            buses: [level(Bus::Live), level(Bus::Playback), level(Bus::Fx)],
            epochs: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
        }
    }

    pub fn set_master(&self, volume: Volume01) {
        self.master.store(volume.get().to_bits(), Ordering::Relaxed);
    }

    pub fn set_bus(&self, bus: Bus, volume: Volume01) {
        self.buses[bus.index()].store(volume.get().to_bits(), Ordering::Relaxed);
    }

    pub fn master(&self) -> f32 {
        f32::from_bits(self.master.load(Ordering::Relaxed))
    }

    pub fn bus(&self, bus: Bus) -> f32 {
        f32::from_bits(self.buses[bus.index()].load(Ordering::Relaxed))
    }

    pub fn epoch(&self, bus: Bus) -> u32 {
        self.epochs[bus.index()].load(Ordering::Acquire)
    }

    /// Invalidates everything queued on `bus` so far; returns the new epoch.
    pub fn bump_epoch(&self, bus: Bus) -> u32 {
        self.epochs[bus.index()]
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }
}
