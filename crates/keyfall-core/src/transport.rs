use keyfall_ports::types::Seconds;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source the transport follows. The audio clock implements
/// this once a stream is open; before that the wall clock stands in.
pub trait HostClock: Send + Sync {
    fn now_secs(&self) -> Seconds;
}

pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for WallClock {
    fn now_secs(&self) -> Seconds {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced by hand. Used by headless hosts and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn set(&self, secs: Seconds) {
        self.bits.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, secs: Seconds) {
        self.set(self.now_secs() + secs);
    }
}

impl HostClock for ManualClock {
    fn now_secs(&self) -> Seconds {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// Transport position in seconds, anchored to a host clock.
///
/// While playing, `position = anchor_pos + (host_now - anchor_host)`, never
/// less than the last reported position. `start` places the anchor slightly in
/// the future so the first frames hold still while the audio path warms up.
#[derive(Clone, Debug)]
pub struct Transport {
    state: TransportState,
    start_delay: Seconds,
    anchor_host: Seconds,
    anchor_pos: Seconds,
    position: Seconds,
}

impl Transport {
    pub fn new(start_delay: Seconds) -> Self {
        Self {
            state: TransportState::Stopped,
            start_delay: start_delay.max(0.0),
            anchor_host: 0.0,
            anchor_pos: 0.0,
            position: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn position(&self) -> Seconds {
        self.position
    }

    /// Starts (or resumes) playback from `from`, or from the current position.
    pub fn start(&mut self, from: Option<Seconds>, host_now: Seconds) {
        if let Some(from) = from {
            self.position = sanitize(from);
        }
        self.anchor_pos = self.position;
        self.anchor_host = host_now + self.start_delay;
        self.state = TransportState::Playing;
    }

    pub fn pause(&mut self, host_now: Seconds) {
        self.sync(host_now);
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.anchor_pos = 0.0;
    }

    /// Moves the position; may go backwards. Playback continues from there.
    pub fn seek(&mut self, position: Seconds, host_now: Seconds) {
        self.position = sanitize(position);
        self.anchor_pos = self.position;
        self.anchor_host = host_now;
    }

    /// Re-reads the host clock. Returns the updated position.
    pub fn sync(&mut self, host_now: Seconds) -> Seconds {
        if self.state == TransportState::Playing {
            let elapsed = (host_now - self.anchor_host).max(0.0);
            self.position = self.position.max(self.anchor_pos + elapsed);
        }
        self.position
    }

    /// Re-anchors onto a different host clock without moving the position.
    pub fn rebase(&mut self, host_now: Seconds) {
        let pending = (self.anchor_host - host_now).max(0.0);
        self.anchor_pos = self.position;
        self.anchor_host = host_now + pending.min(self.start_delay);
    }

    /// Host time at which the transport will reach `position`, assuming it
    /// keeps playing.
    pub fn host_time_of(&self, position: Seconds) -> Seconds {
        self.anchor_host + (position - self.anchor_pos)
    }
}

fn sanitize(position: Seconds) -> Seconds {
    if position.is_finite() {
        position.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_delay_holds_position() {
        let mut transport = Transport::new(0.1);
        transport.start(None, 10.0);
        assert_eq!(transport.sync(10.05), 0.0);
        let pos = transport.sync(10.6);
        assert!((pos - 0.5).abs() < 1e-9);
    }

    #[test]
    fn seek_backwards_then_monotonic() {
        let mut transport = Transport::new(0.0);
        transport.start(Some(5.0), 0.0);
        assert_eq!(transport.sync(1.0), 6.0);
        transport.seek(2.0, 1.0);
        assert_eq!(transport.position(), 2.0);
        assert_eq!(transport.sync(1.5), 2.5);
        // a host clock that stalls never moves the transport backwards
        assert_eq!(transport.sync(1.2), 2.5);
    }

    #[test]
    fn pause_freezes_position() {
        let mut transport = Transport::new(0.0);
        transport.start(None, 0.0);
        transport.pause(3.0);
        assert_eq!(transport.sync(10.0), 3.0);
        transport.start(None, 10.0);
        assert_eq!(transport.sync(11.0), 4.0);
    }

    #[test]
    fn rebase_keeps_position() {
        let mut transport = Transport::new(0.0);
        transport.start(None, 100.0);
        transport.sync(102.0);
        transport.rebase(0.5);
        assert_eq!(transport.sync(0.5), 2.0);
        assert_eq!(transport.sync(1.5), 3.0);
        assert_eq!(transport.host_time_of(4.0), 2.5);
    }

    #[test]
    fn non_finite_seek_clamps_to_zero() {
        let mut transport = Transport::new(0.0);
        transport.seek(f64::NAN, 0.0);
        assert_eq!(transport.position(), 0.0);
        transport.seek(-3.0, 0.0);
        assert_eq!(transport.position(), 0.0);
    }
}
