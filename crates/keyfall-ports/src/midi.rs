use crate::types::*;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiLikeEvent {
    NoteOn {
        note: u8,
        velocity: u8,
    },
    NoteOff {
        note: u8,
    },
    /// CC64: value 0..127. pedal_down = value >= 64
    Cc64 {
        value: u8,
    },
}

impl MidiLikeEvent {
    /// Decodes a channel-voice message. Note-on with velocity 0 is a note-off,
    /// which covers devices that use running status to release keys.
    pub fn from_bytes(message: &[u8]) -> Option<Self> {
        if message.len() < 3 {
            return None;
        }
        let (status, data1, data2) = (message[0] & 0xF0, message[1] & 0x7F, message[2] & 0x7F);
        match status {
            0x80 => Some(Self::NoteOff { note: data1 }),
            0x90 if data2 == 0 => Some(Self::NoteOff { note: data1 }),
            0x90 => Some(Self::NoteOn {
                note: data1,
                velocity: data2,
            }),
            0xB0 if data1 == 64 => Some(Self::Cc64 { value: data2 }),
            _ => None,
        }
    }

    pub fn note(&self) -> Option<u8> {
        match self {
            Self::NoteOn { note, .. } | Self::NoteOff { note } => Some(*note),
            Self::Cc64 { .. } => None,
        }
    }
}

/// Raw input from a MIDI device, stamped on arrival.
#[derive(Clone, Copy, Debug)]
pub struct PlayerEvent {
    pub at: Instant,
    pub event: MidiLikeEvent,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("midi input unsupported on this host: {0}")]
    Unsupported(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// MIDI input stream handle.
pub trait MidiInputStream: Send {
    fn close(self: Box<Self>);
}

pub type PlayerEventCallback = Arc<dyn Fn(PlayerEvent) + Send + Sync + 'static>;

pub trait MidiInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError>;

    /// Implementations invoke `cb` from their own background thread.
    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError>;
}
