use keyfall_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent, PlayerEventCallback,
};
use keyfall_ports::types::{DeviceId, MidiInputDevice};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort as MidirPort};
use std::time::Instant;

const UNKNOWN_INPUT: &str = "Unknown Input";

/// Controller input through midir. Hosts without a MIDI backend report
/// `Unsupported` so the session can fall back to keyboard and pointer.
pub struct MidirInputPort {
    client_name: String,
}

impl MidirInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn client(&self) -> Result<MidiInput, MidiError> {
        MidiInput::new(&self.client_name).map_err(|e| MidiError::Unsupported(e.to_string()))
    }

    fn enumerate(midi_in: &MidiInput) -> Vec<(DeviceId, String, MidirPort)> {
        midi_in
            .ports()
            .into_iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_in
                    .port_name(&port)
                    .unwrap_or_else(|_| UNKNOWN_INPUT.to_string());
                (device_id(index, &name), name, port)
            })
            .collect()
    }
}

impl Default for MidirInputPort {
    fn default() -> Self {
        Self::new("Keyfall")
    }
}

fn device_id(index: usize, name: &str) -> DeviceId {
    DeviceId(format!("midir:{index}:{name}"))
}

pub struct MidirInputStream {
    connection: Option<MidiInputConnection<PlayerEventCallback>>,
}

impl MidiInputStream for MidirInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl MidiInputPort for MidirInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = self.client()?;
        let devices: Vec<MidiInputDevice> = Self::enumerate(&midi_in)
            .into_iter()
            .map(|(id, name, _)| MidiInputDevice {
                id,
                name,
                is_available: true,
            })
            .collect();
        log::debug!("found {} midi inputs", devices.len());
        Ok(devices)
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let mut midi_in = self.client()?;
        midi_in.ignore(Ignore::All);

        let (_, name, port) = Self::enumerate(&midi_in)
            .into_iter()
            .find(|(id, _, _)| id == device_id)
            .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                "keyfall-input",
                |_stamp, message, callback| {
                    if let Some(event) = MidiLikeEvent::from_bytes(message) {
                        callback(PlayerEvent {
                            at: Instant::now(),
                            event,
                        });
                    }
                },
                cb,
            )
            .map_err(|e| MidiError::Backend(e.to_string()))?;
        log::info!("midi input connected: {name}");

        Ok(Box::new(MidirInputStream {
            connection: Some(connection),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_carry_index_and_name() {
        assert_eq!(
            device_id(2, "Digital Piano"),
            DeviceId("midir:2:Digital Piano".to_string())
        );
    }
}
