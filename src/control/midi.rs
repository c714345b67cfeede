//! MIDI control-surface listener
//!
//! Attaches to the first MIDI input port whose name contains the
//! configured substring and forwards control-change messages into the
//! control queue. The midir callback runs on the driver's thread, so it
//! only parses bytes and pushes; everything else happens in the
//! orchestrator.

use midir::{MidiInput, MidiInputConnection};
use tokio::sync::mpsc::UnboundedSender;

use crate::control::ControlEvent;
use crate::error::ControlError;

const CLIENT_NAME: &str = "soundlight-control";

pub struct MidiListener {
    /// Keeps the driver callback alive; input stops when this drops.
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiListener {
    /// Connect to the first input port matching `port_match`
    /// (case-insensitive substring).
    pub fn connect(
        port_match: &str,
        tx: UnboundedSender<ControlEvent>,
    ) -> Result<Self, ControlError> {
        let midi_in =
            MidiInput::new(CLIENT_NAME).map_err(|e| ControlError::MidiInit(e.to_string()))?;

        let needle = port_match.to_lowercase();
        let ports = midi_in.ports();
        let found = ports.iter().enumerate().find_map(|(index, port)| {
            let name = midi_in.port_name(port).ok()?;
            name.to_lowercase()
                .contains(&needle)
                .then(|| (index, port.clone(), name))
        });

        let (port_index, port, port_name) =
            found.ok_or_else(|| ControlError::PortNotFound(port_match.to_string()))?;

        let callback_name = port_name.clone();
        let connection = midi_in
            .connect(
                &port,
                "soundlight-input",
                move |_timestamp, bytes, _| {
                    let Some(event) = parse_control_change(bytes, port_index as i32, &callback_name)
                    else {
                        return;
                    };
                    tracing::debug!(
                        controller = event.controller,
                        value = event.value,
                        "midi control change"
                    );
                    if tx.send(event).is_err() {
                        // Consumer is gone during shutdown; nothing to do.
                        tracing::warn!("midi control queue closed, dropping event");
                    }
                },
                (),
            )
            .map_err(|e| ControlError::MidiConnect(e.to_string()))?;

        tracing::info!(port = %port_name, "MIDI listener connected");

        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Parse a raw MIDI message; only control change (0xBn) produces an
/// event, everything else is ignored.
fn parse_control_change(bytes: &[u8], device_index: i32, device_name: &str) -> Option<ControlEvent> {
    if bytes.len() < 3 {
        return None;
    }
    let status = bytes[0];
    if status & 0xF0 != 0xB0 {
        return None;
    }
    Some(ControlEvent {
        device_index,
        device_name: device_name.to_string(),
        channel: (status & 0x0F) + 1,
        controller: bytes[1] & 0x7F,
        value: bytes[2] & 0x7F,
    })
}
