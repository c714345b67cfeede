//! UDP text-protocol control listener
//!
//! Accepts UTF-8 datagrams carrying a control change in any of three
//! grammars:
//!
//!   1) `cc <channel> <controller> <value>`   e.g. "cc 1 74 127"
//!   2) `<channel>,<controller>,<value>`      e.g. "1,74,127"
//!   3) `<channel> <controller> <value>`      e.g. "1 74 127"
//!
//! Malformed datagrams are silently dropped; valid triples are clamped
//! into MIDI ranges and pushed to the control queue. No response is ever
//! sent. Shutting the listener down aborts the receive task, which
//! closes the socket and ends the loop.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::control::ControlEvent;
use crate::error::ControlError;

const UDP_SOURCE_NAME: &str = "udp";

pub struct ControlListener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ControlListener {
    /// Bind on `0.0.0.0:port` and start the receive loop. Port 0 picks
    /// an ephemeral port (useful for tests).
    pub async fn bind(port: u16, tx: UnboundedSender<ControlEvent>) -> Result<Self, ControlError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|e| ControlError::Bind(e.to_string()))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| ControlError::Bind(e.to_string()))?;

        tracing::info!(%local_addr, "UDP control listener bound");
        let task = tokio::spawn(receive_loop(socket, tx));

        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the receive loop and drop the socket.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn receive_loop(socket: UdpSocket, tx: UnboundedSender<ControlEvent>) {
    let mut buf = [0u8; 512];
    loop {
        let len = match socket.recv_from(&mut buf).await {
            Ok((len, _peer)) => len,
            Err(e) => {
                // Receive errors here mean the socket itself is gone.
                tracing::warn!("control socket receive failed: {}", e);
                break;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };
        let Some((channel, controller, value)) = parse_control_text(text) else {
            continue;
        };

        let event = ControlEvent {
            device_index: -1,
            device_name: UDP_SOURCE_NAME.to_string(),
            channel: channel.clamp(1, 16) as u8,
            controller: controller.clamp(0, 127) as u8,
            value: value.clamp(0, 127) as u8,
        };
        if tx.send(event).is_err() {
            break;
        }
    }
}

/// Parse one datagram into an unclamped (channel, controller, value)
/// triple, or `None` for anything malformed. Extra fields are ignored.
pub fn parse_control_text(text: &str) -> Option<(i32, i32, i32)> {
    let mut rest = text.trim();
    if rest
        .get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("cc"))
    {
        rest = rest[2..].trim_start();
    }

    let mut fields = rest
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|f| !f.is_empty());

    let channel = fields.next()?.parse().ok()?;
    let controller = fields.next()?.parse().ok()?;
    let value = fields.next()?.parse().ok()?;
    Some((channel, controller, value))
}
