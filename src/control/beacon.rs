//! Fire-and-forget status broadcast
//!
//! Tiny UDP text sender used to tell external observers (the control
//! surface UI) which preset is active. Losing one of these packets is
//! harmless, so every send error is ignored.

use std::net::{SocketAddr, UdpSocket};

use crate::error::NetError;

pub struct StatusBeacon {
    socket: UdpSocket,
    target: SocketAddr,
}

impl StatusBeacon {
    /// Bind an ephemeral local port for the given destination.
    pub fn new(target: SocketAddr) -> Result<Self, NetError> {
        let socket =
            UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| NetError::Bind(e.to_string()))?;
        Ok(Self { socket, target })
    }

    /// Send one UTF-8 datagram, ignoring any error.
    pub fn send(&self, text: &str) {
        let _ = self.socket.send_to(text.as_bytes(), self.target);
    }

    /// Announce the active preset index as `pre:<index>`.
    pub fn announce_preset(&self, index: usize) {
        self.send(&format!("pre:{index}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_announce_format() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let beacon = StatusBeacon::new(receiver.local_addr().unwrap()).unwrap();
        beacon.announce_preset(4);

        let mut buf = [0u8; 64];
        let len = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"pre:4");
    }

    #[test]
    fn test_send_to_dead_target_is_silent() {
        // No receiver bound; the send must not error or panic.
        let beacon = StatusBeacon::new("127.0.0.1:1".parse().unwrap()).unwrap();
        beacon.send("pre:0");
    }
}
