//! Art-Net DMX transmitter
//!
//! Builds fixed-size ArtDMX packets (18-byte header + 512 channel bytes)
//! and sends them over UDP. One packet buffer is reused for the lifetime
//! of the transmitter; only the sequence byte and the channel payload
//! change between submits.

use std::net::{SocketAddr, UdpSocket};

use crate::config::ArtnetConfig;
use crate::error::NetError;

/// Standard Art-Net port
pub const ARTNET_PORT: u16 = 6454;

/// Number of DMX channels per universe
pub const DMX_CHANNELS: usize = 512;

const HEADER_LEN: usize = 18;
const PACKET_LEN: usize = HEADER_LEN + DMX_CHANNELS;
const SEQUENCE_OFFSET: usize = 12;

/// Clamp an arbitrary integer into a DMX byte.
pub(crate) fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// ArtDMX packet transmitter for a single universe.
pub struct ArtnetTransmitter {
    socket: UdpSocket,
    target: SocketAddr,
    frame: [u8; DMX_CHANNELS],
    packet: [u8; PACKET_LEN],
    sequence: u8,
}

impl ArtnetTransmitter {
    /// Create a transmitter for the configured target.
    ///
    /// Binds an ephemeral local socket and builds the protocol header
    /// once. Broadcast capability is enabled per configuration.
    pub fn new(config: &ArtnetConfig) -> Result<Self, NetError> {
        let socket =
            UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| NetError::Bind(e.to_string()))?;
        if config.broadcast {
            socket
                .set_broadcast(true)
                .map_err(|e| NetError::Bind(e.to_string()))?;
        }

        let mut packet = [0u8; PACKET_LEN];
        build_header(&mut packet, config.universe);

        Ok(Self {
            socket,
            target: SocketAddr::new(config.target, config.port),
            frame: [0u8; DMX_CHANNELS],
            packet,
            sequence: 0,
        })
    }

    /// Write a clamped value into the pending frame.
    ///
    /// `channel` is 1-based (1..=512).
    pub fn set_channel(&mut self, channel: u16, value: i32) -> Result<(), NetError> {
        if !(1..=DMX_CHANNELS as u16).contains(&channel) {
            return Err(NetError::ChannelOutOfRange(channel));
        }
        self.frame[channel as usize - 1] = clamp_u8(value);
        Ok(())
    }

    /// Send the pending frame as one ArtDMX packet.
    ///
    /// The sequence byte increments on every submit and skips zero on
    /// wrap, so receivers can distinguish "first packet" from a wrapped
    /// counter. Send failures are returned, never retried; Art-Net is
    /// refresh-based and a dropped packet heals on the next tick.
    pub fn submit(&mut self) -> Result<(), NetError> {
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }
        self.packet[SEQUENCE_OFFSET] = self.sequence;
        self.packet[HEADER_LEN..].copy_from_slice(&self.frame);

        self.socket
            .send_to(&self.packet, self.target)
            .map_err(|e| NetError::Send(e.to_string()))?;
        Ok(())
    }

    /// Fill the whole frame with one clamped value without transmitting.
    pub fn clear(&mut self, value: i32) {
        self.frame.fill(clamp_u8(value));
    }

    /// Last emitted sequence number (0 until the first submit).
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Destination endpoint.
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

fn build_header(packet: &mut [u8; PACKET_LEN], universe: u16) {
    // "Art-Net\0"
    packet[..8].copy_from_slice(b"Art-Net\0");

    // OpCode ArtDMX = 0x5000, little-endian
    packet[8] = 0x00;
    packet[9] = 0x50;

    // Protocol version 14, big-endian
    packet[10] = 0x00;
    packet[11] = 0x0E;

    // Sequence (set per submit) and physical port
    packet[12] = 0x00;
    packet[13] = 0x00;

    // Universe, little-endian
    packet[14] = (universe & 0xFF) as u8;
    packet[15] = (universe >> 8) as u8;

    // Payload length 512, big-endian
    packet[16] = 0x02;
    packet[17] = 0x00;
}
