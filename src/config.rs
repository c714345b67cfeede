//! Application configuration
//!
//! Plain TOML, loaded once at startup and never written back. Every
//! section has usable defaults so an empty file (or no file at all)
//! yields a working broadcast setup.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;

use crate::constants;
use crate::error::Error;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub artnet: ArtnetConfig,
    pub audio: AudioConfig,
    pub control: ControlConfig,
}

/// Art-Net output endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtnetConfig {
    /// Unicast node address or a broadcast address.
    pub target: IpAddr,
    /// Art-Net port; only worth changing for test setups.
    pub port: u16,
    pub universe: u16,
    pub broadcast: bool,
}

impl Default for ArtnetConfig {
    fn default() -> Self {
        Self {
            target: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: constants::ARTNET_PORT,
            universe: 0,
            broadcast: true,
        }
    }
}

/// Loopback capture settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Substring match against render device names; `None` uses the
    /// default output device.
    pub device_name: Option<String>,
    /// Sample queue capacity. Smaller favors freshness, larger rides
    /// out scheduling hiccups.
    pub queue_capacity: usize,
    /// FFT block size; must be a power of two.
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            queue_capacity: constants::SAMPLE_QUEUE_CAPACITY,
            block_size: constants::FFT_BLOCK_SIZE,
        }
    }
}

/// Control-surface ingestion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Substring match against MIDI input port names.
    pub midi_port_match: String,
    /// UDP port for the text control protocol.
    pub udp_port: u16,
    /// Destination for `pre:<index>` status datagrams.
    pub status_addr: SocketAddr,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            midi_port_match: "soundlight".to_string(),
            udp_port: constants::DEFAULT_CONTROL_PORT,
            status_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                constants::STATUS_BEACON_PORT,
            )),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file. Unknown keys are ignored; missing keys
    /// fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_broadcast() {
        let config = AppConfig::default();
        assert_eq!(config.artnet.port, 6454);
        assert!(config.artnet.broadcast);
        assert!(config.audio.block_size.is_power_of_two());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: AppConfig = toml::from_str(
            r#"
            [artnet]
            target = "192.168.1.40"
            broadcast = false

            [control]
            udp_port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.artnet.target.to_string(), "192.168.1.40");
        assert!(!config.artnet.broadcast);
        assert_eq!(config.artnet.universe, 0);
        assert_eq!(config.control.udp_port, 9000);
        assert_eq!(config.audio.block_size, constants::FFT_BLOCK_SIZE);
    }
}
