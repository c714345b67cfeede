//! Control ingestion
//!
//! Two independent producers feed the orchestrator: a MIDI control
//! surface and a UDP text listener. Both normalize their wire formats
//! into [`ControlEvent`] and push into unbounded single-writer queues
//! that the orchestrator drains non-blockingly once per tick.

pub mod beacon;
pub mod midi;
pub mod udp;

pub use beacon::StatusBeacon;
pub use midi::MidiListener;
pub use udp::ControlListener;

/// A control-change message, regardless of physical transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    /// Index of the originating device, -1 for network sources.
    pub device_index: i32,
    /// Human-readable source name.
    pub device_name: String,
    /// MIDI-style channel, 1..=16.
    pub channel: u8,
    /// Controller number, 0..=127.
    pub controller: u8,
    /// Controller value, 0..=127.
    pub value: u8,
}
