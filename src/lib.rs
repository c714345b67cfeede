//! # Soundlight
//!
//! Real-time audio-reactive DMX lighting control over Art-Net.
//!
//! ## Architecture Overview
//!
//! ```text
//!  OS mixer (loopback)          MIDI surface        UDP text protocol
//!        │                           │                      │
//!        ▼ capture thread            ▼ driver callback      ▼ tokio task
//!  ┌───────────────┐         ┌───────────────┐     ┌───────────────┐
//!  │  SampleQueue  │         │ control queue │     │ control queue │
//!  │ (drop-oldest) │         │  (unbounded)  │     │  (unbounded)  │
//!  └───────┬───────┘         └───────┬───────┘     └───────┬───────┘
//!          │ read_samples(N)         └──────────┬──────────┘
//!          ▼                                    │ drained per tick
//!  ┌──────────────────┐                         ▼
//!  │ SpectrumAnalyzer │──► bass/low/mid/treble ─► Engine ─► Effect
//!  └──────────────────┘                                       │
//!                                                             ▼
//!                                     FixtureBank (dirty-channel cache)
//!                                                             │
//!                                                             ▼
//!                                     ArtnetTransmitter ─► UDP :6454
//! ```
//!
//! The engine is the single consumer of all three queues and the only
//! writer of lighting state, which is what lets the fixture bank and
//! transmitter stay lock-free.

pub mod analysis;
pub mod artnet;
pub mod audio;
pub mod config;
pub mod control;
pub mod dmx;
pub mod effects;
pub mod engine;
pub mod error;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// FFT block size in samples (power of two)
    pub const FFT_BLOCK_SIZE: usize = 2048;

    /// Standard Art-Net UDP port
    pub const ARTNET_PORT: u16 = 6454;

    /// DMX channels per universe
    pub const DMX_CHANNELS: usize = 512;

    /// Default capacity of the drop-oldest sample queue
    pub const SAMPLE_QUEUE_CAPACITY: usize = 8192;

    /// Default UDP port for the text control protocol
    pub const DEFAULT_CONTROL_PORT: u16 = 7778;

    /// Port the `pre:<index>` status beacon targets on loopback
    pub const STATUS_BEACON_PORT: u16 = 7779;
}
