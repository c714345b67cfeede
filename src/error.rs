//! Error types for the lighting bridge

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio capture errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Sample queue is closed")]
    QueueClosed,
}

/// Art-Net / UDP transmit errors
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Socket bind failed: {0}")]
    Bind(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("DMX channel out of range: {0} (expected 1..=512)")]
    ChannelOutOfRange(u16),
}

/// Control ingestion errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("No MIDI input port matching '{0}'")]
    PortNotFound(String),

    #[error("MIDI initialization failed: {0}")]
    MidiInit(String),

    #[error("MIDI connection failed: {0}")]
    MidiConnect(String),

    #[error("Control socket bind failed: {0}")]
    Bind(String),
}

/// Spectral analysis errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("FFT block size must be a power of two, got {0}")]
    BlockSizeNotPowerOfTwo(usize),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
