//! Soundlight bridge binary
//!
//! Wires capture, analysis, control ingestion and the engine together.
//! Setup failures abort with a diagnostic; once running, transient
//! failures are logged and the lighting output keeps refreshing.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundlight::{
    analysis::SpectrumAnalyzer,
    artnet::ArtnetTransmitter,
    audio::{LoopbackCapture, SampleQueue},
    config::AppConfig,
    control::{ControlListener, MidiListener, StatusBeacon},
    dmx::FixtureBank,
    effects::EffectRegistry,
    engine::Engine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Soundlight");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(Path::new(&path))
            .with_context(|| format!("loading config from {path}"))?,
        None => AppConfig::default(),
    };

    // Lighting output
    let transmitter =
        ArtnetTransmitter::new(&config.artnet).context("creating Art-Net transmitter")?;
    tracing::info!(
        target = %transmitter.target(),
        universe = config.artnet.universe,
        "Art-Net transmitter ready"
    );
    let rig = FixtureBank::new(transmitter);

    // Audio pipeline
    let queue = SampleQueue::new(config.audio.queue_capacity);
    let mut capture =
        LoopbackCapture::start(&config.audio, queue.clone()).context("starting audio capture")?;
    let analyzer = SpectrumAnalyzer::new(config.audio.block_size, capture.sample_rate())
        .context("creating spectrum analyzer")?;

    // Control ingestion
    let (midi_tx, midi_rx) = tokio::sync::mpsc::unbounded_channel();
    let (net_tx, net_rx) = tokio::sync::mpsc::unbounded_channel();

    let midi = MidiListener::connect(&config.control.midi_port_match, midi_tx)
        .context("connecting MIDI control surface")?;
    tracing::info!(port = midi.port_name(), "control surface attached");

    let udp_listener = ControlListener::bind(config.control.udp_port, net_tx)
        .await
        .context("binding UDP control listener")?;

    let beacon =
        StatusBeacon::new(config.control.status_addr).context("creating status beacon")?;

    let mut engine = Engine::new(
        rig,
        analyzer,
        EffectRegistry::with_builtin(),
        midi_rx,
        net_rx,
        beacon,
    );

    // Ctrl+C sets the shutdown flag and closes the sample queue, which
    // unblocks the engine's pending read promptly.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        let queue = queue.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.store(true, Ordering::SeqCst);
                queue.close();
            }
        });
    }

    tracing::info!("Listening for control + audio... press Ctrl+C to quit");
    let result = engine.run(queue, shutdown).await;

    // Teardown: stop the hardware stream, end the UDP receive loop.
    capture.stop();
    udp_listener.shutdown();

    if let Some(e) = capture.check_errors() {
        tracing::warn!("capture reported: {}", e);
    }

    result.context("engine loop failed")?;
    tracing::info!("Soundlight stopped");
    Ok(())
}
