//! Orchestration loop
//!
//! Single consumer of all three producer queues (audio samples, MIDI
//! control events, UDP control events) and sole mutator of the fixture
//! bank and session state. Each tick drains both control queues without
//! blocking, then suspends until a full audio block is available, so
//! control latency is bounded by the audio block period and none of
//! the downstream components need locks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::analysis::SpectrumAnalyzer;
use crate::audio::SampleQueue;
use crate::control::{ControlEvent, StatusBeacon};
use crate::dmx::FixtureBank;
use crate::effects::{EffectInput, EffectRegistry};
use crate::error::{AudioError, NetError};

/// Controller numbers understood by the event handler.
pub mod controllers {
    /// Quantized strobe-mode selector.
    pub const STROBE: u8 = 14;
    /// Full blackout override, independent of the active effect.
    pub const BLACKOUT: u8 = 3;
    /// Effect selection; the value is the registry index.
    pub const PRESET: u8 = 9;
}

pub struct Engine {
    rig: FixtureBank,
    analyzer: SpectrumAnalyzer,
    registry: EffectRegistry,
    midi_rx: UnboundedReceiver<ControlEvent>,
    net_rx: UnboundedReceiver<ControlEvent>,
    beacon: StatusBeacon,
    /// Selected effect index. Atomic rather than a plain field: dispatch
    /// may later move off the ingestion thread, and the exchange keeps
    /// that extension safe without an API change.
    preset_index: Arc<AtomicUsize>,
    strobe_active: bool,
}

impl Engine {
    pub fn new(
        rig: FixtureBank,
        analyzer: SpectrumAnalyzer,
        registry: EffectRegistry,
        midi_rx: UnboundedReceiver<ControlEvent>,
        net_rx: UnboundedReceiver<ControlEvent>,
        beacon: StatusBeacon,
    ) -> Self {
        Self {
            rig,
            analyzer,
            registry,
            midi_rx,
            net_rx,
            beacon,
            preset_index: Arc::new(AtomicUsize::new(0)),
            strobe_active: false,
        }
    }

    /// Shared handle to the selected-effect index.
    pub fn preset_index_handle(&self) -> Arc<AtomicUsize> {
        self.preset_index.clone()
    }

    pub fn fixtures(&self) -> &FixtureBank {
        &self.rig
    }

    /// Run until `shutdown` is set or the sample queue closes.
    ///
    /// The queue read is the loop's only suspension point; closing the
    /// queue is the prompt way to unblock it, and is treated as clean
    /// termination rather than an error.
    pub async fn run(
        &mut self,
        queue: Arc<SampleQueue>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(), AudioError> {
        let block_size = self.analyzer.block_size();
        tracing::info!(
            block_size,
            effects = self.registry.len(),
            "engine running"
        );

        while !shutdown.load(Ordering::Relaxed) {
            self.drain_control_queues();

            let samples = match queue.read_samples(block_size).await {
                Ok(samples) => samples,
                Err(AudioError::QueueClosed) => {
                    tracing::info!("sample queue closed, stopping engine");
                    break;
                }
                Err(e) => return Err(e),
            };

            let bands = self.analyzer.analyze(&samples);
            let index = self.preset_index.load(Ordering::Acquire);
            let input = EffectInput::new(bands, self.strobe_active);

            if let Err(e) = self.registry.process(index, &input, &mut self.rig) {
                // Refresh-based output: a failed frame heals next tick.
                tracing::warn!(effect = index, "effect write failed: {}", e);
            }
        }

        Ok(())
    }

    /// Drain both control queues completely without blocking.
    fn drain_control_queues(&mut self) {
        while let Ok(event) = self.midi_rx.try_recv() {
            self.handle_event(&event);
        }
        while let Ok(event) = self.net_rx.try_recv() {
            self.handle_event(&event);
        }
    }

    /// Apply one control event. Any failure is logged and swallowed so
    /// a bad event can never take down the loop.
    pub(crate) fn handle_event(&mut self, event: &ControlEvent) {
        tracing::debug!(
            source = %event.device_name,
            controller = event.controller,
            value = event.value,
            "control event"
        );

        let result = match event.controller {
            controllers::STROBE => {
                self.strobe_active = matches!(event.value, 16 | 32 | 48 | 64);
                self.rig.handle_strobe(event.value)
            }
            controllers::BLACKOUT => self.rig.cut_light(event.value > 64),
            controllers::PRESET => self.select_preset(event.value as usize),
            _ => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!(
                controller = event.controller,
                value = event.value,
                "control event failed: {}",
                e
            );
        }
    }

    /// Switch the active effect: publish the index, drop the rig to a
    /// neutral baseline, and tell observers.
    fn select_preset(&mut self, index: usize) -> Result<(), NetError> {
        tracing::info!(
            index,
            name = self.registry.name(index).unwrap_or("<none>"),
            "preset selected"
        );
        self.preset_index.store(index, Ordering::Release);
        self.rig.reset_baseline()?;
        self.beacon.announce_preset(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artnet::ArtnetTransmitter;
    use crate::config::ArtnetConfig;
    use crate::dmx::channels;
    use std::net::{IpAddr, UdpSocket};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

    const BLOCK: usize = 256;

    struct Harness {
        engine: Engine,
        midi_tx: UnboundedSender<ControlEvent>,
        _net_tx: UnboundedSender<ControlEvent>,
        _sinks: (UdpSocket, UdpSocket),
    }

    fn harness() -> Harness {
        let artnet_sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        let beacon_sink = UdpSocket::bind("127.0.0.1:0").unwrap();

        let config = ArtnetConfig {
            target: IpAddr::from([127, 0, 0, 1]),
            port: artnet_sink.local_addr().unwrap().port(),
            universe: 0,
            broadcast: false,
        };
        let rig = FixtureBank::new(ArtnetTransmitter::new(&config).unwrap());
        let analyzer = SpectrumAnalyzer::new(BLOCK, 48_000).unwrap();
        let beacon = StatusBeacon::new(beacon_sink.local_addr().unwrap()).unwrap();

        let (midi_tx, midi_rx) = unbounded_channel();
        let (net_tx, net_rx) = unbounded_channel();

        Harness {
            engine: Engine::new(
                rig,
                analyzer,
                EffectRegistry::with_builtin(),
                midi_rx,
                net_rx,
                beacon,
            ),
            midi_tx,
            _net_tx: net_tx,
            _sinks: (artnet_sink, beacon_sink),
        }
    }

    fn cc(controller: u8, value: u8) -> ControlEvent {
        ControlEvent {
            device_index: 0,
            device_name: "test".into(),
            channel: 1,
            controller,
            value,
        }
    }

    #[test]
    fn test_strobe_event_sets_flag_and_channels() {
        let mut h = harness();
        h.engine.handle_event(&cc(controllers::STROBE, 32));
        assert!(h.engine.strobe_active);
        assert_eq!(h.engine.fixtures().cached(channels::STROBE_CTRL), Some(160));

        h.engine.handle_event(&cc(controllers::STROBE, 0));
        assert!(!h.engine.strobe_active);
        assert_eq!(h.engine.fixtures().cached(channels::STROBE_CTRL), Some(0));
    }

    #[test]
    fn test_blackout_toggle() {
        let mut h = harness();
        h.engine.handle_event(&cc(controllers::BLACKOUT, 127));
        assert_eq!(h.engine.fixtures().cached(channels::MASTER), Some(132));
        h.engine.handle_event(&cc(controllers::BLACKOUT, 0));
        assert_eq!(h.engine.fixtures().cached(channels::MASTER), Some(0));
    }

    #[test]
    fn test_preset_select_publishes_index_and_beacon() {
        let mut h = harness();
        let index = h.engine.preset_index_handle();

        h.engine.handle_event(&cc(controllers::PRESET, 2));
        assert_eq!(index.load(Ordering::Acquire), 2);
        // Baseline reset wrote the tracked channels.
        assert_eq!(h.engine.fixtures().cached(channels::MASTER), Some(0));

        let mut buf = [0u8; 32];
        h._sinks
            .1
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let len = h._sinks.1.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"pre:2");
    }

    #[test]
    fn test_unknown_controller_ignored() {
        let mut h = harness();
        h.engine.handle_event(&cc(42, 64));
        assert_eq!(h.engine.fixtures().transmitter().sequence(), 0);
    }

    #[tokio::test]
    async fn test_noop_preset_produces_no_packets() {
        let mut h = harness();
        let queue = SampleQueue::new(BLOCK * 4);
        let shutdown = Arc::new(AtomicBool::new(false));

        // Select the no-op effect, then feed two audio blocks and close.
        h.midi_tx.send(cc(controllers::PRESET, 0)).unwrap();
        queue.push_slice(&vec![0.25f32; BLOCK * 2]);
        queue.close();

        h.engine.run(queue, shutdown).await.unwrap();

        // Exactly one packet: the baseline reset from the preset change.
        // The audio ticks under the no-op effect sent nothing.
        assert_eq!(h.engine.fixtures().transmitter().sequence(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_flag_stops_loop_before_reading() {
        let mut h = harness();
        let queue = SampleQueue::new(BLOCK);
        let shutdown = Arc::new(AtomicBool::new(true));
        // Flag already set: run must return without consuming anything.
        h.engine.run(queue.clone(), shutdown).await.unwrap();
        assert!(!queue.is_closed());
    }

    #[tokio::test]
    async fn test_active_preset_reacts_to_audio() {
        let mut h = harness();
        let queue = SampleQueue::new(BLOCK * 8);
        let shutdown = Arc::new(AtomicBool::new(false));

        // Select the pulse effect, then feed loud low-frequency blocks.
        h.midi_tx.send(cc(controllers::PRESET, 1)).unwrap();
        let block: Vec<f32> = (0..BLOCK * 4)
            .map(|i| (2.0 * std::f32::consts::PI * 3.0 * i as f32 / BLOCK as f32).sin())
            .collect();
        queue.push_slice(&block);
        queue.close();

        h.engine.run(queue, shutdown).await.unwrap();

        // Baseline reset + at least one effect-driven frame.
        assert!(h.engine.fixtures().transmitter().sequence() > 1);
    }
}
