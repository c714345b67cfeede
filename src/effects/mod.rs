//! Effect strategies
//!
//! An effect maps one tick of band energies onto fixture writes. All
//! output goes through the fixture bank so the dirty-channel cache keeps
//! batching and dedup intact; effects never touch the transmitter
//! directly and never block. The registry is an ordered, append-only
//! table built once at startup and selected by index.

use std::time::Instant;

use crate::analysis::Bands;
use crate::dmx::FixtureBank;
use crate::error::NetError;

/// Per-tick input for an effect.
#[derive(Debug, Clone, Copy)]
pub struct EffectInput {
    pub bass: f32,
    pub low: f32,
    pub mid: f32,
    pub treble: f32,
    /// Set while the operator drives the strobe manually; effects must
    /// leave the strobe head alone when this is on.
    pub strobe_active: bool,
}

impl EffectInput {
    pub fn new(bands: Bands, strobe_active: bool) -> Self {
        Self {
            bass: bands.bass,
            low: bands.low,
            mid: bands.mid,
            treble: bands.treble,
            strobe_active,
        }
    }
}

/// Scale a [0,1]-ish band value onto a DMX slider.
fn to_slider(value: f32) -> i32 {
    (value * 255.0).clamp(0.0, 255.0) as i32
}

pub trait Effect: Send {
    fn name(&self) -> &'static str;

    /// Apply one tick. Must not block; writes go through `rig` only.
    fn process(&mut self, input: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError>;
}

/// Ordered table of effects, selected by index.
pub struct EffectRegistry {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectRegistry {
    pub fn new(effects: Vec<Box<dyn Effect>>) -> Self {
        Self { effects }
    }

    /// The built-in catalog. Index 0 is always the no-op effect so a
    /// controller can park the rig.
    pub fn with_builtin() -> Self {
        Self::new(vec![
            Box::new(Idle),
            Box::new(PulseLasers),
            Box::new(BlueWash),
            Box::new(DimHaze),
            Box::new(RedGreenPunch),
            Box::new(DarkAmbience),
            Box::new(PhaseRotate::new()),
            Box::new(BeatCycle::new()),
            Box::new(NeonVortex::new()),
            Box::new(TerminalGlow),
        ])
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.effects.get(index).map(|e| e.name())
    }

    /// Dispatch one tick to the effect at `index`. Out-of-range indices
    /// are a no-op, so a control surface can send any value safely.
    pub fn process(
        &mut self,
        index: usize,
        input: &EffectInput,
        rig: &mut FixtureBank,
    ) -> Result<(), NetError> {
        match self.effects.get_mut(index) {
            Some(effect) => effect.process(input, rig),
            None => Ok(()),
        }
    }
}

// -----------------------
// Built-in effects
// -----------------------

/// Does nothing; selecting it freezes the rig at its current look.
struct Idle;

impl Effect for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn process(&mut self, _input: &EffectInput, _rig: &mut FixtureBank) -> Result<(), NetError> {
        Ok(())
    }
}

/// Hard-threshold lasers with treble-driven motor and reactive strobe
/// colors.
struct PulseLasers;

impl Effect for PulseLasers {
    fn name(&self) -> &'static str {
        "pulse-lasers"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        rig.set_laser_red1(p.bass > 0.75, 255)?;
        rig.set_laser_red2(p.bass > 0.88, 255)?;
        rig.set_motor_speed(to_slider(p.treble * p.treble))?;
        rig.set_laser_blue(p.mid > 0.85, 255)?;
        if !p.strobe_active {
            rig.strobe_on()?;
            rig.set_strobe_colors(
                Some(if p.mid > 0.75 { 255 } else { 0 }),
                Some(0),
                Some(if p.treble > 0.77 { 255 } else { 0 }),
                Some(if p.low > 0.8 { 255 } else { 0 }),
            )?;
        }
        Ok(())
    }
}

/// Blue and white washes with occasional green laser sparkle.
struct BlueWash;

impl Effect for BlueWash {
    fn name(&self) -> &'static str {
        "blue-wash"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        let green_spark = p.low > 0.92 && p.mid > 0.70;
        rig.set_lasers(Some(green_spark), Some(false), Some(false), Some(true), 255)?;

        // Slow motor, slightly faster with bass but staying slow.
        let motor = 0.10 + 0.40 * p.bass;
        rig.set_motor_speed(to_slider(motor))?;

        let blue = ((p.mid * p.mid - 0.15) * 1.3).clamp(0.0, 1.0);
        let white = ((p.treble * p.treble - 0.25) * 1.5).clamp(0.0, 1.0);
        rig.set_checkered(Some(0), Some(0), Some(to_slider(blue)), Some(to_slider(white)))?;

        let soft_blue = ((p.low * p.low - 0.30) * 1.2).clamp(0.0, 1.0);
        rig.set_soft(Some(0), Some(0), Some(to_slider(soft_blue)))?;

        if !p.strobe_active {
            if p.bass > 0.82 {
                // Steady mode needs speed >= 30; follow the bass a bit.
                let speed = 30 + (p.bass * 200.0) as i32;
                rig.strobe_steady_speed(speed)?;
                let b = if p.treble > 0.60 { 255 } else { 180 };
                let u = if p.bass > 0.90 { 255 } else { 140 };
                rig.set_strobe_colors(Some(0), Some(0), Some(b), Some(u))?;
            } else {
                rig.strobe_off()?;
                rig.set_strobe_colors(Some(0), Some(0), Some(0), Some(0))?;
            }
        }
        Ok(())
    }
}

/// Dim red/blue haze: blue laser held on, low soft fills, UV sparkle on
/// high treble.
struct DimHaze;

impl Effect for DimHaze {
    fn name(&self) -> &'static str {
        "dim-haze"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        rig.set_lasers(Some(false), Some(false), Some(false), Some(true), 255)?;

        // Very slow motor, bass adds a little drift.
        let motor = 0.05 + 0.15 * p.bass;
        rig.set_motor_speed(to_slider(motor))?;

        // Dim red from lows, dim blue from mids, both capped low.
        let soft_r = ((p.low * p.low - 0.35) * 0.8).clamp(0.0, 0.35);
        let soft_b = ((p.mid * p.mid - 0.35) * 0.8).clamp(0.0, 0.35);
        rig.set_soft(Some(to_slider(soft_r)), Some(0), Some(to_slider(soft_b)))?;

        // Checkered wash stays dark to keep the look dim.
        rig.set_checkered(Some(0), Some(0), Some(0), Some(0))?;

        if !p.strobe_active {
            if p.treble > 0.72 {
                let speed = 30 + (p.treble * 200.0) as i32;
                rig.strobe_steady_speed(speed)?;
                let u = if p.treble > 0.85 { 255 } else { 160 };
                rig.set_strobe_colors(Some(0), Some(0), Some(0), Some(u))?;
            } else {
                rig.strobe_off()?;
                rig.set_strobe_colors(Some(0), Some(0), Some(0), Some(0))?;
            }
        }
        Ok(())
    }
}

/// Hard-gated red/green states, no smoothing: channels slam fully on or
/// fully off.
struct RedGreenPunch;

impl Effect for RedGreenPunch {
    fn name(&self) -> &'static str {
        "red-green-punch"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        rig.set_motor_speed(if p.treble > 0.70 { 255 } else { 22 })?;

        let hi_treble = p.treble > 0.70;
        let pop_treble = p.treble > 0.82;
        let pop_bass = p.bass > 0.88;
        let green_gate = p.low > 0.78 && p.mid > 0.55;

        // Red is the foundation and drops out hard when the mix dies;
        // green comes and goes with the gate.
        let red_base = !(p.bass < 0.18 && p.mid < 0.25);
        let green_base = green_gate && p.treble >= 0.20;

        rig.set_lasers(
            Some(green_base || pop_treble),
            Some(red_base),
            Some(red_base && p.bass > 0.55),
            Some(false),
            255,
        )?;

        let mut soft_r = if red_base { 255 } else { 0 };
        let mut soft_g = if green_base && p.treble > 0.35 { 255 } else { 0 };
        if pop_treble {
            soft_g = 255;
        }
        if hi_treble && p.bass < 0.40 {
            soft_r = 0;
        }
        rig.set_soft(Some(soft_r), Some(soft_g), Some(0))?;

        let (check_r, check_g) = if pop_treble {
            // Treble pop: green slam, unless bass hits too, then red.
            if pop_bass {
                (255, 0)
            } else {
                (0, 255)
            }
        } else if pop_bass {
            (255, 255)
        } else if p.low > 0.65 {
            (0, 255)
        } else if p.mid > 0.60 {
            (255, 0)
        } else {
            (0, 0)
        };
        rig.set_checkered(Some(check_r), Some(check_g), Some(0), Some(0))
    }
}

/// Mostly darkness with rare deliberate accents.
struct DarkAmbience;

impl Effect for DarkAmbience {
    fn name(&self) -> &'static str {
        "dark-ambience"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        let spark = p.bass > 0.90 && p.mid > 0.75;
        rig.set_lasers(
            Some(spark && p.treble > 0.55),
            Some(spark),
            Some(spark && p.bass > 0.95),
            Some(spark && p.treble > 0.70),
            255,
        )?;

        // Motor almost frozen; brief kick on treble spikes.
        let motor = if p.treble > 0.86 { 0.80 } else { 0.06 };
        rig.set_motor_speed(to_slider(motor))?;

        // Low-intensity purple breathing, capped well below full.
        let energy = (0.65 * p.low + 0.35 * p.mid).clamp(0.0, 1.0);
        let glow = to_slider(((energy * energy - 0.25) * 0.35).clamp(0.0, 0.22));
        rig.set_soft(Some(glow), Some(0), Some(glow))?;

        // White cut flashes on hard bass hits, never full blast.
        let cut = p.bass > 0.84 && p.treble > 0.55;
        let white = if cut {
            if p.bass > 0.92 {
                220
            } else {
                140
            }
        } else {
            0
        };
        rig.set_checkered(Some(0), Some(0), Some(0), Some(white))?;

        if !p.strobe_active {
            if p.treble > 0.92 {
                let speed = 30 + (p.treble * 200.0) as i32;
                rig.strobe_steady_speed(speed)?;
                rig.set_strobe_colors(Some(0), Some(0), Some(0), Some(255))?;
            } else {
                rig.strobe_off()?;
                rig.set_strobe_colors(Some(0), Some(0), Some(0), Some(0))?;
            }
        }
        Ok(())
    }
}

/// Rotates which band drives which checkered color every ten seconds.
struct PhaseRotate {
    started: Instant,
}

impl PhaseRotate {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Effect for PhaseRotate {
    fn name(&self) -> &'static str {
        "phase-rotate"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        let phase = (self.started.elapsed().as_millis() / 10_000) % 4;

        let (r, g, b, w) = match phase {
            0 => (p.bass, p.low, p.mid, p.treble),
            1 => (p.low, p.mid, p.treble, p.bass),
            2 => (p.mid, p.treble, p.bass, p.low),
            _ => (p.treble, p.bass, p.low, p.mid),
        };

        rig.set_checkered(
            Some(to_slider(((r * r - 0.2) * 1.2).clamp(0.0, 1.0))),
            Some(to_slider(((g * g - 0.2) * 1.2).clamp(0.0, 1.0))),
            Some(to_slider(((b * b - 0.2) * 1.2).clamp(0.0, 1.0))),
            Some(to_slider(((w * w - 0.2) * 1.2).clamp(0.0, 1.0))),
        )
    }
}

/// Color cycle quantized to 130 BPM beats, energy-scaled intensity.
struct BeatCycle {
    started: Instant,
}

impl BeatCycle {
    const BPM: f32 = 130.0;

    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Effect for BeatCycle {
    fn name(&self) -> &'static str {
        "beat-cycle"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        let beat_ms = (60_000.0 / Self::BPM) as u128;
        let step = (self.started.elapsed().as_millis() / beat_ms) % 7;

        // Musical intensity floor: never totally dark unless the mix is.
        let energy = (0.45 * p.bass + 0.30 * p.low + 0.25 * p.treble).clamp(0.0, 1.0);
        let v = to_slider(((energy * energy - 0.10) * 1.15).clamp(0.10, 1.0));

        let (r, g, b, w) = match step {
            0 => (0, v, 0, 0),
            1 => (v, 0, 0, 0),
            2 => (0, 0, v, 0),
            3 => (v, v, 0, 0),
            4 => (v, v, v, v),
            5 => (0, v, v, 0),
            _ => (v, 0, v, 0),
        };
        rig.set_checkered(Some(r), Some(g), Some(b), Some(w))?;

        // Soft wash mirrors the step slightly dimmer, so the checkered
        // wash stays the lead.
        let sv = to_slider(((energy * energy - 0.15) * 0.75).clamp(0.05, 0.65));
        let (sr, sg, sb) = match step {
            0 => (0, sv, 0),
            1 => (sv, 0, 0),
            2 => (0, 0, sv),
            3 => (sv, sv, 0),
            4 => (sv, sv, sv),
            5 => (0, sv, sv),
            _ => (sv, 0, sv),
        };
        rig.set_soft(Some(sr), Some(sg), Some(sb))?;

        let laser_on = energy > 0.35;
        rig.set_lasers(
            Some(laser_on && matches!(step, 0 | 3 | 5)),
            Some(laser_on && matches!(step, 1 | 3 | 4 | 6)),
            Some(laser_on && matches!(step, 3 | 6) && p.bass > 0.70),
            Some(laser_on && matches!(step, 2 | 4 | 5 | 6)),
            255,
        )?;

        let motor = 0.12 + 0.30 * p.bass;
        rig.set_motor_speed(to_slider(motor))
    }
}

/// Hard-edged neon triad rotating every 650 ms, white edge on treble.
struct NeonVortex {
    started: Instant,
}

impl NeonVortex {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Effect for NeonVortex {
    fn name(&self) -> &'static str {
        "neon-vortex"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        let swirl = 0.10 + 0.25 * p.mid;
        rig.set_motor_speed(to_slider(swirl))?;

        // Quantize to three phases so the color jumps instead of fading.
        let phase = (self.started.elapsed().as_millis() / 650) % 3;

        let energy = (0.45 * p.bass + 0.30 * p.mid + 0.25 * p.treble).clamp(0.0, 1.0);
        let v = to_slider(((energy * energy - 0.05) * 1.25).clamp(0.15, 1.0));

        let (r, g, b) = match phase {
            0 => (v, v / 4, v),          // magenta punch
            1 => (v / 5, v, v),          // cyan punch
            _ => (v, v, (v * 15) / 100), // yellow-ish punch
        };
        let w = if p.treble > 0.70 {
            (v * 80) / 100
        } else if p.treble > 0.55 {
            (v * 35) / 100
        } else {
            0
        };
        rig.set_checkered(Some(r), Some(g), Some(b), Some(w))?;

        let s = to_slider(((energy - 0.15) * 0.35).clamp(0.0, 0.22));
        rig.set_soft(Some(s), Some(0), Some(s))?;

        // Harsh laser edges only on bass pops; no strobe in this look.
        let pop = p.bass > 0.88;
        rig.set_lasers(
            Some(pop && p.mid > 0.55),
            Some(pop),
            Some(pop && p.bass > 0.93),
            Some(pop && p.treble > 0.55),
            255,
        )
    }
}

/// Dark room, green channels only; full-brightness flash when bass and
/// treble align.
struct TerminalGlow;

impl Effect for TerminalGlow {
    fn name(&self) -> &'static str {
        "terminal-glow"
    }

    fn process(&mut self, p: &EffectInput, rig: &mut FixtureBank) -> Result<(), NetError> {
        rig.set_motor_speed(to_slider(0.04))?;

        let flash = p.bass > 0.82 && p.treble > 0.62;

        let g_main = if flash {
            255
        } else {
            to_slider(((p.mid * p.mid - 0.20) * 0.55).clamp(0.04, 0.18))
        };
        let g_soft = if flash {
            220
        } else {
            to_slider(((p.low * p.low - 0.25) * 0.45).clamp(0.02, 0.12))
        };

        rig.set_checkered(Some(0), Some(g_main), Some(0), Some(0))?;
        rig.set_soft(Some(0), Some(g_soft), Some(0))?;
        rig.set_lasers(Some(flash), Some(false), Some(false), Some(false), 255)?;

        if !p.strobe_active {
            if flash {
                let speed = 120 + (p.bass * 100.0) as i32;
                rig.strobe_steady_speed(speed)?;
                rig.set_strobe_colors(Some(0), Some(255), Some(0), Some(0))?;
            } else {
                rig.strobe_off()?;
                rig.set_strobe_colors(Some(0), Some(0), Some(0), Some(0))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artnet::ArtnetTransmitter;
    use crate::config::ArtnetConfig;
    use std::net::{IpAddr, UdpSocket};

    fn test_rig() -> (FixtureBank, UdpSocket) {
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = ArtnetConfig {
            target: IpAddr::from([127, 0, 0, 1]),
            port: sink.local_addr().unwrap().port(),
            universe: 0,
            broadcast: false,
        };
        (
            FixtureBank::new(ArtnetTransmitter::new(&config).unwrap()),
            sink,
        )
    }

    fn quiet_input() -> EffectInput {
        EffectInput {
            bass: 0.0,
            low: 0.0,
            mid: 0.0,
            treble: 0.0,
            strobe_active: false,
        }
    }

    #[test]
    fn test_registry_index_zero_is_noop() {
        let (mut rig, _sink) = test_rig();
        let mut registry = EffectRegistry::with_builtin();
        assert_eq!(registry.name(0), Some("idle"));

        let loud = EffectInput {
            bass: 1.0,
            low: 1.0,
            mid: 1.0,
            treble: 1.0,
            strobe_active: false,
        };
        registry.process(0, &loud, &mut rig).unwrap();
        assert_eq!(rig.transmitter().sequence(), 0);
    }

    #[test]
    fn test_builtin_catalog_order() {
        let registry = EffectRegistry::with_builtin();
        let names: Vec<_> = (0..registry.len())
            .map(|i| registry.name(i).unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "idle",
                "pulse-lasers",
                "blue-wash",
                "dim-haze",
                "red-green-punch",
                "dark-ambience",
                "phase-rotate",
                "beat-cycle",
                "neon-vortex",
                "terminal-glow",
            ]
        );
    }

    #[test]
    fn test_terminal_glow_flash_gate() {
        use crate::dmx::channels;

        let (mut rig, _sink) = test_rig();
        let mut registry = EffectRegistry::with_builtin();
        let index = 9;
        assert_eq!(registry.name(index), Some("terminal-glow"));

        let flash = EffectInput {
            bass: 0.9,
            low: 0.0,
            mid: 0.0,
            treble: 0.7,
            strobe_active: false,
        };
        registry.process(index, &flash, &mut rig).unwrap();
        assert_eq!(rig.cached(channels::CHECKER_G), Some(255));
        assert_eq!(rig.cached(channels::LASER_GREEN), Some(255));
        assert_eq!(rig.cached(channels::CHECKER_R), Some(0));
        assert_eq!(rig.cached(channels::STROBE_G), Some(255));

        registry.process(index, &quiet_input(), &mut rig).unwrap();
        assert_eq!(rig.cached(channels::LASER_GREEN), Some(0));
        assert_eq!(rig.cached(channels::STROBE_CTRL), Some(0));
    }

    #[test]
    fn test_out_of_range_index_is_noop() {
        let (mut rig, _sink) = test_rig();
        let mut registry = EffectRegistry::with_builtin();
        registry.process(999, &quiet_input(), &mut rig).unwrap();
        assert_eq!(rig.transmitter().sequence(), 0);
    }

    #[test]
    fn test_effects_respect_manual_strobe() {
        use crate::dmx::channels;

        let (mut rig, _sink) = test_rig();
        // Operator drives the strobe: control channel pinned at 160.
        rig.handle_strobe(32).unwrap();
        let baseline = rig.cached(channels::STROBE_CTRL);

        let mut registry = EffectRegistry::with_builtin();
        let input = EffectInput {
            bass: 0.2,
            low: 0.2,
            mid: 0.2,
            treble: 0.2,
            strobe_active: true,
        };
        for index in 0..registry.len() {
            registry.process(index, &input, &mut rig).unwrap();
            assert_eq!(
                rig.cached(channels::STROBE_CTRL),
                baseline,
                "effect {index} touched the strobe control while manual strobe was active"
            );
        }
    }

    #[test]
    fn test_pulse_lasers_thresholds() {
        use crate::dmx::channels;

        let (mut rig, _sink) = test_rig();
        let mut registry = EffectRegistry::with_builtin();

        let heavy_bass = EffectInput {
            bass: 0.9,
            low: 0.0,
            mid: 0.0,
            treble: 0.0,
            strobe_active: false,
        };
        registry.process(1, &heavy_bass, &mut rig).unwrap();
        assert_eq!(rig.cached(channels::LASER_RED1), Some(255));
        assert_eq!(rig.cached(channels::LASER_RED2), Some(255));
        assert_eq!(rig.cached(channels::MOTOR_SPEED), Some(0));

        registry.process(1, &quiet_input(), &mut rig).unwrap();
        assert_eq!(rig.cached(channels::LASER_RED1), Some(0));
        assert_eq!(rig.cached(channels::LASER_RED2), Some(0));
    }
}
