//! DMX fixture bank with a dirty-channel cache
//!
//! The rig occupies channels 1..=18 of the universe: master dimmer,
//! four on/off laser heads, a mirror-motor speed, an RGBW "checkered"
//! wash, an RGB "soft" wash and a strobe head (control + RGBU color).
//!
//! Every write goes through a last-committed-value cache so a batch of
//! updates produces exactly one packet, and only when something actually
//! changed. Single logical writer; no internal locking.

use crate::artnet::{clamp_u8, ArtnetTransmitter};
use crate::error::NetError;

/// 1-based channel assignments of the rig.
pub mod channels {
    pub const MASTER: u16 = 1;

    pub const LASER_GREEN: u16 = 2;
    pub const LASER_RED1: u16 = 3;
    pub const LASER_BLUE: u16 = 4;
    pub const LASER_RED2: u16 = 5;

    pub const MOTOR_SPEED: u16 = 6;

    pub const CHECKER_R: u16 = 7;
    pub const CHECKER_G: u16 = 8;
    pub const CHECKER_B: u16 = 9;
    pub const CHECKER_W: u16 = 10;

    pub const SOFT_R: u16 = 11;
    pub const SOFT_G: u16 = 12;
    pub const SOFT_B: u16 = 13;

    pub const STROBE_CTRL: u16 = 14;
    pub const STROBE_R: u16 = 15;
    pub const STROBE_G: u16 = 16;
    pub const STROBE_B: u16 = 17;
    pub const STROBE_U: u16 = 18;
}

/// Master dimmer values
pub const MASTER_NORMAL: i32 = 0;
pub const MASTER_BLACKOUT: i32 = 132;

/// Strobe control values
pub const STROBE_OFF: i32 = 0;
pub const STROBE_ON: i32 = 1;
pub const STROBE_RANDOM: i32 = 5;
pub const STROBE_RANDOM_MIN: i32 = 7;
pub const STROBE_RANDOM_MAX: i32 = 20;
pub const STROBE_STEADY_MIN: i32 = 30;

/// Highest channel tracked by the dirty cache.
const TRACKED_CHANNELS: u16 = 18;

/// Sentinel for "never written"; outside 0..=255 so the first write to
/// any tracked channel always counts as a change.
const UNSET: i16 = -1;

/// Map an on/off request to a channel value.
///
/// Off is always 0. On clamps the requested intensity into 1..=255, so
/// an "on" request can never resolve to 0, which would be
/// indistinguishable from off.
pub fn on_off_value(on: bool, on_value: i32) -> i32 {
    if !on {
        return 0;
    }
    on_value.clamp(1, 255)
}

/// Sparse batch update across all fixture groups.
///
/// `None` fields are left untouched. Laser booleans share a single
/// `laser_on_value` intensity.
#[derive(Debug, Clone, Copy)]
pub struct FixtureUpdate {
    pub master: Option<i32>,
    pub motor_speed: Option<i32>,

    pub laser_green: Option<bool>,
    pub laser_red1: Option<bool>,
    pub laser_red2: Option<bool>,
    pub laser_blue: Option<bool>,
    pub laser_on_value: i32,

    pub checkered_r: Option<i32>,
    pub checkered_g: Option<i32>,
    pub checkered_b: Option<i32>,
    pub checkered_w: Option<i32>,

    pub soft_r: Option<i32>,
    pub soft_g: Option<i32>,
    pub soft_b: Option<i32>,

    /// Raw strobe control value. Deliberately unclamped to the mode
    /// subranges; the quantized strobe handler relies on raw 255 here.
    /// Use `strobe_random_speed`/`strobe_steady_speed` for clamped moves.
    pub strobe_control: Option<i32>,
    pub strobe_r: Option<i32>,
    pub strobe_g: Option<i32>,
    pub strobe_b: Option<i32>,
    pub strobe_u: Option<i32>,
}

impl Default for FixtureUpdate {
    fn default() -> Self {
        Self {
            master: None,
            motor_speed: None,
            laser_green: None,
            laser_red1: None,
            laser_red2: None,
            laser_blue: None,
            laser_on_value: 255,
            checkered_r: None,
            checkered_g: None,
            checkered_b: None,
            checkered_w: None,
            soft_r: None,
            soft_g: None,
            soft_b: None,
            strobe_control: None,
            strobe_r: None,
            strobe_g: None,
            strobe_b: None,
            strobe_u: None,
        }
    }
}

/// The rig: transmitter plus per-channel cache for channels 1..=18.
///
/// Sole writer of DMX frame state. Effects and the control handler both
/// go through this type, so batching and dedup hold everywhere.
pub struct FixtureBank {
    net: ArtnetTransmitter,
    cache: [i16; TRACKED_CHANNELS as usize + 1], // index 0 unused
}

impl FixtureBank {
    pub fn new(net: ArtnetTransmitter) -> Self {
        Self {
            net,
            cache: [UNSET; TRACKED_CHANNELS as usize + 1],
        }
    }

    pub fn transmitter(&self) -> &ArtnetTransmitter {
        &self.net
    }

    /// Last committed value for a tracked channel, `None` before the
    /// first write or for untracked channels.
    pub fn cached(&self, channel: u16) -> Option<u8> {
        if (1..=TRACKED_CHANNELS).contains(&channel) {
            let v = self.cache[channel as usize];
            (v != UNSET).then_some(v as u8)
        } else {
            None
        }
    }

    /// Write a channel through the cache. Returns whether the write
    /// changed committed state. Untracked channels (>18) bypass the
    /// cache and always count as a change.
    fn set_cached(&mut self, channel: u16, value: i32) -> Result<bool, NetError> {
        let v = clamp_u8(value);
        if (1..=TRACKED_CHANNELS).contains(&channel) {
            if self.cache[channel as usize] == i16::from(v) {
                return Ok(false);
            }
            self.cache[channel as usize] = i16::from(v);
        }
        self.net.set_channel(channel, i32::from(v))?;
        Ok(true)
    }

    fn submit_if(&mut self, changed: bool) -> Result<(), NetError> {
        if changed {
            self.net.submit()?;
        }
        Ok(())
    }

    // -----------------------
    // Batch API
    // -----------------------

    /// Apply a sparse update, transmitting at most one packet and only
    /// if at least one channel actually changed.
    pub fn set_many(&mut self, u: FixtureUpdate) -> Result<(), NetError> {
        use channels::*;
        let mut changed = false;

        if let Some(v) = u.master {
            changed |= self.set_cached(MASTER, v)?;
        }
        if let Some(v) = u.motor_speed {
            changed |= self.set_cached(MOTOR_SPEED, v)?;
        }

        if let Some(on) = u.laser_green {
            changed |= self.set_cached(LASER_GREEN, on_off_value(on, u.laser_on_value))?;
        }
        if let Some(on) = u.laser_red1 {
            changed |= self.set_cached(LASER_RED1, on_off_value(on, u.laser_on_value))?;
        }
        if let Some(on) = u.laser_red2 {
            changed |= self.set_cached(LASER_RED2, on_off_value(on, u.laser_on_value))?;
        }
        if let Some(on) = u.laser_blue {
            changed |= self.set_cached(LASER_BLUE, on_off_value(on, u.laser_on_value))?;
        }

        if let Some(v) = u.checkered_r {
            changed |= self.set_cached(CHECKER_R, v)?;
        }
        if let Some(v) = u.checkered_g {
            changed |= self.set_cached(CHECKER_G, v)?;
        }
        if let Some(v) = u.checkered_b {
            changed |= self.set_cached(CHECKER_B, v)?;
        }
        if let Some(v) = u.checkered_w {
            changed |= self.set_cached(CHECKER_W, v)?;
        }

        if let Some(v) = u.soft_r {
            changed |= self.set_cached(SOFT_R, v)?;
        }
        if let Some(v) = u.soft_g {
            changed |= self.set_cached(SOFT_G, v)?;
        }
        if let Some(v) = u.soft_b {
            changed |= self.set_cached(SOFT_B, v)?;
        }

        if let Some(v) = u.strobe_control {
            changed |= self.set_cached(STROBE_CTRL, v)?;
        }
        if let Some(v) = u.strobe_r {
            changed |= self.set_cached(STROBE_R, v)?;
        }
        if let Some(v) = u.strobe_g {
            changed |= self.set_cached(STROBE_G, v)?;
        }
        if let Some(v) = u.strobe_b {
            changed |= self.set_cached(STROBE_B, v)?;
        }
        if let Some(v) = u.strobe_u {
            changed |= self.set_cached(STROBE_U, v)?;
        }

        self.submit_if(changed)
    }

    // -----------------------
    // One-off actions
    // -----------------------

    pub fn cut_light(&mut self, cut: bool) -> Result<(), NetError> {
        self.set_master(if cut { MASTER_BLACKOUT } else { MASTER_NORMAL })
    }

    pub fn set_master(&mut self, value: i32) -> Result<(), NetError> {
        let changed = self.set_cached(channels::MASTER, value)?;
        self.submit_if(changed)
    }

    pub fn set_motor_speed(&mut self, value: i32) -> Result<(), NetError> {
        let changed = self.set_cached(channels::MOTOR_SPEED, value)?;
        self.submit_if(changed)
    }

    /// Raw uncached write to any channel 1..=512, always transmits.
    pub fn set_dmx_directly(&mut self, channel: u16, value: i32) -> Result<(), NetError> {
        self.net.set_channel(channel, value)?;
        self.net.submit()
    }

    // -----------------------
    // Lasers (on/off heads)
    // -----------------------

    pub fn set_laser_green(&mut self, on: bool, on_value: i32) -> Result<(), NetError> {
        self.set_on_off(channels::LASER_GREEN, on, on_value)
    }

    pub fn set_laser_red1(&mut self, on: bool, on_value: i32) -> Result<(), NetError> {
        self.set_on_off(channels::LASER_RED1, on, on_value)
    }

    pub fn set_laser_red2(&mut self, on: bool, on_value: i32) -> Result<(), NetError> {
        self.set_on_off(channels::LASER_RED2, on, on_value)
    }

    pub fn set_laser_blue(&mut self, on: bool, on_value: i32) -> Result<(), NetError> {
        self.set_on_off(channels::LASER_BLUE, on, on_value)
    }

    fn set_on_off(&mut self, channel: u16, on: bool, on_value: i32) -> Result<(), NetError> {
        let changed = self.set_cached(channel, on_off_value(on, on_value))?;
        self.submit_if(changed)
    }

    /// Batch all four laser heads, one submit.
    #[allow(clippy::too_many_arguments)]
    pub fn set_lasers(
        &mut self,
        green: Option<bool>,
        red1: Option<bool>,
        red2: Option<bool>,
        blue: Option<bool>,
        on_value: i32,
    ) -> Result<(), NetError> {
        self.set_many(FixtureUpdate {
            laser_green: green,
            laser_red1: red1,
            laser_red2: red2,
            laser_blue: blue,
            laser_on_value: on_value,
            ..FixtureUpdate::default()
        })
    }

    // -----------------------
    // Washes
    // -----------------------

    pub fn set_checkered(
        &mut self,
        r: Option<i32>,
        g: Option<i32>,
        b: Option<i32>,
        w: Option<i32>,
    ) -> Result<(), NetError> {
        self.set_many(FixtureUpdate {
            checkered_r: r,
            checkered_g: g,
            checkered_b: b,
            checkered_w: w,
            ..FixtureUpdate::default()
        })
    }

    pub fn set_soft(
        &mut self,
        r: Option<i32>,
        g: Option<i32>,
        b: Option<i32>,
    ) -> Result<(), NetError> {
        self.set_many(FixtureUpdate {
            soft_r: r,
            soft_g: g,
            soft_b: b,
            ..FixtureUpdate::default()
        })
    }

    // -----------------------
    // Strobe head
    // -----------------------

    pub fn set_strobe_control(&mut self, value: i32) -> Result<(), NetError> {
        let changed = self.set_cached(channels::STROBE_CTRL, value)?;
        self.submit_if(changed)
    }

    pub fn strobe_off(&mut self) -> Result<(), NetError> {
        self.set_strobe_control(STROBE_OFF)
    }

    pub fn strobe_on(&mut self) -> Result<(), NetError> {
        self.set_strobe_control(STROBE_ON)
    }

    pub fn strobe_random(&mut self) -> Result<(), NetError> {
        self.set_strobe_control(STROBE_RANDOM)
    }

    /// Random mode speed, clamped into the fixture's 7..=20 range.
    pub fn strobe_random_speed(&mut self, speed: i32) -> Result<(), NetError> {
        self.set_strobe_control(speed.clamp(STROBE_RANDOM_MIN, STROBE_RANDOM_MAX))
    }

    /// Steady mode speed, clamped to the fixture's >= 30 range.
    pub fn strobe_steady_speed(&mut self, speed: i32) -> Result<(), NetError> {
        self.set_strobe_control(speed.clamp(STROBE_STEADY_MIN, 255))
    }

    pub fn set_strobe_colors(
        &mut self,
        r: Option<i32>,
        g: Option<i32>,
        b: Option<i32>,
        u: Option<i32>,
    ) -> Result<(), NetError> {
        self.set_many(FixtureUpdate {
            strobe_r: r,
            strobe_g: g,
            strobe_b: b,
            strobe_u: u,
            ..FixtureUpdate::default()
        })
    }

    /// Quantized strobe-mode selector driven by a control-surface value.
    ///
    /// Buckets 0/16/32/48/64 map to distinct {on/off, color, speed}
    /// presets. Values between buckets are ignored. Goes through the raw
    /// strobe-control path on purpose: the presets use speeds outside
    /// the helper clamp ranges.
    pub fn handle_strobe(&mut self, value: u8) -> Result<(), NetError> {
        tracing::debug!(value, "strobe select");
        match value {
            0 => self.set_many(FixtureUpdate {
                strobe_control: Some(STROBE_OFF),
                strobe_r: Some(0),
                strobe_g: Some(0),
                strobe_b: Some(0),
                strobe_u: Some(0),
                ..FixtureUpdate::default()
            }),
            16 => self.set_many(FixtureUpdate {
                strobe_r: Some(0),
                strobe_g: Some(0),
                strobe_b: Some(0),
                strobe_u: Some(255),
                strobe_control: Some(255),
                ..FixtureUpdate::default()
            }),
            32 => self.set_many(FixtureUpdate {
                strobe_r: Some(255),
                strobe_g: Some(0),
                strobe_b: Some(0),
                strobe_u: Some(0),
                strobe_control: Some(160),
                ..FixtureUpdate::default()
            }),
            48 => self.set_many(FixtureUpdate {
                strobe_r: Some(255),
                strobe_g: Some(255),
                strobe_b: Some(255),
                strobe_u: Some(255),
                strobe_control: Some(255),
                ..FixtureUpdate::default()
            }),
            64 => self.set_many(FixtureUpdate {
                strobe_r: Some(0),
                strobe_g: Some(255),
                strobe_b: Some(255),
                strobe_u: Some(0),
                strobe_control: Some(220),
                ..FixtureUpdate::default()
            }),
            _ => Ok(()),
        }
    }

    /// Neutral baseline applied on preset change: everything dark,
    /// lasers off, motor stopped. Strobe control is left untouched so a
    /// manually selected strobe mode survives the switch.
    pub fn reset_baseline(&mut self) -> Result<(), NetError> {
        self.set_many(FixtureUpdate {
            master: Some(MASTER_NORMAL),
            motor_speed: Some(0),
            laser_green: Some(false),
            laser_red1: Some(false),
            laser_red2: Some(false),
            laser_blue: Some(false),
            checkered_r: Some(0),
            checkered_g: Some(0),
            checkered_b: Some(0),
            checkered_w: Some(0),
            soft_r: Some(0),
            soft_g: Some(0),
            soft_b: Some(0),
            strobe_r: Some(0),
            strobe_g: Some(0),
            strobe_b: Some(0),
            strobe_u: Some(0),
            ..FixtureUpdate::default()
        })
    }
}
