//! Controller configuration parameters
//!
//! All tunable timing policy for the loop controller: debounce windows,
//! settle and outage thresholds, sweep cadence, and relay polarity.
//! Values can be supplied by the external configuration workflow; the
//! defaults match a typical two-rail DC layout with reed/occupancy
//! detectors on the boundary and current detectors on the tracks.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Debounce windows per sensor role.
///
/// Trigger sensors only fire while a train crosses a point, so they get
/// much shorter windows than track-occupancy sensors, which must ride out
/// dirty wheels and rail gaps before reporting "vacant".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorTiming {
    /// Track sensor going active (ms)
    pub track_up_ms: u32,
    /// Track sensor going inactive (ms)
    pub track_down_ms: u32,
    /// Trigger sensor going active (ms)
    pub trigger_up_ms: u32,
    /// Trigger sensor going inactive (ms)
    pub trigger_down_ms: u32,
}

impl SensorTiming {
    pub const DEFAULT: Self = Self {
        track_up_ms: 1,
        track_down_ms: 800,
        trigger_up_ms: 5,
        trigger_down_ms: 200,
    };

    /// `(up, down)` windows for a sensor of the given role.
    pub const fn windows(&self, is_trigger: bool) -> (u32, u32) {
        if is_trigger {
            (self.trigger_up_ms, self.trigger_down_ms)
        } else {
            (self.track_up_ms, self.track_down_ms)
        }
    }
}

impl Default for SensorTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    // --- Sensor bus ---
    /// Debounce windows per sensor role
    pub timing: SensorTiming,

    // --- Automaton ---
    /// Settle timeout given to newly defined loops (ms)
    pub settle_timeout_ms: u32,
    /// Outage threshold for edge-adjacent states (ms)
    pub outage_short_ms: u32,
    /// Outage threshold for interior states (ms)
    pub outage_long_ms: u32,
    /// How long `moving` waits for an endpoint after the core empties (ms)
    pub core_abandon_timeout_ms: u32,
    /// Periodic bookkeeping cadence inside `tick` (ms)
    pub sweep_interval_ms: u32,

    // --- Relays ---
    /// Physical level that means "relay on"
    pub relay_active_high: bool,

    // --- Firmware cadence ---
    /// Main loop interval (ms)
    pub tick_interval_ms: u32,
    /// Bus scan interval (ms)
    pub scan_interval_ms: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            timing: SensorTiming::DEFAULT,

            settle_timeout_ms: 500,
            outage_short_ms: 10_000,       // 10 s
            outage_long_ms: 5 * 60 * 1000, // 5 min
            core_abandon_timeout_ms: crate::automaton::DEFAULT_CORE_ABANDON_TIMEOUT_MS,
            sweep_interval_ms: 50,

            relay_active_high: false,

            tick_interval_ms: 10,
            scan_interval_ms: 5,
        }
    }
}

impl ControlConfig {
    /// Reject values that would stall or invert the timing policy.
    /// Debounce windows of zero are legal (commit on first observation).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settle_timeout_ms == 0 {
            return Err(ConfigError::InvalidTiming("settle timeout is zero"));
        }
        if self.outage_short_ms == 0 || self.outage_short_ms >= self.outage_long_ms {
            return Err(ConfigError::InvalidTiming(
                "outage thresholds must satisfy 0 < short < long",
            ));
        }
        if self.sweep_interval_ms == 0 || self.tick_interval_ms == 0 || self.scan_interval_ms == 0
        {
            return Err(ConfigError::InvalidTiming("cadence is zero"));
        }
        Ok(())
    }
}
