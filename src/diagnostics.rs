//! Runtime diagnostics.
//!
//! Console-facing reports of every loop and sensor, plus running counters
//! kept by the service.  Reports render as one line of text (`Display`) or
//! as JSON for tooling.

use core::fmt::{self, Write as _};

use heapless::{String, Vec};
use serde::Serialize;

use crate::app::ports::RelayPort;
use crate::automaton::{LoopState, Status};
use crate::drivers::relay::RelayId;
use crate::geometry::{LoopDef, Side};
use crate::sensors::SensorRead;
use crate::sensors::debounce::Sensor;

/// Status with its direction, e.g. `moving-left`.  Idle and occupied carry
/// no meaningful direction and print bare.
pub fn status_name(status: Status, direction: Side) -> String<24> {
    let mut s = String::new();
    match status {
        Status::Idle | Status::Occupied => {
            let _ = s.push_str(status.name());
        }
        _ => {
            let _ = write!(s, "{}-{}", status.name(), direction.name());
        }
    }
    s
}

// ---------------------------------------------------------------------------
// Loop report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopReport {
    pub slot: usize,
    pub status: String<24>,
    pub in_outage: bool,
    pub occupied_track_sensors: u8,
    /// Logical value of each relay the loop drives.
    pub relays: Vec<(RelayId, bool), 2>,
}

impl LoopReport {
    pub fn collect(
        slot: usize,
        def: &LoopDef,
        state: &LoopState,
        bus: &dyn SensorRead,
        relays: &impl RelayPort,
    ) -> Self {
        let mut wired: Vec<(RelayId, bool), 2> = Vec::new();
        for ep in [&def.left, &def.right] {
            if ep.has_relay() && !wired.iter().any(|(id, _)| *id == ep.relay) {
                let _ = wired.push((ep.relay, relays.is_relay_on(ep.relay)));
            }
        }
        Self {
            slot,
            status: status_name(state.status, state.direction),
            in_outage: state.in_outage(),
            occupied_track_sensors: def.occupied_track_sensors(bus),
            relays: wired,
        }
    }

    pub fn to_json(&self) -> Result<std::string::String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for LoopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop {}: {}", self.slot, self.status)?;
        if self.in_outage {
            write!(f, " [outage]")?;
        }
        write!(f, " occ={}", self.occupied_track_sensors)?;
        for (id, on) in &self.relays {
            write!(f, " r{}={}", id, if *on { "on" } else { "off" })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sensor report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorReport {
    pub id: u8,
    pub role: &'static str,
    pub raw: bool,
    pub reported: bool,
    pub visible: bool,
    pub settling: bool,
    pub overridden: Option<bool>,
    pub suspended: bool,
}

impl From<&Sensor> for SensorReport {
    fn from(s: &Sensor) -> Self {
        Self {
            id: s.id(),
            role: if s.is_trigger() { "trigger" } else { "track" },
            raw: s.raw(),
            reported: s.reported(),
            visible: s.visible(),
            settling: s.is_settling(),
            overridden: s.overridden(),
            suspended: s.is_suspended(),
        }
    }
}

impl fmt::Display for SensorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sensor {:>3} {:<7} raw={} reported={} visible={}",
            self.id,
            self.role,
            u8::from(self.raw),
            u8::from(self.reported),
            u8::from(self.visible)
        )?;
        if self.settling {
            write!(f, " settling")?;
        }
        if let Some(v) = self.overridden {
            write!(f, " override={}", u8::from(v))?;
        }
        if self.suspended {
            write!(f, " suspended")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Running totals since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeCounters {
    pub ticks: u64,
    pub sensor_changes: u64,
    pub transitions: u64,
    pub ambiguous_entries: u32,
    pub outages_started: u32,
    pub outage_timeouts: u32,
    pub relay_writes: u64,
}
