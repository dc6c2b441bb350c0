//! Loop endpoints and their readiness predicates.
//!
//! An endpoint is one boundary of a loop.  It has up to two alternative
//! approach tracks, an optional turnout feedback sensor choosing between
//! them, optional boundary trigger sensors (inbound and outbound), an
//! optional short auxiliary track, and the relay that aligns the loop's
//! polarity with this side.

use serde::{Deserialize, Serialize};

use crate::drivers::relay::{NO_RELAY, RelayId};
use crate::sensors::{NO_SENSOR, SensorId, SensorRead};

// ---------------------------------------------------------------------------
// Sensor reference
// ---------------------------------------------------------------------------

/// A sensor id plus inversion flag.  Id 0 means "not wired".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRef {
    pub id: SensorId,
    pub invert: bool,
}

impl SensorRef {
    pub const NONE: Self = Self {
        id: NO_SENSOR,
        invert: false,
    };

    pub const fn new(id: SensorId) -> Self {
        Self { id, invert: false }
    }

    pub const fn inverted(id: SensorId) -> Self {
        Self { id, invert: true }
    }

    pub const fn is_present(&self) -> bool {
        self.id != NO_SENSOR
    }

    /// Whether this reference names `id`.
    pub const fn is(&self, id: SensorId) -> bool {
        self.is_present() && self.id == id
    }

    /// Logical value after inversion; an absent sensor is never active.
    pub fn active(&self, bus: &dyn SensorRead) -> bool {
        self.is_present() && bus.read(self.id) != self.invert
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Which approach track(s) a train would use right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No track sensor wired.
    Unwired,
    /// The turnout points away from the only wired track.
    Blocked,
    /// Exactly one track is in use.
    Track(SensorRef),
    /// Two tracks and no discriminator: either may be used.
    Either(SensorRef, SensorRef),
}

impl Route {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Track(_) | Self::Either(..))
    }

    pub fn occupied(&self, bus: &dyn SensorRead) -> bool {
        match self {
            Self::Unwired | Self::Blocked => false,
            Self::Track(t) => t.active(bus),
            Self::Either(a, b) => a.active(bus) || b.active(bus),
        }
    }

    /// Whether `id` is one of the tracks of this route.
    pub fn uses(&self, id: SensorId) -> bool {
        match self {
            Self::Unwired | Self::Blocked => false,
            Self::Track(t) => t.is(id),
            Self::Either(a, b) => a.is(id) || b.is(id),
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub track_a: SensorRef,
    pub track_b: SensorRef,
    /// Turnout/switch feedback; active selects `track_b`.
    pub turnout: SensorRef,
    /// Boundary trigger crossed by trains entering the loop.
    pub sensor_in: SensorRef,
    /// Boundary trigger crossed by trains leaving the loop.
    pub sensor_out: SensorRef,
    pub short_track: SensorRef,
    pub relay: RelayId,
    /// Relay value that aligns the loop with this endpoint.
    pub trigger_state: bool,
    /// Relay value while the loop is idle.
    pub off_state: bool,
}

impl Endpoint {
    /// Endpoint with a single approach track.
    pub fn on_track(track: SensorRef) -> Self {
        Self {
            track_a: track,
            ..Self::default()
        }
    }

    pub fn with_track_b(mut self, track: SensorRef) -> Self {
        self.track_b = track;
        self
    }

    pub fn with_turnout(mut self, turnout: SensorRef) -> Self {
        self.turnout = turnout;
        self
    }

    pub fn with_triggers(mut self, sensor_in: SensorRef, sensor_out: SensorRef) -> Self {
        self.sensor_in = sensor_in;
        self.sensor_out = sensor_out;
        self
    }

    pub fn with_short_track(mut self, short_track: SensorRef) -> Self {
        self.short_track = short_track;
        self
    }

    pub fn with_relay(mut self, relay: RelayId, trigger_state: bool, off_state: bool) -> Self {
        self.relay = relay;
        self.trigger_state = trigger_state;
        self.off_state = off_state;
        self
    }

    // ── Structure ─────────────────────────────────────────────

    pub fn has_track(&self) -> bool {
        self.track_a.is_present() || self.track_b.is_present()
    }

    pub fn has_relay(&self) -> bool {
        self.relay != NO_RELAY
    }

    pub fn has_trigger_sensors(&self) -> bool {
        self.sensor_in.is_present() || self.sensor_out.is_present()
    }

    pub fn has_inbound_trigger(&self) -> bool {
        self.sensor_in.is_present()
    }

    pub fn is_boundary_sensor(&self, id: SensorId) -> bool {
        self.sensor_in.is(id) || self.sensor_out.is(id)
    }

    pub fn has_sensor(&self, id: SensorId) -> bool {
        self.track_a.is(id)
            || self.track_b.is(id)
            || self.turnout.is(id)
            || self.short_track.is(id)
            || self.is_boundary_sensor(id)
    }

    /// Visit every wired sensor with its role (`true` = boundary trigger).
    pub fn for_each_sensor(&self, mut f: impl FnMut(SensorId, bool)) {
        for r in [self.track_a, self.track_b, self.turnout, self.short_track] {
            if r.is_present() {
                f(r.id, false);
            }
        }
        for r in [self.sensor_in, self.sensor_out] {
            if r.is_present() {
                f(r.id, true);
            }
        }
    }

    // ── Predicates ────────────────────────────────────────────

    pub fn selected_route(&self, bus: &dyn SensorRead) -> Route {
        let a = self.track_a.is_present();
        let b = self.track_b.is_present();
        let switched = self.turnout.is_present();

        match (a, b) {
            (false, false) => Route::Unwired,
            (true, true) if switched => {
                if self.turnout.active(bus) {
                    Route::Track(self.track_b)
                } else {
                    Route::Track(self.track_a)
                }
            }
            (true, true) => Route::Either(self.track_a, self.track_b),
            _ => {
                let single = if a { self.track_a } else { self.track_b };
                if !switched || self.turnout.active(bus) {
                    Route::Track(single)
                } else {
                    Route::Blocked
                }
            }
        }
    }

    /// Selected route occupied, or the short track occupied.
    pub fn occupied(&self, bus: &dyn SensorRead) -> bool {
        self.selected_route(bus).occupied(bus) || self.short_track.active(bus)
    }

    pub fn is_valid_enter(&self, bus: &dyn SensorRead) -> bool {
        self.selected_route(bus).is_open() && self.occupied(bus)
    }

    pub fn is_valid_exit(&self, bus: &dyn SensorRead) -> bool {
        let route = self.selected_route(bus);
        route.is_open() && !route.occupied(bus) && !self.short_track.active(bus)
    }

    pub fn is_primed_enter(&self, bus: &dyn SensorRead) -> bool {
        self.is_valid_enter(bus) && (!self.sensor_in.is_present() || self.sensor_in.active(bus))
    }

    pub fn is_primed_exit(&self, bus: &dyn SensorRead) -> bool {
        self.is_valid_exit(bus) && (!self.sensor_out.is_present() || self.sensor_out.active(bus))
    }

    /// True only when `id` can decide this endpoint's occupancy and the
    /// resulting occupancy equals `expected`.
    pub fn changed_occupied(&self, bus: &dyn SensorRead, id: SensorId, expected: bool) -> bool {
        let route = self.selected_route(bus);
        let relevant = route.uses(id)
            || self.short_track.is(id)
            || (self.turnout.is(id) && route == Route::Blocked);
        relevant && self.occupied(bus) == expected
    }

    pub fn sensors_active(&self, bus: &dyn SensorRead) -> bool {
        self.sensor_in.active(bus) || self.sensor_out.active(bus)
    }

    /// Count of active track sensors regardless of the turnout position.
    pub fn occupied_track_sensors(&self, bus: &dyn SensorRead) -> u8 {
        [self.track_a, self.track_b, self.short_track]
            .iter()
            .filter(|r| r.active(bus))
            .count() as u8
    }
}
