//! The loop core: the interior section whose polarity gets switched.

use serde::{Deserialize, Serialize};

use super::Side;
use super::endpoint::SensorRef;
use crate::sensors::{SensorId, SensorRead};

/// Up to two track sensors covering the interior.  With both wired,
/// `track_a` covers the half next to the left endpoint and `track_b` the
/// half next to the right endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopCore {
    pub track_a: SensorRef,
    pub track_b: SensorRef,
}

impl LoopCore {
    pub fn on_track(track: SensorRef) -> Self {
        Self {
            track_a: track,
            track_b: SensorRef::NONE,
        }
    }

    pub fn split(left_half: SensorRef, right_half: SensorRef) -> Self {
        Self {
            track_a: left_half,
            track_b: right_half,
        }
    }

    pub fn has_track(&self) -> bool {
        self.track_a.is_present() || self.track_b.is_present()
    }

    pub fn has_sensor(&self, id: SensorId) -> bool {
        self.track_a.is(id) || self.track_b.is(id)
    }

    pub fn occupied(&self, bus: &dyn SensorRead) -> bool {
        self.track_a.active(bus) || self.track_b.active(bus)
    }

    /// Whether the half of the core next to `side` is occupied.  Degrades
    /// to [`occupied`](Self::occupied) unless both halves are wired.
    pub fn is_direction_primed(&self, bus: &dyn SensorRead, side: Side) -> bool {
        if !(self.track_a.is_present() && self.track_b.is_present()) {
            return self.occupied(bus);
        }
        match side {
            Side::Left => self.track_a.active(bus),
            Side::Right => self.track_b.active(bus),
        }
    }

    pub fn occupied_track_sensors(&self, bus: &dyn SensorRead) -> u8 {
        u8::from(self.track_a.active(bus)) + u8::from(self.track_b.active(bus))
    }

    pub fn for_each_sensor(&self, mut f: impl FnMut(SensorId, bool)) {
        for r in [self.track_a, self.track_b] {
            if r.is_present() {
                f(r.id, false);
            }
        }
    }
}
