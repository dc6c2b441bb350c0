//! Loop geometry: static description of a loop and pure predicates over it.
//!
//! ```text
//!   left Endpoint ══╗                       ╔══ right Endpoint
//!   (tracks, turnout,║ ───── LoopCore ───── ║ (tracks, turnout,
//!    triggers, relay)╝   (1–2 track sensors) ╚  triggers, relay)
//! ```
//!
//! Nothing in this module writes relays or keeps runtime state; every
//! predicate reads the current visible sensor values through
//! [`SensorRead`](crate::sensors::SensorRead).

pub mod endpoint;
pub mod interior;
pub mod snapshot;

use serde::{Deserialize, Serialize};

use crate::drivers::relay::MAX_RELAYS;
use crate::error::ConfigError;
use crate::sensors::{SensorId, SensorRead};

pub use endpoint::{Endpoint, Route, SensorRef};
pub use interior::LoopCore;

/// Number of loop slots in the table.
pub const MAX_LOOPS: usize = 8;

/// Settle timeout given to a definition that does not specify one.
pub const DEFAULT_SETTLE_TIMEOUT_MS: u32 = 500;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two endpoints.  Also used as the travel direction: the side
/// a train is currently moving towards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ---------------------------------------------------------------------------
// LoopDef
// ---------------------------------------------------------------------------

/// Definition of one reversing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDef {
    pub left: Endpoint,
    pub right: Endpoint,
    pub core: LoopCore,
    pub active: bool,
    /// How long a boundary trigger must stay quiet before it no longer
    /// counts as "the tail of the train may still be here" (ms).  `None`
    /// takes the controller-wide setting when the loop is defined.
    #[serde(default)]
    pub settle_timeout_ms: Option<u32>,
}

impl Default for LoopDef {
    fn default() -> Self {
        Self {
            left: Endpoint::default(),
            right: Endpoint::default(),
            core: LoopCore::default(),
            active: false,
            settle_timeout_ms: None,
        }
    }
}

impl LoopDef {
    pub fn new(left: Endpoint, right: Endpoint, core: LoopCore) -> Self {
        Self {
            left,
            right,
            core,
            ..Self::default()
        }
    }

    pub fn with_settle_timeout(mut self, ms: u32) -> Self {
        self.settle_timeout_ms = Some(ms);
        self
    }

    /// Effective settle timeout (ms).
    pub fn settle_timeout(&self) -> u32 {
        self.settle_timeout_ms.unwrap_or(DEFAULT_SETTLE_TIMEOUT_MS)
    }

    pub fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn has_sensor(&self, id: SensorId) -> bool {
        self.left.has_sensor(id) || self.right.has_sensor(id) || self.core.has_sensor(id)
    }

    /// Visit every wired sensor with its role (`true` = boundary trigger).
    /// Ids shared between endpoints are visited once per reference.
    pub fn for_each_sensor(&self, mut f: impl FnMut(SensorId, bool)) {
        self.left.for_each_sensor(&mut f);
        self.right.for_each_sensor(&mut f);
        self.core.for_each_sensor(&mut f);
    }

    /// Total active track sensors across both endpoints and the core.
    pub fn occupied_track_sensors(&self, bus: &dyn SensorRead) -> u8 {
        self.left.occupied_track_sensors(bus)
            + self.right.occupied_track_sensors(bus)
            + self.core.occupied_track_sensors(bus)
    }

    /// Structural checks applied before a definition is accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.left.has_track() || !self.right.has_track() {
            return Err(ConfigError::EndpointWithoutTrack);
        }
        if !self.core.has_track() {
            return Err(ConfigError::CoreWithoutTrack);
        }
        for ep in [&self.left, &self.right] {
            if usize::from(ep.relay) > MAX_RELAYS {
                return Err(ConfigError::RelayOutOfRange(ep.relay));
            }
        }
        if self.settle_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTiming("loop settle timeout is zero"));
        }
        Ok(())
    }
}
