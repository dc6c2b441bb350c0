//! Unified error types for the loop controller.
//!
//! Only the definition and configuration paths are fallible.  The runtime
//! paths (sensor edges, automaton transitions, relay writes through the
//! port) resolve every condition in place and never return an error.
//! All variants are `Copy` so they can be handed back to the external
//! definition workflow without allocation.

use core::fmt;

use crate::drivers::relay::RelayId;
use crate::sensors::SensorId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A loop definition, restore, or configuration was refused.
    Config(ConfigError),
    /// A relay output could not be driven.
    Relay(RelayError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Relay(e) => write!(f, "relay: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Reasons a definition or configuration is refused.  A refusal never
/// leaves partial state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Sensor id 0 is the "absent" sentinel and cannot be registered.
    InvalidSensorId,
    /// The sensor table has no free slot left.
    SensorCapacity,
    /// The id is already registered with the other role (track vs trigger).
    SensorRoleConflict(SensorId),
    /// Loop slot index beyond the loop table.
    LoopSlotOutOfRange(usize),
    /// An endpoint has neither track sensor wired.
    EndpointWithoutTrack,
    /// The core has no track sensor wired.
    CoreWithoutTrack,
    /// Relay id beyond the relay bank.
    RelayOutOfRange(RelayId),
    /// A timing parameter is zero or inconsistent.
    InvalidTiming(&'static str),
    /// A loop-table snapshot could not be decoded.
    CorruptedSnapshot,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSensorId => write!(f, "sensor id 0 is reserved"),
            Self::SensorCapacity => write!(f, "sensor table full"),
            Self::SensorRoleConflict(id) => {
                write!(f, "sensor {id} already defined with a different role")
            }
            Self::LoopSlotOutOfRange(slot) => write!(f, "loop slot {slot} out of range"),
            Self::EndpointWithoutTrack => write!(f, "endpoint has no track sensor"),
            Self::CoreWithoutTrack => write!(f, "loop core has no track sensor"),
            Self::RelayOutOfRange(id) => write!(f, "relay {id} out of range"),
            Self::InvalidTiming(what) => write!(f, "invalid timing: {what}"),
            Self::CorruptedSnapshot => write!(f, "loop snapshot corrupted"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Relay errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Relay id 0 or beyond the bank.
    OutOfRange(RelayId),
    /// The output pin rejected the write.
    PinWriteFailed(RelayId),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(id) => write!(f, "relay {id} out of range"),
            Self::PinWriteFailed(id) => write!(f, "relay {id} pin write failed"),
        }
    }
}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
