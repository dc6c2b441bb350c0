//! Outbound loop events.
//!
//! The [`LoopService`](super::service::LoopService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::automaton::Status;
use crate::geometry::Side;

/// Structured events emitted by the loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// The service has started; every relay was driven off.
    Started,

    /// A loop definition was accepted into `slot`.
    LoopDefined { slot: usize },

    /// `slot` was cleared; its relays were returned to their off-values.
    LoopCleared { slot: usize },

    /// The definition table was replaced from a snapshot.
    Restored { loops: usize },

    /// A loop moved between statuses.
    StatusChanged {
        slot: usize,
        from: Status,
        to: Status,
        direction: Side,
    },

    /// Both endpoints went active on the same change; the loop stayed idle.
    AmbiguousEntry { slot: usize },

    /// A loop expecting a train read zero occupancy.
    OutageStarted { slot: usize },

    /// Occupancy came back before the outage threshold.
    OutageCleared { slot: usize },

    /// The outage outlasted its threshold while in `status`.
    OutageTimeout { slot: usize, status: Status },

    /// Unreferenced sensors were released from the bus.
    SensorsFreed { count: usize },

    /// Every loop was restarted from idle.
    Reset,
}

impl LoopEvent {
    /// Loop slot the event concerns, if any.
    pub fn slot(&self) -> Option<usize> {
        match *self {
            Self::LoopDefined { slot }
            | Self::LoopCleared { slot }
            | Self::StatusChanged { slot, .. }
            | Self::AmbiguousEntry { slot }
            | Self::OutageStarted { slot }
            | Self::OutageCleared { slot }
            | Self::OutageTimeout { slot, .. } => Some(slot),
            Self::Started | Self::Restored { .. } | Self::SensorsFreed { .. } | Self::Reset => {
                None
            }
        }
    }
}
