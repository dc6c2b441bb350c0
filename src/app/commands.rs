//! Inbound commands: the operations the external definition and console
//! workflows invoke on the loop controller.
//!
//! The [`LoopService`](super::service::LoopService) accepts these through
//! [`LoopService::handle_command`](super::service::LoopService::handle_command),
//! regardless of the transport they arrived on.

use crate::geometry::LoopDef;
use crate::sensors::SensorId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    /// Install `def` into `slot`, replacing whatever was there.
    DefineLoop { slot: usize, def: LoopDef },

    /// Deactivate `slot`.
    ClearLoop(usize),

    /// Replace the whole definition table (index = slot).
    Restore(Vec<LoopDef>),

    /// Same as [`Restore`](Self::Restore) from an encoded snapshot.
    RestoreSnapshot(Vec<u8>),

    /// Pin a sensor's visible value; `None` releases the override.
    OverrideSensor { id: SensorId, value: Option<bool> },

    /// Freeze a sensor at its current visible value.
    SuspendSensor(SensorId),

    /// Return a suspended sensor to bus-derived values.
    ResumeSensor(SensorId),

    /// Release every sensor no active loop references.
    FreeUnusedSensors,

    /// Restart every active loop from idle.
    Reset,
}
