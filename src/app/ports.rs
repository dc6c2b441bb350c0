//! Port traits, the hexagonal boundary between loop logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LoopService (domain)
//! ```
//!
//! Driven adapters (relay bank, clock, event sinks) implement these traits.
//! The [`LoopService`](super::service::LoopService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! Relay writes through the port are infallible from the domain's point of
//! view: an adapter that fails to drive a pin logs it and keeps going.

use crate::drivers::relay::RelayId;
use crate::sensors::SensorChange;

use super::events::LoopEvent;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the automaton's relay requests end up here.
pub trait RelayPort {
    /// Drive relay `id` (1-based) to the logical value `on`.
    fn set_relay(&mut self, id: RelayId, on: bool);

    /// Last logical value written to `id`; `false` for unknown ids.
    fn is_relay_on(&self, id: RelayId) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → outside)
// ───────────────────────────────────────────────────────────────

/// Outbound event port.  Adapters decide what to do with events: log them,
/// forward them to a console, record them in tests.
pub trait EventSink {
    fn emit(&mut self, event: &LoopEvent);
}

// ───────────────────────────────────────────────────────────────
// Sensor subscriber
// ───────────────────────────────────────────────────────────────

/// Receives settled sensor changes, one at a time, in the order the bus
/// reported them.
pub trait SensorSubscriber {
    fn on_change(&mut self, change: SensorChange);
}
