//! Hardware adapter: bridges the relay bank to the domain's [`RelayPort`].
//!
//! The bank reports pin failures as errors; the domain treats relay writes
//! as fire-and-forget.  This adapter is where the two meet: a failed write
//! is logged and the relay keeps its last known state.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::RelayPort;
use crate::drivers::relay::{RelayBank, RelayId};

// ── RelayPort implementation ──────────────────────────────────

impl<P: OutputPin, const N: usize> RelayPort for RelayBank<P, N> {
    fn set_relay(&mut self, id: RelayId, on: bool) {
        if let Err(e) = self.try_set(id, on) {
            warn!("relay {id}: write {} failed: {e}", if on { "on" } else { "off" });
        }
    }

    fn is_relay_on(&self, id: RelayId) -> bool {
        self.is_on(id)
    }
}
