//! Outage supervision.
//!
//! An outage is an interval during which a loop that believes a train is
//! inside reads zero occupancy everywhere.  That usually means dirty rails
//! or a lifted wheelset rather than an empty loop, so the automaton keeps
//! its status and waits.  This module decides how long it waits.
//!
//! ## Outage lifecycle
//!
//! 1. A notified change leaves the loop with zero occupancy while the
//!    status expects a train: the outage timer starts.
//! 2. Any change that brings occupancy back clears the timer; the status
//!    continues as if nothing happened.
//! 3. The periodic sweep checks the timer against the threshold for the
//!    current status.  Exceeding it forces the loop back to idle.
//!
//! Edge-adjacent statuses get the short threshold: a train there can
//! plausibly have left without the loop noticing.  Interior statuses get
//! the long one since a train cannot leave the core unseen.

use log::{info, warn};

use crate::automaton::Status;
use crate::config::ControlConfig;

/// Result of checking a loop's outage timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutageVerdict {
    /// No outage in progress.
    Clear,
    /// Outage in progress, still within the threshold.
    Pending { elapsed_ms: u64 },
    /// Threshold exceeded.
    Expired { elapsed_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutagePolicy {
    short_ms: u32,
    long_ms: u32,
}

impl OutagePolicy {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            short_ms: config.outage_short_ms,
            long_ms: config.outage_long_ms,
        }
    }

    /// Whether `status` may start an outage at all.  The others never wait:
    /// an empty loop in approach, exited or occupied goes straight to idle.
    pub fn applies_to(status: Status) -> bool {
        !matches!(
            status,
            Status::Idle | Status::Approach | Status::Exited | Status::Occupied
        )
    }

    /// Threshold for an outage observed while in `status` (ms).
    pub fn threshold(&self, status: Status) -> u32 {
        match status {
            Status::Approach | Status::ReadyEnter | Status::Exited => self.short_ms,
            _ => self.long_ms,
        }
    }

    /// Check the timer started at `since` against the threshold for
    /// `status`.  Expiry requires strictly exceeding the threshold.
    pub fn evaluate(&self, since: Option<u64>, now_ms: u64, status: Status) -> OutageVerdict {
        let Some(since) = since else {
            return OutageVerdict::Clear;
        };
        let elapsed_ms = now_ms.saturating_sub(since);
        if elapsed_ms > u64::from(self.threshold(status)) {
            OutageVerdict::Expired { elapsed_ms }
        } else {
            OutageVerdict::Pending { elapsed_ms }
        }
    }

    pub fn log_started(slot: usize, status: Status) {
        warn!("loop {slot}: occupancy lost in {}, outage timer started", status.name());
    }

    pub fn log_cleared(slot: usize, elapsed_ms: u64) {
        info!("loop {slot}: occupancy back after {elapsed_ms} ms, outage cleared");
    }

    pub fn log_expired(&self, slot: usize, status: Status) {
        warn!(
            "loop {slot}: outage in {} exceeded {} ms, forcing idle",
            status.name(),
            self.threshold(status)
        );
    }
}

impl Default for OutagePolicy {
    fn default() -> Self {
        Self::new(&ControlConfig::default())
    }
}
