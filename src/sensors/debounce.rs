//! Per-sensor debounce slot.
//!
//! ## Edge handling
//!
//! | Observation                               | Effect                          |
//! |-------------------------------------------|---------------------------------|
//! | raw == reported                           | cancel any settle in progress   |
//! | raw matches the settle in progress        | commit once the window elapsed  |
//! | raw differs from reported and the settle  | restart the settle window       |
//!
//! Windows are asymmetric: the "up" window applies when settling towards
//! active, the "down" window when settling towards inactive.  When the
//! window is shorter than the measured bus scan period the second matching
//! observation commits immediately, since the window cannot be resolved
//! at that scan rate anyway.

use crate::config::SensorTiming;

use super::{NO_SENSOR, SensorChange, SensorId};

/// One entry of the sensor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sensor {
    id: SensorId,
    is_trigger: bool,
    /// Last raw value seen on the bus.
    raw: bool,
    /// Debounced bus-derived value.
    reported: bool,
    /// Start of the settle window towards `raw`, if one is running.
    settle_since: Option<u64>,
    up_ms: u32,
    down_ms: u32,
    overridden: Option<bool>,
    suspended: Option<bool>,
    pending: bool,
}

impl Sensor {
    /// An unused table slot.
    pub const EMPTY: Self = Self {
        id: NO_SENSOR,
        is_trigger: false,
        raw: false,
        reported: false,
        settle_since: None,
        up_ms: 0,
        down_ms: 0,
        overridden: None,
        suspended: None,
        pending: false,
    };

    pub const fn new(id: SensorId, is_trigger: bool, timing: &SensorTiming) -> Self {
        let (up_ms, down_ms) = timing.windows(is_trigger);
        Self {
            id,
            is_trigger,
            up_ms,
            down_ms,
            ..Self::EMPTY
        }
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn is_free(&self) -> bool {
        self.id == NO_SENSOR
    }

    pub fn is_trigger(&self) -> bool {
        self.is_trigger
    }

    pub fn raw(&self) -> bool {
        self.raw
    }

    pub fn reported(&self) -> bool {
        self.reported
    }

    pub fn is_settling(&self) -> bool {
        self.settle_since.is_some()
    }

    pub fn overridden(&self) -> Option<bool> {
        self.overridden
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.is_some()
    }

    /// Externally visible value: override, then frozen value, then bus.
    pub fn visible(&self) -> bool {
        self.overridden.or(self.suspended).unwrap_or(self.reported)
    }

    pub(super) fn apply_timing(&mut self, timing: &SensorTiming) {
        (self.up_ms, self.down_ms) = timing.windows(self.is_trigger);
    }

    fn window_towards(&self, value: bool) -> u32 {
        if value { self.up_ms } else { self.down_ms }
    }

    /// Feed one raw bus observation taken at `now_ms`.
    /// `scan_period_ms` is 0 while the scan rate is still unknown.
    pub fn observe(&mut self, raw: bool, now_ms: u64, scan_period_ms: u32) {
        if raw == self.reported {
            self.raw = raw;
            self.settle_since = None;
            return;
        }

        match self.settle_since {
            Some(since) if self.raw == raw => {
                let window = self.window_towards(raw);
                let elapsed = now_ms.saturating_sub(since);
                if elapsed >= u64::from(window) || window < scan_period_ms {
                    self.commit(raw);
                }
            }
            _ => {
                self.raw = raw;
                self.settle_since = Some(now_ms);
            }
        }
    }

    /// Commit a settle whose window has run out without a further edge.
    pub fn promote(&mut self, now_ms: u64) {
        if let Some(since) = self.settle_since {
            let window = u64::from(self.window_towards(self.raw));
            if now_ms.saturating_sub(since) >= window {
                self.commit(self.raw);
            }
        }
    }

    fn commit(&mut self, value: bool) {
        let before = self.visible();
        self.reported = value;
        self.settle_since = None;
        self.mark_if_changed(before);
    }

    pub fn set_override(&mut self, value: Option<bool>) {
        let before = self.visible();
        self.overridden = value;
        self.mark_if_changed(before);
    }

    /// Freeze the bus-derived value.  A second suspend keeps the first
    /// frozen value.
    pub fn suspend(&mut self) {
        if self.suspended.is_none() {
            self.suspended = Some(self.reported);
        }
    }

    pub fn resume(&mut self) {
        let before = self.visible();
        self.suspended = None;
        self.mark_if_changed(before);
    }

    fn mark_if_changed(&mut self, before: bool) {
        if self.visible() != before {
            self.pending = true;
        }
    }

    /// Take the pending notification, if any.
    pub fn take_pending(&mut self) -> Option<SensorChange> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(SensorChange {
            id: self.id,
            value: self.visible(),
        })
    }
}
