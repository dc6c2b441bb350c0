//! Sensor bus: debounced logical sensor state shared with the bus scanner.
//!
//! ```text
//!  bus scanner ──notify_raw_edge──▶ ┌──────────────┐ ──run_cycle──▶ ChangeBatch
//!  (own cadence)                    │  SensorBus   │
//!  console ──override/suspend────▶  │ [Sensor; 24] │ ◀──read── geometry / automaton
//!                                   └──────────────┘
//! ```
//!
//! The table is the only state shared between the asynchronous scanner and
//! the cooperative main tick.  [`SharedSensorBus`] wraps it in a
//! critical-section mutex so that every edge update lands atomically and a
//! reader never sees a half-updated slot.  Nothing here returns an error at
//! runtime: undefined ids are ignored on write and read as `false`.

pub mod debounce;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use log::debug;

use crate::config::SensorTiming;
use crate::error::ConfigError;
use debounce::Sensor;

/// Sensor identifier on the bus.  `0` means "no sensor".
pub type SensorId = u8;

/// The "absent" sentinel.
pub const NO_SENSOR: SensorId = 0;

/// Number of sensor slots in the table.
pub const MAX_SENSORS: usize = 24;

/// One settled, externally visible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorChange {
    pub id: SensorId,
    pub value: bool,
}

/// All changes settled during one cycle, in table order.
pub type ChangeBatch = Vec<SensorChange, MAX_SENSORS>;

/// Read access used by geometry predicates and the automaton.
pub trait SensorRead {
    /// Visible value of `id`; `false` for undefined ids.
    fn read(&self, id: SensorId) -> bool;

    /// Whether `id` occupies a slot in the table.
    fn is_defined(&self, id: SensorId) -> bool;
}

// ---------------------------------------------------------------------------
// SensorBus
// ---------------------------------------------------------------------------

/// Fixed-capacity sensor table with debounce and manual override.
pub struct SensorBus {
    slots: [Sensor; MAX_SENSORS],
    timing: SensorTiming,
    /// Running average of the interval between bus scans (ms), 0 = unknown.
    scan_period_ms: u32,
    last_scan_ms: Option<u64>,
}

impl Default for SensorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBus {
    pub const fn new() -> Self {
        Self {
            slots: [Sensor::EMPTY; MAX_SENSORS],
            timing: SensorTiming::DEFAULT,
            scan_period_ms: 0,
            last_scan_ms: None,
        }
    }

    /// Replace the debounce policy for defined slots and future definitions.
    pub fn set_timing(&mut self, timing: SensorTiming) {
        self.timing = timing;
        for slot in self.slots.iter_mut().filter(|s| !s.is_free()) {
            slot.apply_timing(&timing);
        }
    }

    pub fn timing(&self) -> &SensorTiming {
        &self.timing
    }

    // ── Registration ──────────────────────────────────────────

    /// Register `id` with the given role.  Idempotent when the id already
    /// exists with the same role.
    pub fn define(&mut self, id: SensorId, is_trigger: bool) -> Result<(), ConfigError> {
        if id == NO_SENSOR {
            return Err(ConfigError::InvalidSensorId);
        }
        if let Some(existing) = self.find(id) {
            return if existing.is_trigger() == is_trigger {
                Ok(())
            } else {
                Err(ConfigError::SensorRoleConflict(id))
            };
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_free())
            .ok_or(ConfigError::SensorCapacity)?;
        *slot = Sensor::new(id, is_trigger, &self.timing);
        debug!("sensor {} defined ({})", id, if is_trigger { "trigger" } else { "track" });
        Ok(())
    }

    /// Release the slot of `id`.  Callers are responsible for checking that
    /// no active loop still references it.  Returns whether a slot was freed.
    pub fn free(&mut self, id: SensorId) -> bool {
        match self.find_mut(id) {
            Some(slot) => {
                *slot = Sensor::EMPTY;
                debug!("sensor {} freed", id);
                true
            }
            None => false,
        }
    }

    /// Role of a defined sensor: `Some(true)` for trigger sensors.
    pub fn role_of(&self, id: SensorId) -> Option<bool> {
        self.find(id).map(Sensor::is_trigger)
    }

    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_free()).count()
    }

    /// Defined sensors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.slots.iter().filter(|s| !s.is_free())
    }

    pub fn sensor(&self, id: SensorId) -> Option<&Sensor> {
        self.find(id)
    }

    // ── Producer side ─────────────────────────────────────────

    /// Mark the start of one bus scan at `now_ms`; feeds the scan-period
    /// estimate used by the aliasing guard.
    pub fn begin_scan(&mut self, now_ms: u64) {
        if let Some(last) = self.last_scan_ms {
            let interval = now_ms.saturating_sub(last).min(u64::from(u32::MAX)) as u32;
            self.scan_period_ms = if self.scan_period_ms == 0 {
                interval
            } else {
                ((u64::from(self.scan_period_ms) * 7 + u64::from(interval)) / 8) as u32
            };
        }
        self.last_scan_ms = Some(now_ms);
    }

    /// Measured scan period, once at least two scans were seen.
    pub fn scan_period_ms(&self) -> Option<u32> {
        (self.scan_period_ms > 0).then_some(self.scan_period_ms)
    }

    /// Feed one raw observation of `id` taken at `now_ms`.
    pub fn notify_raw_edge(&mut self, id: SensorId, raw: bool, now_ms: u64) {
        let period = self.scan_period_ms;
        if let Some(slot) = self.find_mut(id) {
            slot.observe(raw, now_ms, period);
        }
    }

    // ── Manual control ────────────────────────────────────────

    /// `Some(v)` pins `read(id)` to `v`; `None` restores the bus value.
    pub fn override_sensor(&mut self, id: SensorId, value: Option<bool>) {
        if let Some(slot) = self.find_mut(id) {
            slot.set_override(value);
        }
    }

    pub fn suspend(&mut self, id: SensorId) {
        if let Some(slot) = self.find_mut(id) {
            slot.suspend();
        }
    }

    pub fn resume(&mut self, id: SensorId) {
        if let Some(slot) = self.find_mut(id) {
            slot.resume();
        }
    }

    // ── Consumer side ─────────────────────────────────────────

    /// Collect every change that became visible since the last cycle.
    /// Settles whose window ran out by `now_ms` are committed first.
    pub fn run_cycle(&mut self, now_ms: u64) -> ChangeBatch {
        let mut batch = ChangeBatch::new();
        for slot in self.slots.iter_mut().filter(|s| !s.is_free()) {
            slot.promote(now_ms);
            if let Some(change) = slot.take_pending() {
                // One entry per slot at most, the batch cannot overflow.
                let _ = batch.push(change);
            }
        }
        batch
    }

    // ── Internal ──────────────────────────────────────────────

    fn find(&self, id: SensorId) -> Option<&Sensor> {
        if id == NO_SENSOR {
            return None;
        }
        self.slots.iter().find(|s| s.id() == id)
    }

    fn find_mut(&mut self, id: SensorId) -> Option<&mut Sensor> {
        if id == NO_SENSOR {
            return None;
        }
        self.slots.iter_mut().find(|s| s.id() == id)
    }
}

impl SensorRead for SensorBus {
    fn read(&self, id: SensorId) -> bool {
        self.find(id).is_some_and(Sensor::visible)
    }

    fn is_defined(&self, id: SensorId) -> bool {
        self.find(id).is_some()
    }
}

// ---------------------------------------------------------------------------
// SharedSensorBus
// ---------------------------------------------------------------------------

/// [`SensorBus`] behind a critical-section mutex.
///
/// Usable as a `static` so the scanner thread or ISR and the main loop can
/// both reach it.  Each call is one short critical section.
pub struct SharedSensorBus {
    inner: Mutex<CriticalSectionRawMutex, RefCell<SensorBus>>,
}

impl Default for SharedSensorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSensorBus {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(SensorBus::new())),
        }
    }

    /// Run `f` with exclusive access to the table.  Must not be nested.
    pub fn with<R>(&self, f: impl FnOnce(&mut SensorBus) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn begin_scan(&self, now_ms: u64) {
        self.with(|bus| bus.begin_scan(now_ms));
    }

    pub fn notify_raw_edge(&self, id: SensorId, raw: bool, now_ms: u64) {
        self.with(|bus| bus.notify_raw_edge(id, raw, now_ms));
    }

    pub fn run_cycle(&self, now_ms: u64) -> ChangeBatch {
        self.with(|bus| bus.run_cycle(now_ms))
    }
}

impl SensorRead for SharedSensorBus {
    fn read(&self, id: SensorId) -> bool {
        self.with(|bus| bus.read(id))
    }

    fn is_defined(&self, id: SensorId) -> bool {
        self.with(|bus| bus.is_defined(id))
    }
}
