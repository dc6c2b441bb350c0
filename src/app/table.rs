//! Loop table: the definitions in force and each loop's runtime state.
//!
//! Definition, clearing and restore are all-or-nothing.  Every check runs
//! against the current table and sensor bus before anything is touched, so
//! a refused request leaves both exactly as they were.

use heapless::Vec;
use log::{debug, info};

use crate::automaton::LoopState;
use crate::error::ConfigError;
use crate::geometry::{LoopDef, MAX_LOOPS};
use crate::sensors::{MAX_SENSORS, SensorBus, SensorId};

/// Distinct sensors one definition can reference.
const MAX_DEF_SENSORS: usize = 16;

type SensorRoles<const N: usize> = Vec<(SensorId, bool), N>;

pub struct LoopTable {
    defs: [LoopDef; MAX_LOOPS],
    states: [LoopState; MAX_LOOPS],
}

impl Default for LoopTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopTable {
    pub fn new() -> Self {
        Self {
            defs: [LoopDef::default(); MAX_LOOPS],
            states: [LoopState::default(); MAX_LOOPS],
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn def(&self, slot: usize) -> Option<&LoopDef> {
        self.defs.get(slot)
    }

    pub fn state(&self, slot: usize) -> Option<&LoopState> {
        self.states.get(slot)
    }

    /// Split borrow of one slot for an automaton call.
    pub fn entry_mut(&mut self, slot: usize) -> Option<(&LoopDef, &mut LoopState)> {
        let def = self.defs.get(slot)?;
        let state = self.states.get_mut(slot)?;
        Some((def, state))
    }

    pub fn defs(&self) -> &[LoopDef] {
        &self.defs
    }

    /// Slots holding an active definition.
    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_LOOPS).filter(|&slot| self.defs[slot].active)
    }

    /// Whether any active loop references `id`.
    pub fn references(&self, id: SensorId) -> bool {
        self.defs.iter().any(|d| d.active && d.has_sensor(id))
    }

    fn referenced_elsewhere(&self, id: SensorId, slot: usize) -> bool {
        self.defs
            .iter()
            .enumerate()
            .any(|(i, d)| i != slot && d.active && d.has_sensor(id))
    }

    // ── Mutations ─────────────────────────────────────────────

    /// Install `def` into `slot` and register its sensors on `bus`.
    ///
    /// Refused without side effects when the slot is out of range, the
    /// definition is malformed, a sensor id is used with both roles, a
    /// sensor another active loop relies on would change role, or the bus
    /// cannot hold the new ids even after reclaiming the ones only the
    /// replaced definition used.  On success the slot's state is fresh;
    /// the caller starts the automaton on it.
    pub fn define(
        &mut self,
        slot: usize,
        mut def: LoopDef,
        bus: &mut SensorBus,
    ) -> Result<(), ConfigError> {
        if slot >= MAX_LOOPS {
            return Err(ConfigError::LoopSlotOutOfRange(slot));
        }
        def.validate()?;
        let wanted: SensorRoles<MAX_DEF_SENSORS> = sensor_roles(core::slice::from_ref(&def))?;

        let mut needed = 0usize;
        let mut reassign: Vec<SensorId, MAX_DEF_SENSORS> = Vec::new();
        for &(id, is_trigger) in &wanted {
            match bus.role_of(id) {
                None => needed += 1,
                Some(role) if role == is_trigger => {}
                Some(_) => {
                    if self.referenced_elsewhere(id, slot) {
                        return Err(ConfigError::SensorRoleConflict(id));
                    }
                    // Same slot count before and after.
                    let _ = reassign.push(id);
                }
            }
        }

        let old = self.defs[slot];
        let mut reclaimable: Vec<SensorId, MAX_DEF_SENSORS> = Vec::new();
        if old.active {
            old.for_each_sensor(|id, _| {
                let dropped = !def.has_sensor(id) && !self.referenced_elsewhere(id, slot);
                if dropped && bus.role_of(id).is_some() && !reclaimable.contains(&id) {
                    let _ = reclaimable.push(id);
                }
            });
        }
        if needed > bus.free_slots() + reclaimable.len() {
            return Err(ConfigError::SensorCapacity);
        }

        // Commit.
        for &id in &reassign {
            bus.free(id);
        }
        if needed > bus.free_slots() {
            for &id in &reclaimable {
                bus.free(id);
            }
        }
        for &(id, is_trigger) in &wanted {
            bus.define(id, is_trigger)?;
        }
        def.active = true;
        self.defs[slot] = def;
        self.states[slot] = LoopState::default();
        info!("loop {slot}: defined ({} sensors)", wanted.len());
        Ok(())
    }

    /// Deactivate `slot`.  Its sensors stay on the bus until the next
    /// [`free_unused_sensors`](Self::free_unused_sensors).
    pub fn clear(&mut self, slot: usize) -> Result<(), ConfigError> {
        if slot >= MAX_LOOPS {
            return Err(ConfigError::LoopSlotOutOfRange(slot));
        }
        self.defs[slot] = LoopDef::default();
        self.states[slot] = LoopState::default();
        info!("loop {slot}: cleared");
        Ok(())
    }

    /// Replace the whole table with `defs` (index = slot).  Sensors none of
    /// the active definitions reference are released; every referenced id
    /// is (re)registered with its role.  Returns the number of active loops.
    pub fn restore(&mut self, defs: &[LoopDef], bus: &mut SensorBus) -> Result<usize, ConfigError> {
        if defs.len() > MAX_LOOPS {
            return Err(ConfigError::LoopSlotOutOfRange(defs.len() - 1));
        }
        for def in defs.iter().filter(|d| d.active) {
            def.validate()?;
        }
        let active: Vec<LoopDef, MAX_LOOPS> = defs.iter().filter(|d| d.active).copied().collect();
        let wanted: SensorRoles<MAX_SENSORS> = sensor_roles(&active)?;

        // Commit.
        let stale: Vec<SensorId, MAX_SENSORS> = bus
            .iter()
            .map(|s| (s.id(), s.is_trigger()))
            .filter(|entry| !wanted.contains(entry))
            .map(|(id, _)| id)
            .collect();
        for &id in &stale {
            bus.free(id);
        }
        for &(id, is_trigger) in &wanted {
            bus.define(id, is_trigger)?;
        }
        self.defs = [LoopDef::default(); MAX_LOOPS];
        self.states = [LoopState::default(); MAX_LOOPS];
        for (slot, def) in defs.iter().enumerate() {
            self.defs[slot] = *def;
        }
        info!("loop table restored: {} active loops, {} sensors", active.len(), wanted.len());
        Ok(active.len())
    }

    /// Release every sensor no active loop references.  Returns how many.
    pub fn free_unused_sensors(&self, bus: &mut SensorBus) -> usize {
        let unused: Vec<SensorId, MAX_SENSORS> = bus
            .iter()
            .map(|s| s.id())
            .filter(|&id| !self.references(id))
            .collect();
        for &id in &unused {
            bus.free(id);
        }
        if !unused.is_empty() {
            debug!("freed {} unused sensors", unused.len());
        }
        unused.len()
    }
}

/// Distinct sensor ids across `defs` with their roles.  An id that
/// appears with both roles is a conflict; more distinct ids than the
/// bus can hold is a capacity error.
fn sensor_roles<const N: usize>(defs: &[LoopDef]) -> Result<SensorRoles<N>, ConfigError> {
    let mut roles = SensorRoles::<N>::new();
    let mut outcome = Ok(());
    for def in defs {
        def.for_each_sensor(|id, is_trigger| {
            if outcome.is_err() {
                return;
            }
            match roles.iter().find(|(known, _)| *known == id) {
                Some(&(_, role)) if role != is_trigger => {
                    outcome = Err(ConfigError::SensorRoleConflict(id));
                }
                Some(_) => {}
                None => {
                    if roles.push((id, is_trigger)).is_err() {
                        outcome = Err(ConfigError::SensorCapacity);
                    }
                }
            }
        });
    }
    outcome.map(|()| roles)
}
