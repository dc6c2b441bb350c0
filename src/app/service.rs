//! Loop service, the hexagonal core.
//!
//! [`LoopService`] owns the automaton, the loop table and the runtime
//! counters.  It exposes a hardware-agnostic API; the sensor bus, relays,
//! clock and event sink are injected at call sites, making the whole
//! service testable with mock adapters.
//!
//! ```text
//!  SharedSensorBus ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!            Clock ──▶ │        LoopService       │
//!        RelayPort ◀── │ Automaton · LoopTable    │
//!                      └──────────────────────────┘
//! ```
//!
//! ## Tick
//!
//! 1. Drain the settled changes from the bus.
//! 2. Hand each change to every active loop, in table order.
//! 3. Every `sweep_interval_ms`, run the periodic check of every loop.
//!
//! After each automaton call the requested relay policy is written out
//! (when it was re-requested) and the loop's notices become events.

use log::{info, warn};

use crate::automaton::{LoopAutomaton, LoopState, Notice, Reaction, RelayPolicy, Status};
use crate::config::ControlConfig;
use crate::diagnostics::{LoopReport, RuntimeCounters, SensorReport};
use crate::drivers::relay::{MAX_RELAYS, RelayId};
use crate::error::Result;
use crate::geometry::snapshot::{decode_snapshot, encode_snapshot};
use crate::geometry::{LoopDef, MAX_LOOPS, Side};
use crate::sensors::{SensorChange, SensorRead, SharedSensorBus};

use super::commands::LoopCommand;
use super::events::LoopEvent;
use super::ports::{Clock, EventSink, RelayPort, SensorSubscriber};
use super::table::LoopTable;

// ───────────────────────────────────────────────────────────────
// LoopService
// ───────────────────────────────────────────────────────────────

pub struct LoopService {
    config: ControlConfig,
    automaton: LoopAutomaton,
    table: LoopTable,
    counters: RuntimeCounters,
    last_sweep_ms: Option<u64>,
}

impl LoopService {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch any output; call [`start`](Self::start) next.
    pub fn new(config: ControlConfig) -> Self {
        Self {
            automaton: LoopAutomaton::new(&config),
            config,
            table: LoopTable::new(),
            counters: RuntimeCounters::default(),
            last_sweep_ms: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive every relay off, apply the bus timing and start whatever
    /// loops are already defined.
    pub fn start(
        &mut self,
        bus: &SharedSensorBus,
        relays: &mut impl RelayPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        let timing = self.config.timing;
        bus.with(|b| b.set_timing(timing));
        for id in 1..=MAX_RELAYS as RelayId {
            relays.set_relay(id, false);
        }
        sink.emit(&LoopEvent::Started);
        info!("loop service started");

        let now = clock.now_ms();
        let slots: heapless::Vec<usize, MAX_LOOPS> = self.table.active_slots().collect();
        for slot in slots {
            self.start_slot(slot, bus, relays, sink, now);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle: settled sensor changes first, then the periodic
    /// sweep when it is due.
    pub fn tick(
        &mut self,
        bus: &SharedSensorBus,
        relays: &mut impl RelayPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        self.counters.ticks += 1;
        let now = clock.now_ms();

        let changes = bus.run_cycle(now);
        if !changes.is_empty() {
            let mut dispatch = Dispatcher {
                automaton: &self.automaton,
                table: &mut self.table,
                counters: &mut self.counters,
                bus,
                relays: &mut *relays,
                sink: &mut *sink,
                now_ms: now,
            };
            for change in changes {
                dispatch.on_change(change);
            }
        }

        let due = self
            .last_sweep_ms
            .is_none_or(|last| now.saturating_sub(last) >= u64::from(self.config.sweep_interval_ms));
        if due {
            self.last_sweep_ms = Some(now);
            self.sweep(bus, relays, sink, now);
        }
    }

    fn sweep(
        &mut self,
        bus: &SharedSensorBus,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
        now: u64,
    ) {
        for slot in 0..MAX_LOOPS {
            let Some((def, state)) = self.table.entry_mut(slot) else {
                continue;
            };
            if !def.active {
                continue;
            }
            let mut ctx = self.automaton.context(slot, def, state, bus, now);
            self.automaton.on_tick(&mut ctx);
            let reaction = ctx.into_reaction();
            publish(slot, def, state, reaction, relays, sink, &mut self.counters);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply a definition or console command.  Refused definitions leave
    /// the table, the bus and the relays untouched.
    pub fn handle_command(
        &mut self,
        cmd: LoopCommand,
        bus: &SharedSensorBus,
        relays: &mut impl RelayPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let now = clock.now_ms();
        match cmd {
            LoopCommand::DefineLoop { slot, mut def } => {
                if def.settle_timeout_ms.is_none() {
                    def.settle_timeout_ms = Some(self.config.settle_timeout_ms);
                }
                let previous = self.table.def(slot).copied();
                if let Err(e) = bus.with(|b| self.table.define(slot, def, b)) {
                    warn!("loop {slot}: definition refused: {e}");
                    return Err(e.into());
                }
                if let Some(old) = previous.filter(|d| d.active) {
                    write_policy(&old, RelayPolicy::Idle, relays, &mut self.counters);
                }
                sink.emit(&LoopEvent::LoopDefined { slot });
                self.start_slot(slot, bus, relays, sink, now);
            }
            LoopCommand::ClearLoop(slot) => {
                let previous = self.table.def(slot).copied();
                self.table.clear(slot)?;
                if let Some(old) = previous.filter(|d| d.active) {
                    write_policy(&old, RelayPolicy::Idle, relays, &mut self.counters);
                }
                sink.emit(&LoopEvent::LoopCleared { slot });
            }
            LoopCommand::Restore(defs) => self.restore(&defs, bus, relays, sink, now)?,
            LoopCommand::RestoreSnapshot(bytes) => {
                let defs = decode_snapshot(&bytes)?;
                self.restore(&defs, bus, relays, sink, now)?;
            }
            LoopCommand::OverrideSensor { id, value } => {
                bus.with(|b| b.override_sensor(id, value));
                info!("sensor {id}: override {value:?}");
            }
            LoopCommand::SuspendSensor(id) => {
                bus.with(|b| b.suspend(id));
                info!("sensor {id}: suspended");
            }
            LoopCommand::ResumeSensor(id) => {
                bus.with(|b| b.resume(id));
                info!("sensor {id}: resumed");
            }
            LoopCommand::FreeUnusedSensors => {
                let count = bus.with(|b| self.table.free_unused_sensors(b));
                sink.emit(&LoopEvent::SensorsFreed { count });
            }
            LoopCommand::Reset => {
                warn!("reset: restarting every loop from idle");
                for id in 1..=MAX_RELAYS as RelayId {
                    relays.set_relay(id, false);
                }
                sink.emit(&LoopEvent::Reset);
                let slots: heapless::Vec<usize, MAX_LOOPS> = self.table.active_slots().collect();
                for slot in slots {
                    self.start_slot(slot, bus, relays, sink, now);
                }
            }
        }
        Ok(())
    }

    fn restore(
        &mut self,
        defs: &[LoopDef],
        bus: &SharedSensorBus,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
        now: u64,
    ) -> Result<()> {
        let previous: heapless::Vec<LoopDef, MAX_LOOPS> = self
            .table
            .active_slots()
            .filter_map(|slot| self.table.def(slot).copied())
            .collect();
        let loops = match bus.with(|b| self.table.restore(defs, b)) {
            Ok(loops) => loops,
            Err(e) => {
                warn!("restore refused: {e}");
                return Err(e.into());
            }
        };
        for old in &previous {
            write_policy(old, RelayPolicy::Idle, relays, &mut self.counters);
        }
        sink.emit(&LoopEvent::Restored { loops });
        let slots: heapless::Vec<usize, MAX_LOOPS> = self.table.active_slots().collect();
        for slot in slots {
            self.start_slot(slot, bus, relays, sink, now);
        }
        Ok(())
    }

    /// Reset `slot` to idle and let it resolve what the sensors already show.
    fn start_slot(
        &mut self,
        slot: usize,
        bus: &SharedSensorBus,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
        now: u64,
    ) {
        let Some((def, state)) = self.table.entry_mut(slot) else {
            return;
        };
        let mut ctx = self.automaton.context(slot, def, state, bus, now);
        self.automaton.start(&mut ctx);
        let reaction = ctx.into_reaction();
        publish(slot, def, state, reaction, relays, sink, &mut self.counters);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn counters(&self) -> &RuntimeCounters {
        &self.counters
    }

    pub fn table(&self) -> &LoopTable {
        &self.table
    }

    /// Status and direction of an active loop.
    pub fn status(&self, slot: usize) -> Option<(Status, Side)> {
        let def = self.table.def(slot)?;
        let state = self.table.state(slot)?;
        def.active.then_some((state.status, state.direction))
    }

    pub fn loop_state(&self, slot: usize) -> Option<&LoopState> {
        self.table.state(slot)
    }

    /// Encode the definition table for the persistence component.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(encode_snapshot(self.table.defs())?)
    }

    /// Report for one active loop.
    pub fn report(
        &self,
        slot: usize,
        bus: &dyn SensorRead,
        relays: &impl RelayPort,
    ) -> Option<LoopReport> {
        let def = self.table.def(slot).filter(|d| d.active)?;
        let state = self.table.state(slot)?;
        Some(LoopReport::collect(slot, def, state, bus, relays))
    }

    /// One report per active loop.
    pub fn loop_reports(&self, bus: &dyn SensorRead, relays: &impl RelayPort) -> Vec<LoopReport> {
        self.table
            .active_slots()
            .filter_map(|slot| self.report(slot, bus, relays))
            .collect()
    }

    /// One report per defined sensor, in table order.
    pub fn sensor_reports(&self, bus: &SharedSensorBus) -> Vec<SensorReport> {
        bus.with(|b| b.iter().map(SensorReport::from).collect())
    }
}

// ───────────────────────────────────────────────────────────────
// Change dispatch
// ───────────────────────────────────────────────────────────────

/// Fans one settled change out to every active loop.
struct Dispatcher<'a, R: RelayPort, S: EventSink> {
    automaton: &'a LoopAutomaton,
    table: &'a mut LoopTable,
    counters: &'a mut RuntimeCounters,
    bus: &'a dyn SensorRead,
    relays: &'a mut R,
    sink: &'a mut S,
    now_ms: u64,
}

impl<R: RelayPort, S: EventSink> SensorSubscriber for Dispatcher<'_, R, S> {
    fn on_change(&mut self, change: SensorChange) {
        self.counters.sensor_changes += 1;
        for slot in 0..MAX_LOOPS {
            let Some((def, state)) = self.table.entry_mut(slot) else {
                continue;
            };
            if !def.active || !def.has_sensor(change.id) {
                continue;
            }
            let mut ctx = self.automaton.context(slot, def, state, self.bus, self.now_ms);
            self.automaton.on_change(&mut ctx, change);
            let reaction = ctx.into_reaction();
            publish(
                slot,
                def,
                state,
                reaction,
                &mut *self.relays,
                &mut *self.sink,
                self.counters,
            );
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Output helpers
// ───────────────────────────────────────────────────────────────

fn write_policy(
    def: &LoopDef,
    policy: RelayPolicy,
    relays: &mut impl RelayPort,
    counters: &mut RuntimeCounters,
) {
    for (id, on) in policy.writes(def) {
        relays.set_relay(id, on);
        counters.relay_writes += 1;
    }
}

/// Apply the outcome of one automaton call.
fn publish(
    slot: usize,
    def: &LoopDef,
    state: &LoopState,
    reaction: Reaction,
    relays: &mut impl RelayPort,
    sink: &mut impl EventSink,
    counters: &mut RuntimeCounters,
) {
    if reaction.relays_changed {
        write_policy(def, state.relays, relays, counters);
    }
    for notice in reaction.notices {
        let event = match notice {
            Notice::Transition {
                from,
                to,
                direction,
            } => {
                counters.transitions += 1;
                LoopEvent::StatusChanged {
                    slot,
                    from,
                    to,
                    direction,
                }
            }
            Notice::AmbiguousEntry => {
                counters.ambiguous_entries += 1;
                LoopEvent::AmbiguousEntry { slot }
            }
            Notice::OutageStarted => {
                counters.outages_started += 1;
                LoopEvent::OutageStarted { slot }
            }
            Notice::OutageCleared => LoopEvent::OutageCleared { slot },
            Notice::OutageTimeout { status } => {
                counters.outage_timeouts += 1;
                LoopEvent::OutageTimeout { slot, status }
            }
        };
        sink.emit(&event);
    }
}
