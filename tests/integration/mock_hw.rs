//! Mock hardware for integration tests.
//!
//! Records every relay write and every emitted event so tests can assert
//! on the full history, and bundles the service with a private sensor
//! bus and a manual clock.

use loopcontrol::Result;
use loopcontrol::adapters::time::ManualClock;
use loopcontrol::app::commands::LoopCommand;
use loopcontrol::app::events::LoopEvent;
use loopcontrol::app::ports::{Clock, EventSink, RelayPort};
use loopcontrol::app::service::LoopService;
use loopcontrol::automaton::Status;
use loopcontrol::config::ControlConfig;
use loopcontrol::drivers::relay::{MAX_RELAYS, RelayId};
use loopcontrol::geometry::{LoopDef, Side};
use loopcontrol::sensors::{SensorId, SharedSensorBus};

// ── Relay recording ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingRelays {
    states: [bool; MAX_RELAYS + 1],
    pub writes: Vec<(RelayId, bool)>,
}

#[allow(dead_code)]
impl RecordingRelays {
    pub fn on(&self, id: RelayId) -> bool {
        self.is_relay_on(id)
    }

    /// Number of relays currently on among `ids`.
    pub fn energized(&self, ids: &[RelayId]) -> usize {
        ids.iter().filter(|&&id| self.on(id)).count()
    }
}

impl RelayPort for RecordingRelays {
    fn set_relay(&mut self, id: RelayId, on: bool) {
        if id == 0 || usize::from(id) > MAX_RELAYS {
            return;
        }
        self.states[usize::from(id)] = on;
        self.writes.push((id, on));
    }

    fn is_relay_on(&self, id: RelayId) -> bool {
        self.states.get(usize::from(id)).copied().unwrap_or(false)
    }
}

// ── Event recording ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<LoopEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    /// `(from, to)` pairs reported for `slot`, in order.
    pub fn transitions(&self, slot: usize) -> Vec<(Status, Status)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                LoopEvent::StatusChanged { slot: s, from, to, .. } if s == slot => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &LoopEvent) -> bool {
        self.events.contains(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LoopEvent) {
        self.events.push(*event);
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub service: LoopService,
    pub bus: SharedSensorBus,
    pub relays: RecordingRelays,
    pub clock: ManualClock,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControlConfig::default())
    }

    pub fn with_config(config: ControlConfig) -> Self {
        let mut h = Self {
            service: LoopService::new(config),
            bus: SharedSensorBus::new(),
            relays: RecordingRelays::default(),
            clock: ManualClock::new(1_000),
            sink: RecordingSink::default(),
        };
        h.service
            .start(&h.bus, &mut h.relays, &h.clock, &mut h.sink);
        h
    }

    pub fn command(&mut self, cmd: LoopCommand) -> Result<()> {
        self.service
            .handle_command(cmd, &self.bus, &mut self.relays, &self.clock, &mut self.sink)
    }

    pub fn define(&mut self, slot: usize, def: LoopDef) -> Result<()> {
        self.command(LoopCommand::DefineLoop { slot, def })
    }

    pub fn tick(&mut self) {
        self.service
            .tick(&self.bus, &mut self.relays, &self.clock, &mut self.sink);
    }

    /// Let `ms` pass, then run one tick.
    pub fn advance(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.tick();
    }

    /// Pin sensor `id` to `value` and let one tick process it.
    pub fn set(&mut self, id: SensorId, value: bool) {
        self.set_many(&[(id, value)]);
    }

    /// Change several sensors so they settle in the same cycle.
    pub fn set_many(&mut self, values: &[(SensorId, bool)]) {
        for &(id, value) in values {
            self.command(LoopCommand::OverrideSensor {
                id,
                value: Some(value),
            })
            .expect("override never fails");
        }
        self.advance(10);
    }

    /// Feed a raw bus observation taken now.
    pub fn raw(&mut self, id: SensorId, value: bool) {
        let now = self.clock.now_ms();
        self.bus.notify_raw_edge(id, value, now);
    }

    pub fn status(&self, slot: usize) -> Status {
        self.service.status(slot).expect("slot is active").0
    }

    pub fn direction(&self, slot: usize) -> Side {
        self.service.status(slot).expect("slot is active").1
    }
}
