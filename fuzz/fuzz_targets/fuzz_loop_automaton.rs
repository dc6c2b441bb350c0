//! Fuzz target: `LoopService` driven by arbitrary sensor traffic
//!
//! Two bytes per step: the first picks a sensor of a station loop and its
//! new value (or a command), the second advances the clock.  The service
//! must never panic, and idle loops must always leave both relays off.
//!
//! cargo fuzz run fuzz_loop_automaton

#![no_main]

use libfuzzer_sys::fuzz_target;
use loopcontrol::adapters::time::ManualClock;
use loopcontrol::app::commands::LoopCommand;
use loopcontrol::app::events::LoopEvent;
use loopcontrol::app::ports::{Clock, EventSink, RelayPort};
use loopcontrol::app::service::LoopService;
use loopcontrol::automaton::Status;
use loopcontrol::config::ControlConfig;
use loopcontrol::drivers::relay::RelayBank;
use loopcontrol::geometry::{Endpoint, LoopCore, LoopDef, SensorRef};
use loopcontrol::sensors::SharedSensorBus;

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &LoopEvent) {}
}

fn station() -> LoopDef {
    LoopDef::new(
        Endpoint::on_track(SensorRef::new(1))
            .with_turnout(SensorRef::new(3))
            .with_triggers(SensorRef::new(5), SensorRef::new(6))
            .with_relay(1, true, false),
        Endpoint::on_track(SensorRef::new(4))
            .with_short_track(SensorRef::new(7))
            .with_relay(2, true, false),
        LoopCore::split(SensorRef::new(2), SensorRef::new(8)),
    )
}

fuzz_target!(|data: &[u8]| {
    let bus = SharedSensorBus::new();
    let mut relays = RelayBank::simulated(true);
    let clock = ManualClock::new(0);
    let mut sink = NullSink;
    let mut service = LoopService::new(ControlConfig::default());
    service.start(&bus, &mut relays, &clock, &mut sink);
    if service
        .handle_command(
            LoopCommand::DefineLoop { slot: 0, def: station() },
            &bus,
            &mut relays,
            &clock,
            &mut sink,
        )
        .is_err()
    {
        return;
    }

    for pair in data.chunks_exact(2) {
        let (op, wait) = (pair[0], pair[1]);
        let id = (op & 0x07) + 1;
        let cmd = match op >> 3 {
            0..=13 => LoopCommand::OverrideSensor { id, value: Some(op & 0x80 != 0) },
            14..=19 => LoopCommand::OverrideSensor { id, value: None },
            20 => LoopCommand::SuspendSensor(id),
            21 => LoopCommand::ResumeSensor(id),
            22 => LoopCommand::Reset,
            _ => {
                bus.notify_raw_edge(id, op & 0x01 != 0, clock.now_ms());
                clock.advance(u64::from(wait) * 13);
                service.tick(&bus, &mut relays, &clock, &mut sink);
                continue;
            }
        };
        let _ = service.handle_command(cmd, &bus, &mut relays, &clock, &mut sink);
        clock.advance(u64::from(wait) * u64::from(wait));
        service.tick(&bus, &mut relays, &clock, &mut sink);

        if let Some((Status::Idle, _)) = service.status(0) {
            assert!(!relays.is_relay_on(1) && !relays.is_relay_on(2));
        }
    }
});

