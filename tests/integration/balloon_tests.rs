//! Balloon loop: both endpoints share track 1 and relay 1; turnout 3
//! decides which end of the loop the track connects to.

use loopcontrol::app::events::LoopEvent;
use loopcontrol::automaton::Status;
use loopcontrol::geometry::{Endpoint, LoopCore, LoopDef, SensorRef, Side};

use crate::mock_hw::Harness;

fn balloon() -> LoopDef {
    LoopDef::new(
        Endpoint::on_track(SensorRef::new(1))
            .with_turnout(SensorRef::inverted(3))
            .with_relay(1, false, false),
        Endpoint::on_track(SensorRef::new(1))
            .with_turnout(SensorRef::new(3))
            .with_relay(1, true, false),
        LoopCore::on_track(SensorRef::new(2)),
    )
}

fn defined() -> Harness {
    let mut h = Harness::new();
    h.define(0, balloon()).unwrap();
    h
}

#[test]
fn definition_starts_idle_with_relay_off() {
    let h = defined();
    assert_eq!(h.status(0), Status::Idle);
    assert_eq!(h.direction(0), Side::Left);
    assert!(!h.relays.on(1));
    assert!(h.sink.contains(&LoopEvent::Started));
    assert!(h.sink.contains(&LoopEvent::LoopDefined { slot: 0 }));
}

#[test]
fn full_trip_reverses_polarity_once() {
    let mut h = defined();

    h.set(1, true);
    h.set(2, true);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Moving);
    assert!(!h.relays.on(1), "aligned with the entry");

    h.set(3, true);
    assert_eq!(h.status(0), Status::Armed);
    assert!(h.relays.on(1), "aligned with the exit");

    h.set(1, true);
    h.set(2, false);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Idle);
    assert!(!h.relays.on(1));

    assert_eq!(
        h.sink.transitions(0),
        [
            (Status::Idle, Status::Approach),
            (Status::Approach, Status::Entering),
            (Status::Entering, Status::Moving),
            (Status::Moving, Status::Armed),
            (Status::Armed, Status::Exiting),
            (Status::Exiting, Status::Exited),
            (Status::Exited, Status::Idle),
        ]
    );
    assert_eq!(h.service.counters().transitions, 7);
}

#[test]
fn turnout_thrown_back_while_armed_keeps_polarity() {
    let mut h = defined();
    h.set(1, true);
    h.set(2, true);
    h.set(1, false);
    h.set(3, true);
    assert!(h.relays.on(1));

    h.set(3, false);
    assert_eq!(h.status(0), Status::Moving);
    assert!(h.relays.on(1), "no triggers on either side to justify a flip");
}

#[test]
fn reversal_in_the_core_leaves_by_the_entry() {
    let mut h = defined();
    h.set(1, true);
    h.set(2, true);
    h.set(1, false);
    assert_eq!(h.direction(0), Side::Right);

    h.set(1, true);
    assert_eq!(h.status(0), Status::Exiting);
    assert_eq!(h.direction(0), Side::Left);
    assert!(!h.relays.on(1));
}

#[test]
fn reset_with_train_in_core_resolves_to_occupied() {
    let mut h = defined();
    h.set(1, true);
    h.set(2, true);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Moving);

    h.command(loopcontrol::app::commands::LoopCommand::Reset)
        .unwrap();
    assert!(h.sink.contains(&LoopEvent::Reset));
    assert_eq!(h.status(0), Status::Occupied);
    assert!(!h.relays.on(1));
}

#[test]
fn raw_bus_edges_are_debounced() {
    let mut h = defined();

    // Track sensors go active after 1 ms but need 800 ms to drop.
    h.raw(2, true);
    h.advance(10);
    assert_eq!(h.status(0), Status::Occupied);

    h.raw(2, false);
    h.advance(100);
    assert_eq!(h.status(0), Status::Occupied);
    h.advance(700);
    assert_eq!(h.status(0), Status::Idle);
}

#[test]
fn suspended_sensor_holds_its_value() {
    let mut h = defined();
    h.raw(2, true);
    h.advance(10);
    assert_eq!(h.status(0), Status::Occupied);

    h.command(loopcontrol::app::commands::LoopCommand::SuspendSensor(2))
        .unwrap();
    h.raw(2, false);
    h.advance(1_000);
    assert_eq!(h.status(0), Status::Occupied);

    h.command(loopcontrol::app::commands::LoopCommand::ResumeSensor(2))
        .unwrap();
    h.advance(10);
    assert_eq!(h.status(0), Status::Idle);
}
