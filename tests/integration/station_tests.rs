//! Station loops: distinct endpoints, each with its own relay.

use loopcontrol::app::events::LoopEvent;
use loopcontrol::automaton::Status;
use loopcontrol::geometry::{Endpoint, LoopCore, LoopDef, SensorRef, Side};

use crate::mock_hw::Harness;

/// Left track 1 behind turnout 3, relay 1; right track 4, relay 2.
fn station() -> LoopDef {
    LoopDef::new(
        Endpoint::on_track(SensorRef::new(1))
            .with_turnout(SensorRef::new(3))
            .with_relay(1, true, false),
        Endpoint::on_track(SensorRef::new(4)).with_relay(2, true, false),
        LoopCore::on_track(SensorRef::new(2)),
    )
}

/// Left endpoint guarded by inbound trigger 5 and outbound trigger 6.
fn triggered() -> LoopDef {
    LoopDef::new(
        Endpoint::on_track(SensorRef::new(1))
            .with_triggers(SensorRef::new(5), SensorRef::new(6))
            .with_relay(1, true, false),
        Endpoint::on_track(SensorRef::new(4)).with_relay(2, true, false),
        LoopCore::on_track(SensorRef::new(2)),
    )
}

/// Right endpoint confirms exits with outbound trigger 7.
fn exit_triggered() -> LoopDef {
    LoopDef::new(
        Endpoint::on_track(SensorRef::new(1)).with_relay(1, true, false),
        Endpoint::on_track(SensorRef::new(4))
            .with_triggers(SensorRef::NONE, SensorRef::new(7))
            .with_relay(2, true, false),
        LoopCore::on_track(SensorRef::new(2)),
    )
}

fn armed_by_exit_trigger() -> Harness {
    let mut h = Harness::new();
    h.define(0, exit_triggered()).unwrap();
    h.set(1, true);
    h.set(2, true);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Moving);
    h.set(7, true);
    assert_eq!(h.status(0), Status::Armed);
    assert!(h.relays.on(2) && !h.relays.on(1));
    h
}

#[test]
fn pass_left_to_right() {
    let mut h = Harness::new();
    h.define(0, station()).unwrap();

    h.set(3, true);
    h.set(1, true);
    assert_eq!(h.status(0), Status::Approach);
    assert_eq!(h.direction(0), Side::Right);
    assert!(h.relays.on(1) && !h.relays.on(2));

    h.set(2, true);
    assert_eq!(h.status(0), Status::Entering);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Armed, "free exit arms at once");
    assert!(!h.relays.on(1) && h.relays.on(2));

    h.set(4, true);
    assert_eq!(h.status(0), Status::Exiting);
    h.set(2, false);
    assert_eq!(h.status(0), Status::Exited);
    h.set(4, false);
    assert_eq!(h.status(0), Status::Idle);
    assert_eq!(h.relays.energized(&[1, 2]), 0);
}

#[test]
fn false_start_returns_to_idle() {
    let mut h = Harness::new();
    h.define(0, station()).unwrap();
    h.set(4, true);
    assert_eq!(h.status(0), Status::Approach);
    assert_eq!(h.direction(0), Side::Left);
    assert!(h.relays.on(2));

    h.set(4, false);
    assert_eq!(h.status(0), Status::Idle);
    assert_eq!(h.relays.energized(&[1, 2]), 0);
}

#[test]
fn short_train_goes_straight_to_moving() {
    let mut h = Harness::new();
    h.define(0, station()).unwrap();
    h.set(4, true);
    h.set_many(&[(4, false), (2, true)]);
    assert_eq!(h.status(0), Status::Moving);
    assert_eq!(h.direction(0), Side::Left);
}

#[test]
fn backing_out_of_the_entry_is_an_exit() {
    let mut h = Harness::new();
    h.define(0, station()).unwrap();
    h.set(3, true);
    h.set(1, true);
    h.set(2, true);
    h.set(2, false);
    assert_eq!(h.status(0), Status::Exited);
    assert_eq!(h.direction(0), Side::Left);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Idle);
}

#[test]
fn inbound_trigger_energizes_entry_only_in_ready_enter() {
    let mut h = Harness::new();
    h.define(0, triggered()).unwrap();

    h.set(1, true);
    assert_eq!(h.status(0), Status::Idle);
    h.set(5, true);
    assert_eq!(h.status(0), Status::Approach);
    assert!(h.relays.on(2) && !h.relays.on(1), "far side pre-armed");

    // The next sweep finds the trigger marked and the core free.
    h.advance(50);
    assert_eq!(h.status(0), Status::ReadyEnter);
    assert!(h.relays.on(1) && !h.relays.on(2));

    h.set(2, true);
    assert_eq!(h.status(0), Status::Entering);
}

#[test]
fn exit_arms_after_entry_trigger_settles() {
    let mut h = Harness::new();
    h.define(0, triggered()).unwrap();
    h.set(1, true);
    h.set(5, true);
    h.set(2, true);
    h.set(5, false);
    h.set(1, false);
    assert_eq!(h.status(0), Status::Moving);
    assert!(h.relays.on(1));

    h.advance(200);
    assert_eq!(h.status(0), Status::Moving, "tail may still be on the trigger");
    h.advance(400);
    assert_eq!(h.status(0), Status::Armed);
    assert!(h.relays.on(2) && !h.relays.on(1));
}

#[test]
fn loops_react_independently() {
    let mut h = Harness::new();
    h.define(0, station()).unwrap();
    let other = LoopDef::new(
        Endpoint::on_track(SensorRef::new(10)).with_relay(3, true, false),
        Endpoint::on_track(SensorRef::new(12)).with_relay(4, true, false),
        LoopCore::on_track(SensorRef::new(11)),
    );
    h.define(1, other).unwrap();

    h.set(10, true);
    assert_eq!(h.status(1), Status::Approach);
    assert_eq!(h.status(0), Status::Idle);
    assert!(h.relays.on(3));
    assert_eq!(h.relays.energized(&[1, 2]), 0);
    assert!(h.sink.transitions(0).is_empty());
}

#[test]
fn quiet_exit_trigger_disarms() {
    let mut h = armed_by_exit_trigger();
    h.set(7, false);
    h.advance(450);
    assert_eq!(h.status(0), Status::Armed);
    h.advance(100);
    assert_eq!(h.status(0), Status::Moving);
    assert_eq!(h.direction(0), Side::Right);
    assert!(h.relays.on(2) && !h.relays.on(1));
}

#[test]
fn exit_completes_once_the_trigger_settles() {
    let mut h = armed_by_exit_trigger();
    h.set(4, true);
    assert_eq!(h.status(0), Status::Exiting);
    h.set(2, false);
    h.set(7, false);
    assert_eq!(h.status(0), Status::Exiting);

    h.advance(600);
    assert_eq!(h.status(0), Status::Exited);
    assert!(h.relays.on(2));
    h.set(4, false);
    assert_eq!(h.status(0), Status::Idle);
    assert_eq!(h.relays.energized(&[1, 2]), 0);
}

#[test]
fn exit_track_clearing_before_the_trigger_settles_goes_idle() {
    let mut h = armed_by_exit_trigger();
    h.set(4, true);
    h.set(2, false);
    h.set(4, false);
    assert!(h.sink.contains(&LoopEvent::OutageStarted { slot: 0 }));
    h.set(7, false);

    h.advance(600);
    assert_eq!(h.status(0), Status::Idle);
    assert_eq!(h.relays.energized(&[1, 2]), 0);
    assert!(h.sink.contains(&LoopEvent::OutageCleared { slot: 0 }));

    h.advance(20_000);
    assert_eq!(h.service.counters().outage_timeouts, 0);
    assert!(
        !h.sink
            .events
            .iter()
            .any(|e| matches!(e, LoopEvent::OutageTimeout { .. }))
    );
}

#[test]
fn core_reoccupied_during_exit_turns_back() {
    let mut h = armed_by_exit_trigger();
    h.set(4, true);
    h.set(2, false);
    h.set(2, true);
    assert_eq!(h.status(0), Status::Entering);
    assert_eq!(h.direction(0), Side::Left);
    assert!(h.relays.on(2) && !h.relays.on(1));
}
