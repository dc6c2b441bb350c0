//! Definition, clearing, snapshot restore and sensor housekeeping.

use loopcontrol::Error;
use loopcontrol::app::commands::LoopCommand;
use loopcontrol::app::events::LoopEvent;
use loopcontrol::automaton::Status;
use loopcontrol::config::ControlConfig;
use loopcontrol::error::ConfigError;
use loopcontrol::geometry::{Endpoint, LoopCore, LoopDef, MAX_LOOPS, SensorRef};

use crate::mock_hw::Harness;

fn station(base: u8, relay: u8) -> LoopDef {
    LoopDef::new(
        Endpoint::on_track(SensorRef::new(base)).with_relay(relay, true, false),
        Endpoint::on_track(SensorRef::new(base + 2)),
        LoopCore::on_track(SensorRef::new(base + 1)),
    )
}

#[test]
fn refused_definition_changes_nothing() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    let writes = h.relays.writes.len();
    let sensors = h.service.sensor_reports(&h.bus).len();

    // Sensor 2 is loop 0's core; loop 1 wants it as a boundary trigger.
    let mut clash = station(10, 2);
    clash.left = clash
        .left
        .with_triggers(SensorRef::new(2), SensorRef::NONE);
    assert_eq!(
        h.define(1, clash),
        Err(Error::Config(ConfigError::SensorRoleConflict(2)))
    );

    assert!(h.service.status(1).is_none());
    assert!(!h.sink.contains(&LoopEvent::LoopDefined { slot: 1 }));
    assert_eq!(h.relays.writes.len(), writes);
    assert_eq!(h.service.sensor_reports(&h.bus).len(), sensors);
}

#[test]
fn malformed_definitions_are_refused() {
    let mut h = Harness::new();
    let mut no_core = station(1, 1);
    no_core.core = LoopCore::default();
    assert_eq!(
        h.define(0, no_core),
        Err(Error::Config(ConfigError::CoreWithoutTrack))
    );
    assert_eq!(
        h.define(MAX_LOOPS, station(1, 1)),
        Err(Error::Config(ConfigError::LoopSlotOutOfRange(MAX_LOOPS)))
    );
    let mut bad_relay = station(1, 1);
    bad_relay.right = bad_relay.right.with_relay(9, true, false);
    assert_eq!(
        h.define(0, bad_relay),
        Err(Error::Config(ConfigError::RelayOutOfRange(9)))
    );
}

#[test]
fn redefinition_returns_old_relay_to_off() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    h.set(1, true);
    assert_eq!(h.status(0), Status::Approach);
    assert!(h.relays.on(1));

    h.define(0, station(10, 2)).unwrap();
    assert!(!h.relays.on(1));
    assert_eq!(h.status(0), Status::Idle);
}

#[test]
fn clearing_a_loop_releases_its_relays() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    h.set(1, true);
    assert!(h.relays.on(1));

    h.command(LoopCommand::ClearLoop(0)).unwrap();
    assert!(!h.relays.on(1));
    assert!(h.service.status(0).is_none());
    assert!(h.sink.contains(&LoopEvent::LoopCleared { slot: 0 }));

    // Sensors stay registered until freed.
    assert_eq!(h.service.sensor_reports(&h.bus).len(), 3);
    h.command(LoopCommand::FreeUnusedSensors).unwrap();
    assert!(h.sink.contains(&LoopEvent::SensorsFreed { count: 3 }));
    assert!(h.service.sensor_reports(&h.bus).is_empty());
}

#[test]
fn snapshot_restores_into_a_fresh_controller() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    h.define(3, station(10, 2)).unwrap();
    h.set(1, true);
    let snapshot = h.service.snapshot().unwrap();

    let mut fresh = Harness::new();
    fresh
        .command(LoopCommand::RestoreSnapshot(snapshot))
        .unwrap();
    assert!(fresh.sink.contains(&LoopEvent::Restored { loops: 2 }));
    assert_eq!(fresh.status(0), Status::Idle, "runtime state is not persisted");
    assert_eq!(fresh.status(3), Status::Idle);
    assert_eq!(fresh.service.sensor_reports(&fresh.bus).len(), 6);

    fresh.set(10, true);
    assert_eq!(fresh.status(3), Status::Approach);
    assert!(fresh.relays.on(2));
}

#[test]
fn corrupted_snapshot_keeps_the_current_table() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    assert_eq!(
        h.command(LoopCommand::RestoreSnapshot(vec![0xff; 7])),
        Err(Error::Config(ConfigError::CorruptedSnapshot))
    );
    assert_eq!(h.status(0), Status::Idle);
}

#[test]
fn snapshot_with_trailing_bytes_is_refused() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    let mut snapshot = h.service.snapshot().unwrap();
    snapshot.push(0);

    let mut fresh = Harness::new();
    assert_eq!(
        fresh.command(LoopCommand::RestoreSnapshot(snapshot)),
        Err(Error::Config(ConfigError::CorruptedSnapshot))
    );
    assert!(!fresh.service.table().def(0).is_some_and(|d| d.active));
}

#[test]
fn unspecified_settle_timeout_takes_the_controller_setting() {
    let mut h = Harness::with_config(ControlConfig {
        settle_timeout_ms: 800,
        ..ControlConfig::default()
    });
    h.define(0, station(1, 1)).unwrap();
    h.define(1, station(10, 2).with_settle_timeout(500)).unwrap();

    let settle = |slot| h.service.table().def(slot).and_then(|d| d.settle_timeout_ms);
    assert_eq!(settle(0), Some(800));
    assert_eq!(settle(1), Some(500), "an explicit 500 is not a placeholder");
}

#[test]
fn restore_picks_up_a_train_already_in_the_core() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    h.set(2, true);
    assert_eq!(h.status(0), Status::Occupied);

    let table = h.service.table().defs().to_vec();
    h.command(LoopCommand::Restore(table)).unwrap();
    assert_eq!(h.status(0), Status::Occupied);
}

#[test]
fn definition_over_an_occupied_endpoint_exits_toward_it() {
    let mut h = Harness::new();
    h.define(0, station(1, 1)).unwrap();
    h.set_many(&[(2, true), (3, true)]);

    // Redefining restarts the loop from what the sensors show.
    h.define(0, station(1, 1)).unwrap();
    assert_eq!(h.status(0), Status::Exiting);
    assert_eq!(
        h.direction(0),
        loopcontrol::geometry::Side::Right
    );
}
