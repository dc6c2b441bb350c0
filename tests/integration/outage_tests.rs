//! Occupancy outages and ambiguous entries.

use loopcontrol::app::events::LoopEvent;
use loopcontrol::automaton::Status;
use loopcontrol::config::ControlConfig;
use loopcontrol::geometry::{Endpoint, LoopCore, LoopDef, SensorRef};

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

fn moving_then_silent(h: &mut Harness) {
    h.define(0, balloon()).unwrap();
    h.set(1, true);
    h.set(2, true);
    h.set(1, false);
    h.set(3, true);
    assert_eq!(h.status(0), Status::Armed);
    h.set(2, false);
}

#[test]
fn interior_outage_times_out_after_long_threshold() {
    let mut h = Harness::new();
    moving_then_silent(&mut h);
    assert_eq!(h.status(0), Status::Armed);
    assert!(h.sink.contains(&LoopEvent::OutageStarted { slot: 0 }));
    assert!(h.relays.on(1));

    h.advance(300_000);
    assert_eq!(h.status(0), Status::Armed, "threshold must be exceeded");
    h.advance(50);
    assert_eq!(h.status(0), Status::Idle);
    assert!(h.sink.contains(&LoopEvent::OutageTimeout {
        slot: 0,
        status: Status::Armed,
    }));
    assert!(!h.relays.on(1));
    assert_eq!(h.service.counters().outage_timeouts, 1);
}

#[test]
fn returning_occupancy_clears_the_outage() {
    let mut h = Harness::new();
    moving_then_silent(&mut h);
    h.advance(60_000);
    h.set(2, true);
    assert!(h.sink.contains(&LoopEvent::OutageCleared { slot: 0 }));
    assert_eq!(h.status(0), Status::Armed);

    h.advance(400_000);
    assert_eq!(h.status(0), Status::Armed);
}

#[test]
fn thresholds_follow_configuration() {
    let mut h = Harness::with_config(ControlConfig {
        outage_short_ms: 100,
        outage_long_ms: 1_000,
        ..ControlConfig::default()
    });
    moving_then_silent(&mut h);
    h.advance(1_050);
    assert_eq!(h.status(0), Status::Idle);
}

#[test]
fn report_flags_the_outage() {
    let mut h = Harness::new();
    moving_then_silent(&mut h);
    let report = h.service.report(0, &h.bus, &h.relays).unwrap();
    assert!(report.in_outage);
    assert_eq!(report.status.as_str(), "armed-right");
    assert_eq!(report.to_string(), "loop 0: armed-right [outage] occ=0 r1=on");
}

#[test]
fn tie_between_endpoints_stays_idle() {
    let mut h = Harness::new();
    let def = LoopDef::new(
        Endpoint::on_track(SensorRef::new(1)).with_relay(1, true, false),
        Endpoint::on_track(SensorRef::new(1)).with_relay(2, true, false),
        LoopCore::on_track(SensorRef::new(2)),
    );
    h.define(0, def).unwrap();
    h.set(1, true);

    assert_eq!(h.status(0), Status::Idle);
    assert!(h.sink.contains(&LoopEvent::AmbiguousEntry { slot: 0 }));
    assert_eq!(h.relays.energized(&[1, 2]), 0);
    assert_eq!(h.service.counters().ambiguous_entries, 1);
}
