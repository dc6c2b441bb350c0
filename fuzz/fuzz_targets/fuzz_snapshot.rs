//! Fuzz target: snapshot decoding and restore
//!
//! Arbitrary bytes must either decode into a table that restores cleanly
//! or be refused without touching the running table.
//!
//! cargo fuzz run fuzz_snapshot

#![no_main]

use libfuzzer_sys::fuzz_target;
use loopcontrol::app::table::LoopTable;
use loopcontrol::geometry::snapshot::decode_snapshot;
use loopcontrol::sensors::{MAX_SENSORS, SensorBus};

fuzz_target!(|data: &[u8]| {
    let Ok(defs) = decode_snapshot(data) else {
        return;
    };

    let mut table = LoopTable::new();
    let mut bus = SensorBus::new();
    let before = table.defs().to_vec();
    match table.restore(&defs, &mut bus) {
        Ok(loops) => {
            assert!(loops <= defs.len());
            assert!(bus.iter().count() <= MAX_SENSORS);
            for slot in table.active_slots() {
                assert!(table.def(slot).is_some_and(|d| d.validate().is_ok()));
            }
        }
        Err(_) => assert_eq!(table.defs(), &before[..]),
    }
});
