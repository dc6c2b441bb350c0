//! Fuzz target: `SensorBus` debounce
//!
//! Each input byte is one bus event: the low three bits pick a sensor,
//! the next two pick the action, and the top three advance the clock.
//! Checks that a cycle never reports a sensor twice and that reported
//! values always match `read`.
//!
//! cargo fuzz run fuzz_sensor_bus

#![no_main]

use libfuzzer_sys::fuzz_target;
use loopcontrol::sensors::{SensorBus, SensorRead};

fuzz_target!(|data: &[u8]| {
    let mut bus = SensorBus::new();
    for id in 1..=8u8 {
        let _ = bus.define(id, id % 2 == 0);
    }

    let mut now = 0u64;
    for &byte in data {
        let id = (byte & 0x07) + 1;
        now += u64::from(byte >> 5) * 37;
        match (byte >> 3) & 0x03 {
            0 => bus.notify_raw_edge(id, true, now),
            1 => bus.notify_raw_edge(id, false, now),
            2 => bus.override_sensor(id, if byte & 0x80 != 0 { Some(true) } else { None }),
            _ => {
                if byte & 0x40 != 0 {
                    bus.suspend(id)
                } else {
                    bus.resume(id)
                }
            }
        }
        if byte & 0x20 != 0 {
            bus.begin_scan(now);
        }

        let batch = bus.run_cycle(now);
        for (i, change) in batch.iter().enumerate() {
            assert!(
                batch[..i].iter().all(|c| c.id != change.id),
                "sensor reported twice in one cycle"
            );
            assert_eq!(bus.read(change.id), change.value);
        }
    }
});
