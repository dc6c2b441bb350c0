//! Loop controller firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  bus-scan thread                 main thread                  │
//! │  GpioScanner ──raw edges──▶ static BUS ◀──run_cycle/read──┐   │
//! │  (scan_interval_ms)        (SharedSensorBus)              │   │
//! │                                               LoopService │   │
//! │                          RelayBank ◀── RelayPort ─────────┘   │
//! │                          LogEventSink ◀── EventSink           │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sensor table is the only state the two threads share.  Everything
//! else (loop table, automaton, relays) belongs to the main thread.
#![deny(unused_must_use)]

mod pins;

use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver, Pull};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use log::{info, warn};

use loopcontrol::adapters::log_sink::LogEventSink;
use loopcontrol::adapters::scanner::{GpioScanner, ScanInput};
use loopcontrol::adapters::time::MonotonicClock;
use loopcontrol::app::commands::LoopCommand;
use loopcontrol::app::service::LoopService;
use loopcontrol::config::ControlConfig;
use loopcontrol::drivers::relay::RelayBank;
use loopcontrol::sensors::SharedSensorBus;

/// Shared with the scanner thread.
static BUS: SharedSensorBus = SharedSensorBus::new();

const NVS_NAMESPACE: &str = "loopctl";
const NVS_TABLE_KEY: &str = "table";

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("loopcontrol v{}", env!("CARGO_PKG_VERSION"));

    let config = ControlConfig::default();
    config.validate().map_err(|e| anyhow!("config: {e}"))?;

    // ── 2. Relay outputs ──────────────────────────────────────
    let mut outputs = Vec::with_capacity(pins::RELAY_GPIOS.len());
    for gpio in pins::RELAY_GPIOS {
        // SAFETY: each GPIO in `pins` is claimed exactly once.
        outputs.push(PinDriver::output(unsafe { AnyOutputPin::new(gpio) })?);
    }
    let outputs = outputs
        .try_into()
        .map_err(|_| anyhow!("relay pin count mismatch"))?;
    let mut relays = RelayBank::new(outputs, config.relay_active_high);
    if let Err(e) = relays.all_off() {
        warn!("relay reset at boot: {e}");
    }

    // ── 3. Detector inputs + scanner thread ───────────────────
    let mut inputs = Vec::with_capacity(pins::SENSOR_INPUTS.len());
    for (id, gpio) in pins::SENSOR_INPUTS {
        // SAFETY: as above.
        let mut pin = PinDriver::input(unsafe { AnyInputPin::new(gpio) })?;
        pin.set_pull(Pull::Up)?;
        inputs.push(ScanInput {
            id,
            pin,
            active_low: pins::SENSOR_ACTIVE_LOW,
        });
    }
    let inputs = inputs
        .try_into()
        .map_err(|_| anyhow!("sensor pin count mismatch"))?;
    let mut scanner = GpioScanner::new(inputs);

    let scan_every = Duration::from_millis(u64::from(config.scan_interval_ms));
    thread::Builder::new()
        .name("bus-scan".into())
        .stack_size(4096)
        .spawn(move || {
            let clock = MonotonicClock::new();
            loop {
                scanner.scan(&BUS, &clock);
                thread::sleep(scan_every);
            }
        })?;

    // ── 4. Service + stored loop table ────────────────────────
    let clock = MonotonicClock::new();
    let mut sink = LogEventSink::new();
    let mut service = LoopService::new(config.clone());
    service.start(&BUS, &mut relays, &clock, &mut sink);

    let nvs = EspNvs::new(EspDefaultNvsPartition::take()?, NVS_NAMESPACE, true)?;
    let mut buf = [0u8; 2048];
    match nvs.get_raw(NVS_TABLE_KEY, &mut buf) {
        Ok(Some(bytes)) => {
            let cmd = LoopCommand::RestoreSnapshot(bytes.to_vec());
            if let Err(e) = service.handle_command(cmd, &BUS, &mut relays, &clock, &mut sink) {
                warn!("stored loop table refused ({e}), starting empty");
            }
        }
        Ok(None) => info!("no stored loop table"),
        Err(e) => warn!("loop table read failed: {e}"),
    }

    // ── 5. Main loop ──────────────────────────────────────────
    let tick_every = Duration::from_millis(u64::from(config.tick_interval_ms));
    info!("entering main loop ({} ms tick)", config.tick_interval_ms);
    loop {
        service.tick(&BUS, &mut relays, &clock, &mut sink);
        thread::sleep(tick_every);
    }
}
