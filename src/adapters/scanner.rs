//! GPIO bus scanner.
//!
//! Samples one input pin per sensor and feeds the raw levels into the
//! shared sensor bus.  Runs on its own cadence, independent of the main
//! tick; the bus debounces whatever it is given.
//!
//! On ESP-IDF the pins are `PinDriver` inputs; on the host any
//! `embedded_hal` input works, including [`SimInput`].

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};
use log::debug;

use crate::app::ports::Clock;
use crate::sensors::{SensorId, SharedSensorBus};

/// One wired input.
pub struct ScanInput<P: InputPin> {
    pub id: SensorId,
    pub pin: P,
    /// Detector pulls the line low when occupied.
    pub active_low: bool,
}

pub struct GpioScanner<P: InputPin, const N: usize> {
    inputs: [ScanInput<P>; N],
}

impl<P: InputPin, const N: usize> GpioScanner<P, N> {
    pub fn new(inputs: [ScanInput<P>; N]) -> Self {
        Self { inputs }
    }

    /// Sample every input once and hand the levels to the bus.  A pin that
    /// cannot be read is skipped for this scan.
    pub fn scan(&mut self, bus: &SharedSensorBus, clock: &impl Clock) {
        let now = clock.now_ms();
        bus.begin_scan(now);
        for input in &mut self.inputs {
            match input.pin.is_high() {
                Ok(high) => bus.notify_raw_edge(input.id, high != input.active_low, now),
                Err(_) => debug!("sensor {}: input read failed", input.id),
            }
        }
    }
}

/// Host-side input whose level is set by hand.
#[derive(Debug, Default)]
pub struct SimInput {
    high: Cell<bool>,
}

impl SimInput {
    pub fn set_high(&self, high: bool) {
        self.high.set(high);
    }
}

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high.get())
    }
}
