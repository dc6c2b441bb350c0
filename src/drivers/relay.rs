//! Polarity relay bank.
//!
//! Each relay is one digital output.  The automaton speaks in logical
//! on/off; the physical level meaning "on" is a single polarity flag fixed
//! when the bank is built (relay boards exist in both active-low and
//! active-high variants).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: pins are `esp_idf_hal::gpio::PinDriver` outputs.
//! On host/test: [`SimPin`] records the level in memory.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, PinState};

use crate::error::RelayError;

/// Relay identifier.  `0` means "no relay".
pub type RelayId = u8;

pub const NO_RELAY: RelayId = 0;

/// Number of relays on the board.
pub const MAX_RELAYS: usize = 4;

/// Fixed bank of relay outputs addressed by 1-based [`RelayId`].
pub struct RelayBank<P: OutputPin, const N: usize = MAX_RELAYS> {
    pins: [P; N],
    states: [bool; N],
    active_high: bool,
}

impl<P: OutputPin, const N: usize> RelayBank<P, N> {
    /// Take ownership of the output pins.  Pins are not touched until the
    /// first write; call [`all_off`](Self::all_off) at startup.
    pub fn new(pins: [P; N], active_high: bool) -> Self {
        Self {
            pins,
            states: [false; N],
            active_high,
        }
    }

    /// Drive relay `id` to the logical value `on`.
    pub fn try_set(&mut self, id: RelayId, on: bool) -> Result<(), RelayError> {
        let idx = Self::index(id).ok_or(RelayError::OutOfRange(id))?;
        let level = PinState::from(on == self.active_high);
        self.pins[idx]
            .set_state(level)
            .map_err(|_| RelayError::PinWriteFailed(id))?;
        self.states[idx] = on;
        Ok(())
    }

    /// Logical state last written to `id`; `false` for unknown ids.
    pub fn is_on(&self, id: RelayId) -> bool {
        Self::index(id).is_some_and(|idx| self.states[idx])
    }

    /// Switch every relay off.  Returns the first failure, after trying all.
    pub fn all_off(&mut self) -> Result<(), RelayError> {
        let mut first_err = None;
        for id in 1..=N as RelayId {
            if let Err(e) = self.try_set(id, false) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn pin(&self, id: RelayId) -> Option<&P> {
        Self::index(id).map(|idx| &self.pins[idx])
    }

    fn index(id: RelayId) -> Option<usize> {
        let id = usize::from(id);
        (1..=N).contains(&id).then(|| id - 1)
    }
}

// ---------------------------------------------------------------------------
// Simulated output pin
// ---------------------------------------------------------------------------

/// In-memory output pin for host builds and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimPin {
    high: bool,
}

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.high
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

impl RelayBank<SimPin, MAX_RELAYS> {
    /// Bank of simulated pins.
    pub fn simulated(active_high: bool) -> Self {
        Self::new([SimPin::default(); MAX_RELAYS], active_high)
    }
}
