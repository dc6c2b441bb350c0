//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing loop events to the logger (UART /
//! USB-CDC in production).  A console or network adapter would implement
//! the same trait.

use log::{info, warn};

use crate::app::events::LoopEvent;
use crate::app::ports::EventSink;
use crate::diagnostics::status_name;

/// Adapter that logs every [`LoopEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LoopEvent) {
        match *event {
            LoopEvent::Started => info!("START | relays off"),
            LoopEvent::LoopDefined { slot } => info!("DEF   | loop {slot} defined"),
            LoopEvent::LoopCleared { slot } => info!("DEF   | loop {slot} cleared"),
            LoopEvent::Restored { loops } => info!("DEF   | table restored, {loops} loops"),
            LoopEvent::StatusChanged {
                slot,
                from,
                to,
                direction,
            } => {
                info!(
                    "LOOP  | {slot}: {} -> {}",
                    from.name(),
                    status_name(to, direction)
                );
            }
            LoopEvent::AmbiguousEntry { slot } => {
                warn!("LOOP  | {slot}: both endpoints active, entry ignored")
            }
            LoopEvent::OutageStarted { slot } => warn!("OUTAGE| {slot}: started"),
            LoopEvent::OutageCleared { slot } => info!("OUTAGE| {slot}: cleared"),
            LoopEvent::OutageTimeout { slot, status } => {
                warn!("OUTAGE| {slot}: timed out in {}, idle", status.name())
            }
            LoopEvent::SensorsFreed { count } => info!("SENSOR| {count} unused freed"),
            LoopEvent::Reset => warn!("RESET | all loops idle"),
        }
    }
}
