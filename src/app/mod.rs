//! Application core: loop orchestration with zero direct I/O.
//!
//! This module wires the automaton to the loop table and turns sensor
//! changes into relay writes and events.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod table;
