//! Reversing and balloon loop controller.
//!
//! Exposes the pure-logic modules for integration testing and the
//! firmware binary. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod automaton;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod geometry;
pub mod safety;
pub mod sensors;

pub use error::{Error, Result};
