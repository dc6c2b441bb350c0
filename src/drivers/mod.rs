//! Output drivers.

pub mod relay;
