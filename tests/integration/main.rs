//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the loop service
//! against mock adapters.  All tests run on the host with no real
//! hardware required.

mod balloon_tests;
mod definition_tests;
mod mock_hw;
mod outage_tests;
mod station_tests;
