//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                     |
//! |------------|-------------|---------------------------------|
//! | `hardware` | RelayPort   | Relay bank (GPIO outputs)       |
//! | `log_sink` | EventSink   | Serial log output               |
//! | `scanner`  | (producer)  | Detector inputs → sensor bus    |
//! | `time`     | Clock       | ESP32 system timer / host clock |

pub mod hardware;
pub mod log_sink;
pub mod scanner;
pub mod time;
