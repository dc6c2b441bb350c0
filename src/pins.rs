//! GPIO assignments for the loop controller board.
//!
//! Single source of truth: the firmware binary takes every pin from here
//! rather than hard-coding numbers.

// ---------------------------------------------------------------------------
// Polarity relays (relay board, one channel per relay id)
// ---------------------------------------------------------------------------

/// Relay ids 1..=4 in order.
pub const RELAY_GPIOS: [i32; 4] = [4, 5, 6, 7];

// ---------------------------------------------------------------------------
// Direct-wired detectors
// ---------------------------------------------------------------------------

/// `(sensor id, GPIO)` for each detector input.  Current-sense occupancy
/// detectors pull the line low when a train is present.
pub const SENSOR_INPUTS: [(u8, i32); 8] = [
    (1, 10),
    (2, 11),
    (3, 12),
    (4, 13),
    (5, 14),
    (6, 15),
    (7, 16),
    (8, 17),
];

/// Detector inputs are active low.
pub const SENSOR_ACTIVE_LOW: bool = true;
