// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Compile-time configuration for the module.
//!
//! Timings are in milliseconds, factors in percent of a measured reference travel time, PWM duty
//! presets on a 0..=255 scale.

use crate::time::Duration;

// ----- Sensors -----

/// Consecutive agreeing raw samples required before a sensor's logical state flips.
pub const SENSOR_REQUIRED_COUNT: u8 = 5;

/// Minimum spacing between two discrete button press events.
pub const BUTTON_DEBOUNCE_DELAY: Duration = Duration::millis(100);

// ----- Motion -----

/// Relay hold before a direction change is applied.
pub const RELAY_PRE_CHANGE_DELAY: Duration = Duration::millis(100);

/// Relay hold after a move ends, before the motor may be commanded again.
pub const RELAY_POST_CHANGE_DELAY: Duration = Duration::millis(150);

/// De-energized hold after a motion fault, before the reversal attempt.
pub const SAFETY_REVERSE_DELAY: Duration = Duration::millis(2000);

/// Number of safety reversals a motor may attempt before it is faulted. Shared by the early
/// endstop and the travel timeout faults, reset whenever a move ends on its endstop.
pub const SAFETY_REVERSE_RETRIES: u8 = 1;

// ----- Calibration -----

/// Settle time before each calibration drive.
pub const CAL_STAGE_DELAY: Duration = Duration::millis(3000);

/// Upper bound on a single calibration drive.
pub const CAL_TIMEOUT: Duration = Duration::millis(10_000);

/// Time the resting endstop has to release once a motor of unknown orientation is driven forward.
/// If it stays engaged the motor is taken to be at its forward end.
pub const CAL_RELEASE_TIMEOUT: Duration = Duration::millis(1500);

/// Default minimum plausible travel time, percent of the reference time.
pub const NEAR_FACTOR: u8 = 10;

/// Default point at which the motor drops to slow speed, percent of the reference time.
pub const SLOWDOWN_FACTOR: u8 = 95;

/// Default travel timeout, percent of the reference time (plus [`TIMEOUT_BUFFER_MS`]).
pub const TIMEOUT_FACTOR: u8 = 150;

/// Fixed slack added to every travel timeout.
pub const TIMEOUT_BUFFER_MS: u16 = 1000;

/// Placeholder reference time used when no calibration record is available.
pub const DEFAULT_REFERENCE_MS: u16 = 5000;

// ----- Power stage -----

/// Slow duty per motor (elevator, cart, loader).
pub const PWM_SPEED_SLOW: [u8; 3] = [150, 255, 200];

/// Fast duty per motor (elevator, cart, loader).
pub const PWM_SPEED_FAST: [u8; 3] = [255, 255, 255];

/// Loader electromagnet duty.
pub const PWM_MAGNET: u8 = 255;

// ----- Audio -----

/// Time the ISD1700 needs after a power-up command.
pub const ISD_POWER_UP_DELAY: Duration = Duration::millis(50);

/// APC2 register value written at init (volume, output and playback options).
pub const ISD_APC_CONFIG: u16 = (0b0000_0100 << 8) | 0b1010_0000;

/// Quiet gap enforced after a blocking beep.
pub const BEEP_DELAY: Duration = Duration::millis(150);

// ----- Error display -----

/// Number of error codes. The highest one is the critical code.
pub const ERROR_CODES: u8 = 10;

/// Length of one tick of the blink cycle. A cycle is [`ERROR_CODES`] ticks.
pub const ERROR_TICK_TIME: Duration = Duration::millis(250);

/// On-time of a single blink within a tick.
pub const ERROR_BLINK_TIME: Duration = Duration::millis(100);

/// Calibration drive ran out of time.
pub const ERR_CAL_TIMEOUT: u8 = 7;

/// An unexpected endstop was engaged while validating wiring.
pub const ERR_CAL_WIRING: u8 = 8;

/// The calibration record could not be read or written.
pub const ERR_STORE: u8 = 9;

/// Rig halted. Clears every other code when flagged.
pub const ERR_CRITICAL: u8 = ERROR_CODES;
