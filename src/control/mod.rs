// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Control
//!
//! Non-blocking state machines that run the module.
//!
//! ## Modules
//!
//! - [`engine`] - Per-motor motion state machine with safety reversal.
//! - [`calibration`] - Endstop validation and travel-time measurement.
//! - [`rig`] - The control loop tying sensors, engines and drivers together.

pub mod calibration;
pub mod engine;
pub mod rig;

pub use calibration::{CalibrationEngine, CalibrationFault, Progress};
pub use engine::{MotorEngine, MotorState};
pub use rig::Rig;
