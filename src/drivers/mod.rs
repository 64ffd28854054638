// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! Collaborators of the motion and calibration engines. Each exposes a small trait the engines are
//! written against, plus a concrete implementation over `embedded-hal` traits.
//!
//! ## Existing drivers
//!
//! - [`power`] – PWM power stage with direction relays (three motors, loader magnet)
//! - [`audio`] – clip identities and the playback trait
//! - [`isd1700`] – Nuvoton ISD1700 ChipCorder over SPI
//! - [`status_led`] – error code registry and blink encoder

pub mod audio;
pub mod isd1700;
pub mod power;
pub mod status_led;

pub use audio::{AudioDriver, Clip};
pub use isd1700::Isd1700;
pub use power::{Output, PowerDriver, PowerStage};
pub use status_led::{ErrorCodes, ErrorDisplay, StatusLed};
