// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # EWMC Coal Mine Module
//!
//! Control core for the EWMC coal mine module: three endstop-bounded DC motors (elevator, cart,
//! clamshell loader), the loader electromagnet, an ISD1700 audio chip, a blink-coded status LED
//! and a persistent calibration record.
//!
//! Everything in this crate is hardware-agnostic and written against `embedded-hal` 1.0 and
//! `embedded-storage` traits. The board binary lives in `firmware/`.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`config`] | Compile-time constants (timings, duty presets, clip table, error codes) |
//! | [`time`] | Millisecond clock abstraction on top of `fugit` |
//! | [`sensors`] | Button/endstop identities and the sensor debouncer |
//! | [`hw`] | Small pin-level wrappers (status LED) |
//! | [`drivers`] | Power stage, ISD1700 audio chip, error display |
//! | [`storage`] | Persistent calibration record layout |
//! | [`motors`] | Motor identities and travel timing derived from calibration |
//! | [`control`] | Motion engine, calibration engine and the control loop |
//!
//! ## Getting Started
//!
//! Run the host test suite:
//!
//! ```bash
//! cargo test
//! ```
//!
//! Build docs:
//!
//! ```bash
//! cargo doc --no-deps --open
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cd firmware && cargo run --release
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod control;
pub mod drivers;
pub mod hw;
pub mod motors;
pub mod sensors;
pub mod storage;
pub mod time;

#[cfg(test)]
pub(crate) mod mock;
