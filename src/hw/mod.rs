// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin-level helpers shared by the drivers.

pub mod led;

pub use led::{ActiveLevel, Led};
