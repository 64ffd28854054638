// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Board-specific hardware adapters.

pub mod backup_sram;
pub mod pins;
pub mod pwm;
pub mod spi;
pub mod usart;

pub use backup_sram::BackupSram;
pub use pins::{BoardPins, Line};
pub use pwm::Tim4Pwm;
pub use spi::{ChipSelect, IsdLink, SpiBus};
pub use usart::Usart;
