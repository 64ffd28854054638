// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Battery-backed SRAM (BKPSRAM) as an [`embedded_storage`] byte store.
//!
//! 4 KiB at `0x4002_4000`. Retained across resets and, with VBAT fitted, across power loss. Unlike
//! flash there is no erase step, so writes land directly.

use core::ptr;

use embedded_storage::{ReadStorage, Storage};
use stm32f7xx_hal::pac;

const BASE: usize = 0x4002_4000;
const SIZE: usize = 4 * 1024;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BackupSramError {
    OutOfBounds,
}

pub struct BackupSram {
    _pwr: pac::PWR,
}

impl BackupSram {
    /// Unlock the backup domain and power the backup regulator.
    pub fn new(pwr: pac::PWR) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb1enr.modify(|_, w| w.pwren().set_bit());

        // Backup domain write access
        pwr.cr1.modify(|_, w| w.dbp().set_bit());
        rcc.ahb1enr.modify(|_, w| w.bkpsramen().set_bit());

        // Keep contents on VBAT
        pwr.csr1.modify(|_, w| w.bre().set_bit());
        while pwr.csr1.read().brr().bit_is_clear() {}

        Self { _pwr: pwr }
    }

    fn check(offset: u32, len: usize) -> Result<usize, BackupSramError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= SIZE => Ok(start),
            _ => Err(BackupSramError::OutOfBounds),
        }
    }
}

impl ReadStorage for BackupSram {
    type Error = BackupSramError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = Self::check(offset, bytes.len())?;
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = unsafe { ptr::read_volatile((BASE + start + i) as *const u8) };
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl Storage for BackupSram {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = Self::check(offset, bytes.len())?;
        for (i, &b) in bytes.iter().enumerate() {
            unsafe { ptr::write_volatile((BASE + start + i) as *mut u8, b) };
        }
        Ok(())
    }
}
