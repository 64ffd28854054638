// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Persistent calibration record.
//!
//! Fixed 20-byte layout, multi-byte fields little-endian:
//!
//! | Offset | Field |
//! | ------ | ----- |
//! | 0x00 | forward reference times, 3 × u16 |
//! | 0x06 | backward reference times, 3 × u16 |
//! | 0x0C | forward-terminating endstop number per motor, 3 × u8 |
//! | 0x0F | near factor (%) |
//! | 0x10 | slowdown factor (%) |
//! | 0x11 | timeout factor (%) |
//! | 0x12 | timeout buffer (ms), u16 |
//!
//! The record is always written as one block.

use embedded_storage::{ReadStorage, Storage};

use crate::motors::{CalibrationSet, Factors, MOTOR_COUNT};
use crate::sensors::Sensor;

/// Size of the record in bytes.
pub const RECORD_LEN: usize = 0x14;

mod offset {
    pub const FORWARD_MS: usize = 0x00;
    pub const BACKWARD_MS: usize = 0x06;
    pub const FORWARD_ENDSTOP: usize = 0x0C;
    pub const NEAR: usize = 0x0F;
    pub const SLOWDOWN: usize = 0x10;
    pub const TIMEOUT: usize = 0x11;
    pub const BUFFER_MS: usize = 0x12;
}

#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    Storage(E),
    /// The region has never been written.
    Blank,
    /// The record does not describe a usable calibration.
    Corrupt,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Storage(e)
    }
}

/// Serialize a calibration set.
pub fn encode(set: &CalibrationSet) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    for i in 0..MOTOR_COUNT {
        let f = offset::FORWARD_MS + 2 * i;
        buf[f..f + 2].copy_from_slice(&set.forward_ms[i].to_le_bytes());
        let b = offset::BACKWARD_MS + 2 * i;
        buf[b..b + 2].copy_from_slice(&set.backward_ms[i].to_le_bytes());
        buf[offset::FORWARD_ENDSTOP + i] = set.forward_endstop[i] as u8;
    }
    buf[offset::NEAR] = set.factors.near;
    buf[offset::SLOWDOWN] = set.factors.slowdown;
    buf[offset::TIMEOUT] = set.factors.timeout;
    buf[offset::BUFFER_MS..offset::BUFFER_MS + 2]
        .copy_from_slice(&set.factors.buffer_ms.to_le_bytes());
    buf
}

#[inline]
fn u16_at(buf: &[u8; RECORD_LEN], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

/// Parse and validate a record.
pub fn decode<E>(buf: &[u8; RECORD_LEN]) -> Result<CalibrationSet, Error<E>> {
    if buf.iter().all(|&b| b == 0xFF) {
        return Err(Error::Blank);
    }

    let mut forward_ms = [0u16; MOTOR_COUNT];
    let mut backward_ms = [0u16; MOTOR_COUNT];
    let mut forward_endstop = [Sensor::Endstop1; MOTOR_COUNT];
    for i in 0..MOTOR_COUNT {
        forward_ms[i] = u16_at(buf, offset::FORWARD_MS + 2 * i);
        backward_ms[i] = u16_at(buf, offset::BACKWARD_MS + 2 * i);
        forward_endstop[i] =
            Sensor::endstop(buf[offset::FORWARD_ENDSTOP + i]).ok_or(Error::Corrupt)?;
    }

    let set = CalibrationSet {
        forward_ms,
        backward_ms,
        forward_endstop,
        factors: Factors {
            near: buf[offset::NEAR],
            slowdown: buf[offset::SLOWDOWN],
            timeout: buf[offset::TIMEOUT],
            buffer_ms: u16_at(buf, offset::BUFFER_MS),
        },
    };

    if set.is_valid() {
        Ok(set)
    } else {
        Err(Error::Corrupt)
    }
}

/// Calibration record at a fixed offset in a byte-addressable store.
pub struct CalibrationStore<S> {
    storage: S,
    base: u32,
}

impl<S: Storage> CalibrationStore<S> {
    pub fn new(storage: S, base: u32) -> Self {
        Self { storage, base }
    }

    /// Read and validate the stored record.
    pub fn load(&mut self) -> Result<CalibrationSet, Error<S::Error>> {
        let mut buf = [0u8; RECORD_LEN];
        self.storage.read(self.base, &mut buf)?;
        decode(&buf)
    }

    /// Replace the stored record with a single block write.
    pub fn save(&mut self, set: &CalibrationSet) -> Result<(), Error<S::Error>> {
        if !set.is_valid() {
            return Err(Error::Corrupt);
        }
        self.storage.write(self.base, &encode(set))?;
        Ok(())
    }

    pub fn free(self) -> S {
        self.storage
    }
}
