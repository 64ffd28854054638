// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! SPI link to the ISD1700 audio chip.
//!
//! - `SpiBus` wraps the enabled HAL SPI instance with 8-bit words.
//! - `ChipSelect` is an active-low GPIO output for manual CS control.
//! - `IsdLink` combines both into an `embedded-hal` [`SpiDevice`]. The ISD1700 shifts data
//!   LSB-first while the HAL peripheral is configured MSB-first, so every byte is bit-reversed on
//!   the way out and on the way in.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{self as ehspi, ErrorKind, ErrorType, Operation, SpiDevice};
use stm32f7xx_hal::{
    gpio::{self, Output, PinState, PushPull},
    prelude::*,
    spi::{self, Enabled, Spi},
};

use crate::clock::SysTickDelay;

/// Wrapper around an enabled HAL SPI instance (8-bit words).
pub struct SpiBus<I, P> {
    spi: Spi<I, P, Enabled<u8>>,
}

impl<I, P> SpiBus<I, P>
where
    I: spi::Instance,
    P: spi::Pins<I>,
{
    pub fn new(spi: Spi<I, P, Enabled<u8>>) -> Self {
        Self { spi }
    }

    /// Perform a blocking, full-duplex transfer of one byte.
    pub fn transfer_byte(&mut self, byte: u8) -> Result<u8, spi::Error> {
        let mut tmp = [byte];
        self.spi.transfer(&mut tmp)?;
        Ok(tmp[0])
    }

    /// Full-duplex transfer of one byte, least significant bit first.
    #[inline]
    pub fn transfer_byte_lsb(&mut self, byte: u8) -> Result<u8, spi::Error> {
        Ok(self.transfer_byte(byte.reverse_bits())?.reverse_bits())
    }

    pub fn free(self) -> Spi<I, P, Enabled<u8>> {
        self.spi
    }
}

/// Manual chip-select line, active-low, generic over any GPIO pin.
pub struct ChipSelect<const P: char, const N: u8> {
    pin: gpio::Pin<P, N, Output<PushPull>>,
}

impl<const P: char, const N: u8> ChipSelect<P, N> {
    /// Create an active-low chip select and set to the inactive state (i.e., high).
    pub fn active_low<MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        let mut pin = pin.into_push_pull_output();
        pin.set_state(PinState::High);
        Self { pin }
    }

    #[inline]
    pub fn select(&mut self) {
        self.pin.set_low();
    }

    #[inline]
    pub fn deselect(&mut self) {
        self.pin.set_high();
    }
}

/// HAL SPI error in `embedded-hal` clothing.
pub struct LinkError(pub spi::Error);

impl fmt::Debug for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("spi link error")
    }
}

impl ehspi::Error for LinkError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<spi::Error> for LinkError {
    fn from(e: spi::Error) -> Self {
        LinkError(e)
    }
}

/// LSB-first SPI device: one bus, one chip select.
pub struct IsdLink<I, P, const CS_P: char, const CS_N: u8> {
    bus: SpiBus<I, P>,
    cs: ChipSelect<CS_P, CS_N>,
}

impl<I, P, const CS_P: char, const CS_N: u8> IsdLink<I, P, CS_P, CS_N>
where
    I: spi::Instance,
    P: spi::Pins<I>,
{
    pub fn new(bus: SpiBus<I, P>, cs: ChipSelect<CS_P, CS_N>) -> Self {
        Self { bus, cs }
    }

    fn run(&mut self, op: &mut Operation<'_, u8>) -> Result<(), LinkError> {
        match op {
            Operation::Write(buf) => {
                for &b in buf.iter() {
                    self.bus.transfer_byte_lsb(b)?;
                }
            }
            Operation::Read(buf) => {
                for b in buf.iter_mut() {
                    *b = self.bus.transfer_byte_lsb(0x00)?;
                }
            }
            Operation::Transfer(read, write) => {
                let n = read.len().max(write.len());
                for i in 0..n {
                    let out = write.get(i).copied().unwrap_or(0x00);
                    let got = self.bus.transfer_byte_lsb(out)?;
                    if let Some(r) = read.get_mut(i) {
                        *r = got;
                    }
                }
            }
            Operation::TransferInPlace(buf) => {
                for b in buf.iter_mut() {
                    *b = self.bus.transfer_byte_lsb(*b)?;
                }
            }
            Operation::DelayNs(ns) => SysTickDelay.delay_ns(*ns),
        }
        Ok(())
    }
}

impl<I, P, const CS_P: char, const CS_N: u8> ErrorType for IsdLink<I, P, CS_P, CS_N> {
    type Error = LinkError;
}

impl<I, P, const CS_P: char, const CS_N: u8> SpiDevice for IsdLink<I, P, CS_P, CS_N>
where
    I: spi::Instance,
    P: spi::Pins<I>,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), LinkError> {
        self.cs.select();
        let mut result = Ok(());
        for op in operations.iter_mut() {
            result = self.run(op);
            if result.is_err() {
                break;
            }
        }
        self.cs.deselect();
        result
    }
}
