// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Host-side doubles for the hardware traits.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};
use embedded_storage::{ReadStorage, Storage};

use crate::drivers::audio::{AudioDriver, Clip};
use crate::drivers::power::{Output, PowerDriver};
use crate::motors::{Direction, MotorId, Speed};
use crate::time::{Clock, Instant};

/// Manually stepped millisecond clock. Clones share the same counter.
#[derive(Clone, Default)]
pub struct FakeClock(Rc<Cell<u32>>);

impl FakeClock {
    pub fn at(ms: u32) -> Self {
        Self(Rc::new(Cell::new(ms)))
    }

    pub fn set(&self, ms: u32) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }

    pub fn ms(&self) -> u32 {
        self.0.get()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.0.get())
    }
}

/// Delay that advances a [`FakeClock`] instead of spinning.
pub struct FakeDelay(pub FakeClock);

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(ns.div_ceil(1_000_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.0.advance(us.div_ceil(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.advance(ms);
    }
}

/// Output pin whose level is observable from the test through a shared cell.
#[derive(Clone, Default)]
pub struct FakePin(pub Rc<Cell<bool>>);

impl FakePin {
    pub fn is_high(&self) -> bool {
        self.0.get()
    }
}

impl PinErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

/// PWM channel with a 0..=1000 duty range.
#[derive(Clone, Default)]
pub struct FakePwm(pub Rc<Cell<u16>>);

impl FakePwm {
    pub fn duty(&self) -> u16 {
        self.0.get()
    }
}

impl PwmErrorType for FakePwm {
    type Error = Infallible;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        1000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.0.set(duty);
        Ok(())
    }
}

/// Records every frame written through it.
#[derive(Clone, Default)]
pub struct FakeSpi(pub Rc<RefCell<Vec<Vec<u8>>>>);

impl FakeSpi {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.0.borrow().clone()
    }
}

impl SpiErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut frame = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(buf) => frame.extend_from_slice(buf),
                Operation::Transfer(_, write) => frame.extend_from_slice(write),
                Operation::TransferInPlace(buf) => frame.extend_from_slice(buf),
                Operation::Read(_) | Operation::DelayNs(_) => {}
            }
        }
        self.0.borrow_mut().push(frame);
        Ok(())
    }
}

/// Power stage that only records state.
#[derive(Clone, Debug)]
pub struct FakePower {
    pub enabled: [bool; 4],
    pub speed: [Speed; 3],
    pub direction: [Direction; 3],
    /// Every speed change, in order.
    pub speed_log: Vec<(MotorId, Speed)>,
}

impl Default for FakePower {
    fn default() -> Self {
        Self {
            enabled: [false; 4],
            speed: [Speed::Slow; 3],
            direction: [Direction::Forward; 3],
            speed_log: Vec::new(),
        }
    }
}

impl PowerDriver for FakePower {
    fn set_output(&mut self, output: Output, enabled: bool) {
        self.enabled[output.index()] = enabled;
    }

    fn set_speed(&mut self, motor: MotorId, speed: Speed) {
        self.speed[motor.index()] = speed;
        self.speed_log.push((motor, speed));
    }

    fn set_direction(&mut self, motor: MotorId, direction: Direction) {
        self.direction[motor.index()] = direction;
    }

    fn is_enabled(&self, output: Output) -> bool {
        self.enabled[output.index()]
    }

    fn direction(&self, motor: MotorId) -> Direction {
        self.direction[motor.index()]
    }
}

/// Audio driver that records requests and never blocks.
#[derive(Default)]
pub struct FakeAudio {
    pub played: Vec<Clip>,
    pub beeps: usize,
    pub busy: bool,
}

impl AudioDriver for FakeAudio {
    type Error = ();

    fn play(&mut self, clip: Clip) -> Result<(), ()> {
        if self.busy {
            return Err(());
        }
        self.played.push(clip);
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        self.busy
    }

    fn beep(&mut self) -> Result<(), ()> {
        self.beeps += 1;
        Ok(())
    }
}

/// RAM-backed storage that counts writes and can be told to fail them.
pub struct FakeStorage {
    pub bytes: Vec<u8>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl FakeStorage {
    pub fn erased(len: usize) -> Self {
        Self {
            bytes: vec![0xFF; len],
            writes: 0,
            fail_writes: false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FakeStorageError;

impl ReadStorage for FakeStorage {
    type Error = FakeStorageError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.bytes.len() {
            return Err(FakeStorageError);
        }
        bytes.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for FakeStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(FakeStorageError);
        }
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.bytes.len() {
            return Err(FakeStorageError);
        }
        self.bytes[start..end].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}
