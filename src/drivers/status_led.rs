// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Blink-coded error display.
//!
//! Codes run from 1 to [`ERROR_CODES`]; the highest is critical. Each code is shown for one
//! cycle of [`ERROR_CODES`] ticks: the LED lights at the start of the first `code` ticks and goes
//! dark [`ERROR_BLINK_TIME`] into each tick. With several codes set, cycles step through them in
//! increasing order. The critical code lights every tick, so it reads as constant blinking.
//!
//! ```text
//! code 2, ERROR_CODES = 3:
//! |‾‾‾‾|_____|‾‾‾‾|___________|‾‾‾‾|_____| ...
//! |   tick   |   tick   |   tick   |
//! |            cycle               |
//! ```

use embedded_hal::digital::OutputPin;

use crate::config::{ERROR_BLINK_TIME, ERROR_CODES, ERROR_TICK_TIME, ERR_CRITICAL};
use crate::hw::Led;
use crate::time::{elapsed, Clock, Instant};

/// Sink for fault codes.
pub trait ErrorDisplay {
    /// Set `code`. Out-of-range codes are ignored. Flagging the critical code clears every other
    /// code, and nothing else can be flagged once it is set.
    fn flag(&mut self, code: u8);

    /// Clear a single code.
    fn clear_code(&mut self, code: u8);

    /// Clear every code.
    fn clear(&mut self);

    fn is_set(&self, code: u8) -> bool;

    #[inline]
    fn is_critical(&self) -> bool {
        self.is_set(ERR_CRITICAL)
    }

    /// Advance any output the display drives. Called once per control-loop tick.
    fn update(&mut self) {}
}

/// Set of active error codes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorCodes {
    bits: u16,
}

impl ErrorCodes {
    #[inline]
    fn valid(code: u8) -> bool {
        (1..=ERROR_CODES).contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// The next active code after `prev`, wrapping around; `prev` itself comes last. Returns 0
    /// when nothing is set.
    pub fn next_after(&self, prev: u8) -> u8 {
        let prev = prev.min(ERROR_CODES);
        for step in 1..=ERROR_CODES {
            let code = (prev + step - 1) % ERROR_CODES + 1;
            if self.is_set(code) {
                return code;
            }
        }
        0
    }

    /// Active codes in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=ERROR_CODES).filter(move |&c| self.is_set(c))
    }
}

impl ErrorDisplay for ErrorCodes {
    fn flag(&mut self, code: u8) {
        if !Self::valid(code) {
            return;
        }
        if code == ERR_CRITICAL {
            self.bits = 0;
        } else if self.is_critical() {
            return;
        }
        self.bits |= 1 << code;
    }

    fn clear_code(&mut self, code: u8) {
        if Self::valid(code) {
            self.bits &= !(1 << code);
        }
    }

    fn clear(&mut self) {
        self.bits = 0;
    }

    #[inline]
    fn is_set(&self, code: u8) -> bool {
        Self::valid(code) && self.bits & (1 << code) != 0
    }
}

/// Status LED driving the blink encoder from the active [`ErrorCodes`].
pub struct StatusLed<PIN: OutputPin, C> {
    led: Led<PIN>,
    clock: C,
    codes: ErrorCodes,
    tick: u8,
    blinks: u8,
    tick_start: Instant,
}

impl<PIN: OutputPin, C: Clock> StatusLed<PIN, C> {
    pub fn new(led: Led<PIN>, clock: C) -> Self {
        let tick_start = clock.now();
        Self {
            led,
            clock,
            codes: ErrorCodes::default(),
            // First tick boundary opens a fresh cycle.
            tick: ERROR_CODES - 1,
            blinks: 0,
            tick_start,
        }
    }

    /// Advance the blink pattern.
    fn step(&mut self) {
        let now = self.clock.now();
        let dt = elapsed(now, self.tick_start);

        if dt >= ERROR_TICK_TIME {
            self.tick += 1;
            if self.tick >= ERROR_CODES {
                self.tick = 0;
                self.blinks = self.codes.next_after(self.blinks);
            }
            if self.tick < self.blinks {
                self.led.on();
            }
            self.tick_start = now;
        } else if dt >= ERROR_BLINK_TIME && self.led.is_on() {
            self.led.off();
        }
    }

    #[inline]
    pub fn codes(&self) -> &ErrorCodes {
        &self.codes
    }

    pub fn free(self) -> (Led<PIN>, C) {
        (self.led, self.clock)
    }
}

impl<PIN: OutputPin, C: Clock> ErrorDisplay for StatusLed<PIN, C> {
    fn flag(&mut self, code: u8) {
        self.codes.flag(code);
    }

    fn clear_code(&mut self, code: u8) {
        self.codes.clear_code(code);
    }

    fn clear(&mut self) {
        self.codes.clear();
    }

    fn is_set(&self, code: u8) -> bool {
        self.codes.is_set(code)
    }

    fn update(&mut self) {
        self.step();
    }
}
