// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Sensor debouncer.
//!
//! Each input keeps a logical state and a counter of consecutive raw samples that disagree with
//! it. The logical state flips only once that counter reaches the required count; any agreeing
//! sample in between resets it.
//!
//! The button additionally produces discrete press events: a debounced rising edge counts as a
//! press only if at least [`BUTTON_DEBOUNCE_DELAY`] has passed since the previous press.

use crate::config::{BUTTON_DEBOUNCE_DELAY, SENSOR_REQUIRED_COUNT};
use crate::sensors::{Sensor, Sensors, SENSOR_COUNT};
use crate::time::{elapsed, Duration, Instant};

#[derive(Copy, Clone, Debug, Default)]
struct Channel {
    state: bool,
    count: u8,
}

impl Channel {
    /// Feed one raw sample. Returns `true` when the logical state flipped.
    fn update(&mut self, raw: bool, required: u8) -> bool {
        if raw == self.state {
            self.count = 0;
            return false;
        }
        self.count = self.count.saturating_add(1);
        if self.count >= required {
            self.state = raw;
            self.count = 0;
            true
        } else {
            false
        }
    }
}

pub struct Debouncer {
    channels: [Channel; SENSOR_COUNT],
    required: u8,
    press_delay: Duration,
    last_press: Option<Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SENSOR_REQUIRED_COUNT, BUTTON_DEBOUNCE_DELAY)
    }
}

impl Debouncer {
    /// All inputs start released.
    pub fn new(required: u8, press_delay: Duration) -> Self {
        Self {
            channels: [Channel::default(); SENSOR_COUNT],
            required: required.max(1),
            press_delay,
            last_press: None,
        }
    }

    /// Sample every input once and return the debounced snapshot for this tick.
    pub fn sample(&mut self, raw: [bool; SENSOR_COUNT], now: Instant) -> Sensors {
        let mut button_rose = false;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            let flipped = ch.update(raw[i], self.required);
            if i == Sensor::Button.index() && flipped && ch.state {
                button_rose = true;
            }
        }

        let pressed = button_rose && self.accept_press(now);
        Sensors::new(self.states(), pressed)
    }

    fn accept_press(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_press {
            if elapsed(now, last) < self.press_delay {
                return false;
            }
        }
        self.last_press = Some(now);
        true
    }

    #[inline]
    pub fn is_engaged(&self, sensor: Sensor) -> bool {
        self.channels[sensor.index()].state
    }

    fn states(&self) -> [bool; SENSOR_COUNT] {
        let mut out = [false; SENSOR_COUNT];
        for (o, ch) in out.iter_mut().zip(self.channels.iter()) {
            *o = ch.state;
        }
        out
    }

    /// Seed the logical states directly (e.g. from a boot-time read), skipping the debounce.
    pub fn preset(&mut self, raw: [bool; SENSOR_COUNT]) {
        for (ch, &r) in self.channels.iter_mut().zip(raw.iter()) {
            ch.state = r;
            ch.count = 0;
        }
    }
}
