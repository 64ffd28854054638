// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Operator button and endstop identities.
//!
//! The debouncer turns raw pin reads into a [`Sensors`] snapshot once per control-loop tick; every
//! engine consumes that snapshot rather than touching pins.

pub mod debounce;

pub use debounce::Debouncer;

/// Number of digital inputs: the button plus six endstops.
pub const SENSOR_COUNT: usize = 7;

/// A single digital input.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Sensor {
    Button = 0,
    Endstop1 = 1,
    Endstop2 = 2,
    Endstop3 = 3,
    Endstop4 = 4,
    Endstop5 = 5,
    Endstop6 = 6,
}

impl Sensor {
    pub const ALL: [Sensor; SENSOR_COUNT] = [
        Sensor::Button,
        Sensor::Endstop1,
        Sensor::Endstop2,
        Sensor::Endstop3,
        Sensor::Endstop4,
        Sensor::Endstop5,
        Sensor::Endstop6,
    ];

    /// Endstops in wiring-validation order.
    pub const ENDSTOPS: [Sensor; 6] = [
        Sensor::Endstop1,
        Sensor::Endstop2,
        Sensor::Endstop3,
        Sensor::Endstop4,
        Sensor::Endstop5,
        Sensor::Endstop6,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Look up an endstop by its 1-based number.
    pub fn endstop(number: u8) -> Option<Self> {
        match number {
            1..=6 => Self::from_u8(number),
            _ => None,
        }
    }

    #[inline]
    pub fn is_endstop(self) -> bool {
        self != Sensor::Button
    }
}

/// Debounced view of every input for one tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Sensors {
    engaged: [bool; SENSOR_COUNT],
    pressed: bool,
}

impl Sensors {
    pub fn new(engaged: [bool; SENSOR_COUNT], pressed: bool) -> Self {
        Self { engaged, pressed }
    }

    #[inline]
    pub fn is_engaged(&self, sensor: Sensor) -> bool {
        self.engaged[sensor.index()]
    }

    /// A new discrete button press was registered this tick.
    #[inline]
    pub fn button_pressed(&self) -> bool {
        self.pressed
    }

    pub fn any_engaged(&self, group: &[Sensor]) -> bool {
        group.iter().any(|&s| self.is_engaged(s))
    }

    pub fn engaged_count(&self, group: &[Sensor]) -> usize {
        group.iter().filter(|&&s| self.is_engaged(s)).count()
    }

    /// Return a copy with `sensor` forced to `engaged`.
    pub fn with(mut self, sensor: Sensor, engaged: bool) -> Self {
        self.engaged[sensor.index()] = engaged;
        self
    }

    /// Return a copy with the button press event set.
    pub fn with_press(mut self, pressed: bool) -> Self {
        self.pressed = pressed;
        self
    }
}
