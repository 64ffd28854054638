// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Motor Abstractions
//!
//! Identities shared by the drivers and the control layer, plus the travel timing model derived
//! from calibration.
//!
//! ## Modules
//!
//! - [`timing`] - Calibration record and the near/slowdown/timeout thresholds derived from it.

pub mod timing;

pub use timing::{CalibrationSet, Factors, MotorTiming, TravelTiming};

use crate::sensors::Sensor;

/// Number of driven motors.
pub const MOTOR_COUNT: usize = 3;

/// One of the three endstop-bounded motors, in control-loop order.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MotorId {
    Elevator = 0,
    Cart = 1,
    Loader = 2,
}

impl MotorId {
    pub const ALL: [MotorId; MOTOR_COUNT] = [MotorId::Elevator, MotorId::Cart, MotorId::Loader];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// The two endstops bounding this motor's travel.
    pub const fn endstops(self) -> [Sensor; 2] {
        match self {
            MotorId::Elevator => [Sensor::Endstop1, Sensor::Endstop2],
            MotorId::Cart => [Sensor::Endstop3, Sensor::Endstop4],
            MotorId::Loader => [Sensor::Endstop5, Sensor::Endstop6],
        }
    }

    #[inline]
    pub fn owns(self, endstop: Sensor) -> bool {
        self.endstops().contains(&endstop)
    }

    /// The other endstop of this motor's pair.
    pub fn opposite(self, endstop: Sensor) -> Option<Sensor> {
        let [a, b] = self.endstops();
        if endstop == a {
            Some(b)
        } else if endstop == b {
            Some(a)
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MotorId::Elevator => "elevator",
            MotorId::Cart => "cart",
            MotorId::Loader => "loader",
        }
    }
}

/// Relay direction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Backward => 1,
        }
    }
}

/// PWM duty preset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Speed {
    Slow,
    Fast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endstop_pairs_do_not_overlap() {
        for m in MotorId::ALL {
            for other in MotorId::ALL {
                if m == other {
                    continue;
                }
                for s in m.endstops() {
                    assert!(!other.owns(s));
                }
            }
        }
    }

    #[test]
    fn opposite_endstop() {
        assert_eq!(MotorId::Cart.opposite(Sensor::Endstop3), Some(Sensor::Endstop4));
        assert_eq!(MotorId::Cart.opposite(Sensor::Endstop4), Some(Sensor::Endstop3));
        assert_eq!(MotorId::Cart.opposite(Sensor::Endstop5), None);
    }
}
