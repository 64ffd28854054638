// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Travel timing derived from calibration.
//!
//! Motion is open-loop between endstops. Each motor/direction has a measured reference travel
//! time; the thresholds the motion engine acts on are percentages of it:
//!
//! - `near`: shortest plausible travel. The terminating endstop engaging earlier is a fault.
//! - `slowdown`: the motor drops to slow speed for the final approach.
//! - `timeout`: the move has failed; a fixed buffer is added on top of the percentage.

use crate::config::{
    DEFAULT_REFERENCE_MS, NEAR_FACTOR, SLOWDOWN_FACTOR, TIMEOUT_BUFFER_MS, TIMEOUT_FACTOR,
};
use crate::motors::{Direction, MotorId, MOTOR_COUNT};
use crate::sensors::Sensor;
use crate::time::Duration;

/// Why a set of factors was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FactorError {
    /// A percentage was zero.
    Zero,
    /// `near <= slowdown <= timeout` does not hold.
    Unordered,
}

/// Percentages (and buffer) used to derive thresholds from a reference time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Factors {
    pub near: u8,
    pub slowdown: u8,
    pub timeout: u8,
    pub buffer_ms: u16,
}

impl Default for Factors {
    fn default() -> Self {
        Self {
            near: NEAR_FACTOR,
            slowdown: SLOWDOWN_FACTOR,
            timeout: TIMEOUT_FACTOR,
            buffer_ms: TIMEOUT_BUFFER_MS,
        }
    }
}

impl Factors {
    pub fn new(near: u8, slowdown: u8, timeout: u8, buffer_ms: u16) -> Result<Self, FactorError> {
        let f = Self {
            near,
            slowdown,
            timeout,
            buffer_ms,
        };
        f.validate()?;
        Ok(f)
    }

    pub fn validate(&self) -> Result<(), FactorError> {
        if self.near == 0 || self.slowdown == 0 || self.timeout == 0 {
            return Err(FactorError::Zero);
        }
        if self.near > self.slowdown || self.slowdown > self.timeout {
            return Err(FactorError::Unordered);
        }
        Ok(())
    }
}

#[inline]
fn percent(reference_ms: u16, pct: u8) -> u32 {
    reference_ms as u32 * pct as u32 / 100
}

/// Thresholds for one motor travelling in one direction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TravelTiming {
    pub reference: Duration,
    pub near: Duration,
    pub slowdown: Duration,
    pub timeout: Duration,
    /// Endstop that terminates travel in this direction.
    pub endstop: Sensor,
}

impl TravelTiming {
    pub fn derive(reference_ms: u16, factors: &Factors, endstop: Sensor) -> Self {
        Self {
            reference: Duration::from_ticks(reference_ms as u32),
            near: Duration::from_ticks(percent(reference_ms, factors.near)),
            slowdown: Duration::from_ticks(percent(reference_ms, factors.slowdown)),
            timeout: Duration::from_ticks(
                percent(reference_ms, factors.timeout) + factors.buffer_ms as u32,
            ),
            endstop,
        }
    }
}

/// Both directions of one motor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MotorTiming {
    pub forward: TravelTiming,
    pub backward: TravelTiming,
}

impl MotorTiming {
    #[inline]
    pub fn get(&self, direction: Direction) -> &TravelTiming {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }

    /// Direction whose travel ends on `endstop`.
    pub fn direction_towards(&self, endstop: Sensor) -> Option<Direction> {
        if endstop == self.forward.endstop {
            Some(Direction::Forward)
        } else if endstop == self.backward.endstop {
            Some(Direction::Backward)
        } else {
            None
        }
    }
}

/// Everything the calibration routine produces and the store persists.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CalibrationSet {
    pub forward_ms: [u16; MOTOR_COUNT],
    pub backward_ms: [u16; MOTOR_COUNT],
    /// Endstop that terminates forward travel, per motor.
    pub forward_endstop: [Sensor; MOTOR_COUNT],
    pub factors: Factors,
}

impl Default for CalibrationSet {
    fn default() -> Self {
        Self {
            forward_ms: [DEFAULT_REFERENCE_MS; MOTOR_COUNT],
            backward_ms: [DEFAULT_REFERENCE_MS; MOTOR_COUNT],
            forward_endstop: MotorId::ALL.map(|m| m.endstops()[1]),
            factors: Factors::default(),
        }
    }
}

impl CalibrationSet {
    /// Derive per-direction thresholds for `motor`.
    pub fn timing(&self, motor: MotorId) -> MotorTiming {
        let i = motor.index();
        let fwd_end = self.forward_endstop[i];
        let bwd_end = motor.opposite(fwd_end).unwrap_or(motor.endstops()[0]);
        MotorTiming {
            forward: TravelTiming::derive(self.forward_ms[i], &self.factors, fwd_end),
            backward: TravelTiming::derive(self.backward_ms[i], &self.factors, bwd_end),
        }
    }

    /// Reference times are non-zero, each forward endstop belongs to its motor and the factors
    /// are ordered.
    pub fn is_valid(&self) -> bool {
        let times_ok = self
            .forward_ms
            .iter()
            .chain(self.backward_ms.iter())
            .all(|&t| t != 0 && t != u16::MAX);
        let endstops_ok = MotorId::ALL
            .iter()
            .all(|m| m.owns(self.forward_endstop[m.index()]));
        times_ok && endstops_ok && self.factors.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_from_reference() {
        let f = Factors::new(10, 97, 125, 1000).unwrap();
        let t = TravelTiming::derive(2000, &f, Sensor::Endstop2);
        assert_eq!(t.near.to_millis(), 200);
        assert_eq!(t.slowdown.to_millis(), 1940);
        assert_eq!(t.timeout.to_millis(), 3500);
    }

    #[test]
    fn thresholds_are_ordered_for_any_reference() {
        let f = Factors::default();
        for reference in [1u16, 7, 100, 999, 2000, 4321, 30_000, u16::MAX] {
            let t = TravelTiming::derive(reference, &f, Sensor::Endstop1);
            assert!(t.near <= t.slowdown);
            assert!(t.slowdown <= t.timeout);
        }
    }

    #[test]
    fn doubling_reference_doubles_percentages() {
        let f = Factors::new(10, 95, 150, 1000).unwrap();
        let a = TravelTiming::derive(1000, &f, Sensor::Endstop1);
        let b = TravelTiming::derive(2000, &f, Sensor::Endstop1);
        assert_eq!(b.near.to_millis(), 2 * a.near.to_millis());
        assert_eq!(b.slowdown.to_millis(), 2 * a.slowdown.to_millis());
        // Only the percentage part of the timeout scales; the buffer is fixed.
        assert_eq!(
            b.timeout.to_millis() - 1000,
            2 * (a.timeout.to_millis() - 1000)
        );
    }

    #[test]
    fn factor_validation() {
        assert_eq!(Factors::new(0, 95, 150, 0), Err(FactorError::Zero));
        assert_eq!(Factors::new(96, 95, 150, 0), Err(FactorError::Unordered));
        assert_eq!(Factors::new(10, 151, 150, 0), Err(FactorError::Unordered));
        assert!(Factors::new(95, 95, 95, 0).is_ok());
    }

    #[test]
    fn timing_pairs_endstops() {
        let mut set = CalibrationSet::default();
        set.forward_endstop[1] = Sensor::Endstop3;
        let t = set.timing(MotorId::Cart);
        assert_eq!(t.forward.endstop, Sensor::Endstop3);
        assert_eq!(t.backward.endstop, Sensor::Endstop4);
        assert_eq!(t.direction_towards(Sensor::Endstop4), Some(Direction::Backward));
        assert_eq!(t.direction_towards(Sensor::Endstop1), None);
    }

    #[test]
    fn validity() {
        assert!(CalibrationSet::default().is_valid());

        let mut set = CalibrationSet::default();
        set.forward_endstop[0] = Sensor::Endstop5;
        assert!(!set.is_valid());

        let mut set = CalibrationSet::default();
        set.backward_ms[2] = 0;
        assert!(!set.is_valid());
    }
}
