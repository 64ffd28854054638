// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Power outputs: three relay-reversed DC motors and the loader electromagnet.
//!
//! Every output is one PWM channel. Motors additionally have a direction relay. Which channel and
//! relay belong to which output, the duty presets and the relay polarity come from a lookup table
//! of [`OutputDescriptor`]s, so the motion engine never sees hardware addresses.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;

use crate::config::{PWM_MAGNET, PWM_SPEED_FAST, PWM_SPEED_SLOW};
use crate::motors::{Direction, MotorId, Speed, MOTOR_COUNT};

/// Number of power outputs.
pub const OUTPUT_COUNT: usize = 4;

/// A switchable power output.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Output {
    Elevator = 0,
    Cart = 1,
    Loader = 2,
    LoaderMagnet = 3,
}

impl Output {
    pub const ALL: [Output; OUTPUT_COUNT] = [
        Output::Elevator,
        Output::Cart,
        Output::Loader,
        Output::LoaderMagnet,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn motor(self) -> Option<MotorId> {
        MotorId::from_u8(self as u8)
    }
}

impl From<MotorId> for Output {
    fn from(m: MotorId) -> Self {
        match m {
            MotorId::Elevator => Output::Elevator,
            MotorId::Cart => Output::Cart,
            MotorId::Loader => Output::Loader,
        }
    }
}

/// Operations the motion and calibration engines need from the power stage.
///
/// Implementations swallow hardware errors; callers only pass valid ids.
pub trait PowerDriver {
    fn set_output(&mut self, output: Output, enabled: bool);
    fn set_speed(&mut self, motor: MotorId, speed: Speed);
    fn set_direction(&mut self, motor: MotorId, direction: Direction);
    fn is_enabled(&self, output: Output) -> bool;
    fn direction(&self, motor: MotorId) -> Direction;

    fn any_motor_enabled(&self) -> bool {
        MotorId::ALL.iter().any(|&m| self.is_enabled(m.into()))
    }

    /// Interlock query: is any motor other than `motor` energized?
    fn any_other_motor_enabled(&self, motor: MotorId) -> bool {
        MotorId::ALL
            .iter()
            .any(|&m| m != motor && self.is_enabled(m.into()))
    }
}

/// Direction relay wiring for a motor output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RelayDescriptor {
    /// Index into the relay pin array.
    pub pin: usize,
    /// Relay level that selects forward travel.
    pub forward: PinState,
}

/// Hardware mapping and duty presets for one output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutputDescriptor {
    /// Index into the PWM channel array.
    pub channel: usize,
    pub slow_duty: u8,
    pub fast_duty: u8,
    pub relay: Option<RelayDescriptor>,
}

/// Board wiring: output n on PWM channel n, motor n on relay n, forward = relay high.
pub const OUTPUTS: [OutputDescriptor; OUTPUT_COUNT] = [
    motor_output(0),
    motor_output(1),
    motor_output(2),
    OutputDescriptor {
        channel: 3,
        slow_duty: PWM_MAGNET,
        fast_duty: PWM_MAGNET,
        relay: None,
    },
];

const fn motor_output(n: usize) -> OutputDescriptor {
    OutputDescriptor {
        channel: n,
        slow_duty: PWM_SPEED_SLOW[n],
        fast_duty: PWM_SPEED_FAST[n],
        relay: Some(RelayDescriptor {
            pin: n,
            forward: PinState::High,
        }),
    }
}

/// PWM + relay power stage.
pub struct PowerStage<P, D> {
    pwm: [P; OUTPUT_COUNT],
    relays: [D; MOTOR_COUNT],
    table: [OutputDescriptor; OUTPUT_COUNT],
    enabled: [bool; OUTPUT_COUNT],
    speed: [Speed; MOTOR_COUNT],
    direction: [Direction; MOTOR_COUNT],
}

impl<P: SetDutyCycle, D: OutputPin> PowerStage<P, D> {
    /// Use the board wiring table.
    pub fn new(pwm: [P; OUTPUT_COUNT], relays: [D; MOTOR_COUNT]) -> Self {
        Self::with_table(pwm, relays, OUTPUTS)
    }

    /// All outputs off, all motors slow and forward.
    pub fn with_table(
        pwm: [P; OUTPUT_COUNT],
        relays: [D; MOTOR_COUNT],
        table: [OutputDescriptor; OUTPUT_COUNT],
    ) -> Self {
        let mut stage = Self {
            pwm,
            relays,
            table,
            enabled: [false; OUTPUT_COUNT],
            speed: [Speed::Slow; MOTOR_COUNT],
            direction: [Direction::Forward; MOTOR_COUNT],
        };
        for output in Output::ALL {
            stage.apply_duty(output);
        }
        for m in MotorId::ALL {
            stage.apply_relay(m);
        }
        stage
    }

    fn duty_for(&self, output: Output) -> u8 {
        let desc = &self.table[output.index()];
        if !self.enabled[output.index()] {
            return 0;
        }
        match output.motor().map(|m| self.speed[m.index()]) {
            Some(Speed::Fast) => desc.fast_duty,
            Some(Speed::Slow) | None => desc.slow_duty,
        }
    }

    fn apply_duty(&mut self, output: Output) {
        let duty = self.duty_for(output);
        let ch = self.table[output.index()].channel;
        self.pwm[ch]
            .set_duty_cycle_fraction(duty as u16, u8::MAX as u16)
            .ok();
    }

    fn apply_relay(&mut self, motor: MotorId) {
        let Some(relay) = self.table[motor.index()].relay else {
            return;
        };
        let level = match self.direction[motor.index()] {
            Direction::Forward => relay.forward,
            Direction::Backward => !relay.forward,
        };
        self.relays[relay.pin].set_state(level).ok();
    }

    pub fn free(self) -> ([P; OUTPUT_COUNT], [D; MOTOR_COUNT]) {
        (self.pwm, self.relays)
    }
}

impl<P: SetDutyCycle, D: OutputPin> PowerDriver for PowerStage<P, D> {
    fn set_output(&mut self, output: Output, enabled: bool) {
        self.enabled[output.index()] = enabled;
        self.apply_duty(output);
    }

    fn set_speed(&mut self, motor: MotorId, speed: Speed) {
        self.speed[motor.index()] = speed;
        self.apply_duty(motor.into());
    }

    fn set_direction(&mut self, motor: MotorId, direction: Direction) {
        self.direction[motor.index()] = direction;
        self.apply_relay(motor);
    }

    #[inline]
    fn is_enabled(&self, output: Output) -> bool {
        self.enabled[output.index()]
    }

    #[inline]
    fn direction(&self, motor: MotorId) -> Direction {
        self.direction[motor.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakePin, FakePwm};

    fn stage() -> (PowerStage<FakePwm, FakePin>, [FakePwm; 4], [FakePin; 3]) {
        let pwm: [FakePwm; 4] = Default::default();
        let relays: [FakePin; 3] = Default::default();
        let stage = PowerStage::new(pwm.clone(), relays.clone());
        (stage, pwm, relays)
    }

    #[test]
    fn starts_off_and_forward() {
        let (stage, pwm, relays) = stage();
        assert!(pwm.iter().all(|p| p.duty() == 0));
        assert!(relays.iter().all(|r| r.is_high()));
        assert!(!stage.any_motor_enabled());
    }

    #[test]
    fn duty_follows_speed_while_enabled() {
        let (mut stage, pwm, _) = stage();
        stage.set_speed(MotorId::Elevator, Speed::Fast);
        assert_eq!(pwm[0].duty(), 0);

        stage.set_output(Output::Elevator, true);
        assert_eq!(pwm[0].duty(), 1000);

        stage.set_speed(MotorId::Elevator, Speed::Slow);
        // 150/255 of 1000
        assert_eq!(pwm[0].duty(), 588);

        stage.set_output(Output::Elevator, false);
        assert_eq!(pwm[0].duty(), 0);
    }

    #[test]
    fn magnet_has_no_relay() {
        let (mut stage, pwm, relays) = stage();
        stage.set_output(Output::LoaderMagnet, true);
        assert_eq!(pwm[3].duty(), 1000);
        assert!(relays.iter().all(|r| r.is_high()));
        assert!(!stage.any_motor_enabled());
    }

    #[test]
    fn backward_drops_relay() {
        let (mut stage, _, relays) = stage();
        stage.set_direction(MotorId::Cart, Direction::Backward);
        assert!(!relays[1].is_high());
        assert!(relays[0].is_high());
        assert_eq!(stage.direction(MotorId::Cart), Direction::Backward);
    }

    #[test]
    fn interlock_ignores_self() {
        let (mut stage, _, _) = stage();
        stage.set_output(Output::Loader, true);
        assert!(!stage.any_other_motor_enabled(MotorId::Loader));
        assert!(stage.any_other_motor_enabled(MotorId::Cart));
    }
}
