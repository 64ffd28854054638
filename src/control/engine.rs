// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Per-motor motion state machine.
//!
//! One [`MotorEngine`] per motor. Every control-loop tick it performs exactly one state check and
//! returns; every wait is expressed as "stay in this state until the condition holds".
//!
//! ```text
//! INIT -> IDLE -> [DELAY_PRE_CHANGE ->] MOVE_START -> MOVE -> MOVE_END -> DELAY_POST_CHANGE -> IDLE
//!                                                      |
//!                                                      +-> SAFETY_REVERSE_ENDSTOP_{EARLY,FAIL}
//!                                                            -> DELAY_PRE_CHANGE -> MOVE_START
//!                                                            -> FAULTED
//! ```
//!
//! A move always heads away from the endstop the motor rests on. During travel:
//!
//! - the terminating endstop engaging before the `near` threshold, or the starting endstop
//!   engaging again after it released, is an early-endstop fault;
//! - reaching the `slowdown` threshold drops the motor to slow speed once;
//! - reaching the `timeout` threshold without the terminating endstop is a travel failure.
//!
//! A fault de-energizes the motor, flags a code for the motor and direction, holds, then reverses
//! toward the endstop the move started from. The reversal only has to reach that endstop before
//! its timeout; the early-endstop checks do not apply to it. A reversal that completes clears the
//! motor's codes.
//! Faulting again before a move completes, or finding another motor energized while holding,
//! halts the motor for good and flags the critical code.

use log::{debug, error, info, warn};

use crate::config::{
    ERR_CRITICAL, RELAY_POST_CHANGE_DELAY, RELAY_PRE_CHANGE_DELAY, SAFETY_REVERSE_DELAY,
    SAFETY_REVERSE_RETRIES,
};
use crate::drivers::power::{Output, PowerDriver};
use crate::drivers::status_led::ErrorDisplay;
use crate::motors::{CalibrationSet, Direction, MotorId, MotorTiming, Speed};
use crate::sensors::Sensors;
use crate::time::{elapsed, Duration, Instant};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MotorState {
    /// Waiting for calibration constants.
    Init,
    /// De-energized, accepting commands.
    Idle,
    MoveStart,
    /// Travelling; `slow` once the slowdown threshold has been passed.
    Move { slow: bool },
    MoveEnd,
    DelayPreChange,
    DelayPostChange,
    SafetyReverseEndstopFail,
    SafetyReverseEndstopEarly,
    /// Terminal until power cycle.
    Faulted,
}

impl MotorState {
    #[inline]
    pub fn is_safety_reverse(self) -> bool {
        matches!(
            self,
            MotorState::SafetyReverseEndstopFail | MotorState::SafetyReverseEndstopEarly
        )
    }
}

/// Non-critical code flagged for a motion fault of `motor` travelling in `direction` (1..=6).
#[inline]
pub fn fault_code(motor: MotorId, direction: Direction) -> u8 {
    1 + 2 * motor.index() as u8 + direction.index() as u8
}

pub struct MotorEngine {
    motor: MotorId,
    timing: MotorTiming,
    state: MotorState,
    entered: Instant,
    /// Direction of the current (or next) move.
    target: Direction,
    move_start: Instant,
    start_released: bool,
    retries: u8,
    max_retries: u8,
    pending: bool,
}

impl MotorEngine {
    pub fn new(motor: MotorId) -> Self {
        Self {
            motor,
            timing: CalibrationSet::default().timing(motor),
            state: MotorState::Init,
            entered: Instant::from_ticks(0),
            target: Direction::Forward,
            move_start: Instant::from_ticks(0),
            start_released: false,
            retries: 0,
            max_retries: SAFETY_REVERSE_RETRIES,
            pending: false,
        }
    }

    /// Override the number of safety reversals allowed before faulting.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Install calibration constants. Leaves `INIT` for `IDLE`; ignored while the motor is busy.
    pub fn load_timing(&mut self, timing: MotorTiming, now: Instant) -> bool {
        match self.state {
            MotorState::Init => {
                self.timing = timing;
                self.enter(MotorState::Idle, now);
                true
            }
            MotorState::Idle => {
                self.timing = timing;
                true
            }
            _ => false,
        }
    }

    /// Request one move. Only accepted while idle.
    pub fn command(&mut self) -> bool {
        if self.state == MotorState::Idle {
            self.pending = true;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn motor(&self) -> MotorId {
        self.motor
    }

    #[inline]
    pub fn state(&self) -> MotorState {
        self.state
    }

    #[inline]
    pub fn timing(&self) -> &MotorTiming {
        &self.timing
    }

    /// Direction of the current or most recent move.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.target
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == MotorState::Idle
    }

    /// Output is (or is about to be) energized.
    #[inline]
    pub fn is_moving(&self) -> bool {
        matches!(self.state, MotorState::MoveStart | MotorState::Move { .. })
    }

    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.state == MotorState::Faulted
    }

    fn enter(&mut self, state: MotorState, now: Instant) {
        debug!("{}: {:?} -> {:?}", self.motor.name(), self.state, state);
        self.state = state;
        self.entered = now;
    }

    #[inline]
    fn in_state_for(&self, now: Instant, d: Duration) -> bool {
        elapsed(now, self.entered) >= d
    }

    /// Advance the state machine by one check.
    pub fn tick<P, E>(&mut self, now: Instant, sensors: &Sensors, power: &mut P, errors: &mut E)
    where
        P: PowerDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        let output = Output::from(self.motor);

        match self.state {
            MotorState::Init => {}

            MotorState::Idle => {
                if core::mem::take(&mut self.pending) {
                    self.begin_move(now, sensors, power);
                }
            }

            MotorState::DelayPreChange => {
                if self.in_state_for(now, RELAY_PRE_CHANGE_DELAY) {
                    power.set_direction(self.motor, self.target);
                    self.enter(MotorState::MoveStart, now);
                }
            }

            MotorState::MoveStart => {
                power.set_direction(self.motor, self.target);
                power.set_speed(self.motor, Speed::Fast);
                power.set_output(output, true);
                self.move_start = now;
                self.start_released = false;
                self.enter(MotorState::Move { slow: false }, now);
            }

            MotorState::Move { slow } => self.travel(now, slow, sensors, power, errors),

            MotorState::MoveEnd => {
                power.set_output(output, false);
                if self.retries > 0 {
                    // Reversal recovered the mechanism.
                    errors.clear_code(fault_code(self.motor, Direction::Forward));
                    errors.clear_code(fault_code(self.motor, Direction::Backward));
                }
                self.retries = 0;
                self.enter(MotorState::DelayPostChange, now);
            }

            MotorState::DelayPostChange => {
                if self.in_state_for(now, RELAY_POST_CHANGE_DELAY) {
                    self.enter(MotorState::Idle, now);
                }
            }

            MotorState::SafetyReverseEndstopFail | MotorState::SafetyReverseEndstopEarly => {
                if power.any_other_motor_enabled(self.motor) {
                    error!(
                        "{}: another motor energized during safety reverse",
                        self.motor.name()
                    );
                    self.halt(now, power, errors);
                } else if self.in_state_for(now, SAFETY_REVERSE_DELAY) {
                    self.retries = self.retries.saturating_add(1);
                    self.target = self.target.reversed();
                    info!(
                        "{}: reversing {:?} (attempt {})",
                        self.motor.name(),
                        self.target,
                        self.retries
                    );
                    self.enter(MotorState::DelayPreChange, now);
                }
            }

            MotorState::Faulted => {
                if power.is_enabled(output) {
                    power.set_output(output, false);
                }
            }
        }
    }

    fn begin_move<P>(&mut self, now: Instant, sensors: &Sensors, power: &mut P)
    where
        P: PowerDriver + ?Sized,
    {
        let [a, b] = self.motor.endstops();
        let resting = match (sensors.is_engaged(a), sensors.is_engaged(b)) {
            (true, false) => a,
            (false, true) => b,
            _ => {
                warn!(
                    "{}: not resting on exactly one endstop, ignoring command",
                    self.motor.name()
                );
                return;
            }
        };
        let Some(away) = self.motor.opposite(resting) else {
            return;
        };
        let Some(direction) = self.timing.direction_towards(away) else {
            return;
        };

        self.target = direction;
        if power.direction(self.motor) == direction {
            self.enter(MotorState::MoveStart, now);
        } else {
            self.enter(MotorState::DelayPreChange, now);
        }
    }

    fn travel<P, E>(
        &mut self,
        now: Instant,
        slow: bool,
        sensors: &Sensors,
        power: &mut P,
        errors: &mut E,
    ) where
        P: PowerDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        let t = elapsed(now, self.move_start);
        let leg = *self.timing.get(self.target);
        let start = self.timing.get(self.target.reversed()).endstop;
        // A reversal is a partial return trip and may begin between endstops.
        let reversing = self.retries > 0;

        if !reversing {
            if sensors.is_engaged(start) {
                if self.start_released {
                    warn!("{}: start endstop engaged mid-travel", self.motor.name());
                    self.fault(MotorState::SafetyReverseEndstopEarly, now, power, errors);
                    return;
                }
            } else {
                self.start_released = true;
            }
        }

        if sensors.is_engaged(leg.endstop) {
            if !reversing && t < leg.near {
                warn!(
                    "{}: endstop after {} ms, expected at least {} ms",
                    self.motor.name(),
                    t.to_millis(),
                    leg.near.to_millis()
                );
                self.fault(MotorState::SafetyReverseEndstopEarly, now, power, errors);
            } else {
                info!(
                    "{}: {:?} move done in {} ms",
                    self.motor.name(),
                    self.target,
                    t.to_millis()
                );
                self.enter(MotorState::MoveEnd, now);
            }
            return;
        }

        if t >= leg.timeout {
            warn!(
                "{}: no endstop after {} ms",
                self.motor.name(),
                t.to_millis()
            );
            self.fault(MotorState::SafetyReverseEndstopFail, now, power, errors);
            return;
        }

        if !slow && t >= leg.slowdown {
            power.set_speed(self.motor, Speed::Slow);
            self.enter(MotorState::Move { slow: true }, now);
        }
    }

    fn fault<P, E>(&mut self, kind: MotorState, now: Instant, power: &mut P, errors: &mut E)
    where
        P: PowerDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        power.set_output(self.motor.into(), false);
        if self.motor == MotorId::Loader {
            power.set_output(Output::LoaderMagnet, false);
        }

        if self.retries >= self.max_retries {
            error!(
                "{}: fault after {} reversal(s), halting",
                self.motor.name(),
                self.retries
            );
            self.halt(now, power, errors);
            return;
        }

        errors.flag(fault_code(self.motor, self.target));
        self.enter(kind, now);
    }

    fn halt<P, E>(&mut self, now: Instant, power: &mut P, errors: &mut E)
    where
        P: PowerDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        power.set_output(self.motor.into(), false);
        if self.motor == MotorId::Loader {
            power.set_output(Output::LoaderMagnet, false);
        }
        errors.flag(ERR_CRITICAL);
        self.pending = false;
        self.enter(MotorState::Faulted, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::status_led::ErrorCodes;
    use crate::mock::FakePower;
    use crate::motors::Factors;
    use crate::sensors::Sensor;

    /// Elevator, forward toward Endstop2 and backward toward Endstop1, 2000 ms each way.
    fn timing() -> MotorTiming {
        let set = CalibrationSet {
            forward_ms: [2000; 3],
            backward_ms: [2000; 3],
            forward_endstop: [Sensor::Endstop2, Sensor::Endstop4, Sensor::Endstop6],
            factors: Factors::new(10, 97, 125, 1000).unwrap(),
        };
        set.timing(MotorId::Elevator)
    }

    struct Bench {
        engine: MotorEngine,
        power: FakePower,
        errors: ErrorCodes,
        sensors: Sensors,
        now: u32,
    }

    impl Bench {
        /// Idle elevator resting on `resting`.
        fn new(resting: Sensor) -> Self {
            let mut engine = MotorEngine::new(MotorId::Elevator);
            assert!(engine.load_timing(timing(), Instant::from_ticks(0)));
            Self {
                engine,
                power: FakePower::default(),
                errors: ErrorCodes::default(),
                sensors: Sensors::default().with(resting, true),
                now: 0,
            }
        }

        fn tick(&mut self) -> MotorState {
            self.engine.tick(
                Instant::from_ticks(self.now),
                &self.sensors,
                &mut self.power,
                &mut self.errors,
            );
            self.engine.state()
        }

        fn at(&mut self, ms: u32) -> MotorState {
            self.now = ms;
            self.tick()
        }

        fn set(&mut self, sensor: Sensor, engaged: bool) {
            self.sensors = self.sensors.with(sensor, engaged);
        }

        /// Command from the backward endstop and run until the move has started at `t0`.
        fn launch_forward(&mut self, t0: u32) {
            assert!(self.engine.command());
            assert_eq!(self.at(t0), MotorState::MoveStart);
            assert_eq!(self.at(t0), MotorState::Move { slow: false });
            self.set(Sensor::Endstop1, false);
        }
    }

    #[test]
    fn init_waits_for_timing() {
        let mut engine = MotorEngine::new(MotorId::Cart);
        let mut power = FakePower::default();
        let mut errors = ErrorCodes::default();
        assert!(!engine.command());
        engine.tick(
            Instant::from_ticks(10),
            &Sensors::default(),
            &mut power,
            &mut errors,
        );
        assert_eq!(engine.state(), MotorState::Init);
    }

    #[test]
    fn reaches_endstop_before_slowdown() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        assert!(b.power.is_enabled(Output::Elevator));
        assert_eq!(b.power.speed[0], Speed::Fast);

        let mut t = 10;
        while t < 1850 {
            assert_eq!(b.at(t), MotorState::Move { slow: false });
            t += 10;
        }
        b.set(Sensor::Endstop2, true);
        assert_eq!(b.at(1850), MotorState::MoveEnd);
        assert!(!b.power.speed_log.contains(&(MotorId::Elevator, Speed::Slow)));
        assert!(b.errors.is_empty());

        assert_eq!(b.at(1860), MotorState::DelayPostChange);
        assert!(!b.power.is_enabled(Output::Elevator));
        assert_eq!(b.at(2009), MotorState::DelayPostChange);
        assert_eq!(b.at(2010), MotorState::Idle);
    }

    #[test]
    fn slows_once_past_slowdown_threshold() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);

        assert_eq!(b.at(1939), MotorState::Move { slow: false });
        assert_eq!(b.power.speed[0], Speed::Fast);
        assert_eq!(b.at(1940), MotorState::Move { slow: true });
        assert_eq!(b.power.speed[0], Speed::Slow);
        b.at(2000);
        b.at(2100);
        let slows = b
            .power
            .speed_log
            .iter()
            .filter(|&&e| e == (MotorId::Elevator, Speed::Slow))
            .count();
        assert_eq!(slows, 1);

        b.set(Sensor::Endstop2, true);
        assert_eq!(b.at(2150), MotorState::MoveEnd);
        assert!(b.errors.is_empty());
    }

    #[test]
    fn times_out_into_safety_reverse() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);

        assert_eq!(b.at(3499), MotorState::Move { slow: true });
        assert_eq!(b.at(3500), MotorState::SafetyReverseEndstopFail);
        assert!(!b.power.is_enabled(Output::Elevator));
        assert!(b.errors.is_set(fault_code(MotorId::Elevator, Direction::Forward)));
        assert!(!b.errors.is_critical());
    }

    #[test]
    fn command_requires_resting_endstop() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.set(Sensor::Endstop1, false);
        assert!(b.engine.command());
        assert_eq!(b.at(0), MotorState::Idle);
        assert_eq!(b.at(100), MotorState::Idle);

        // Both engaged is equally ambiguous.
        b.set(Sensor::Endstop1, true);
        b.set(Sensor::Endstop2, true);
        assert!(b.engine.command());
        assert_eq!(b.at(200), MotorState::Idle);
        assert!(!b.power.any_motor_enabled());
    }

    #[test]
    fn reversal_goes_through_relay_delay() {
        let mut b = Bench::new(Sensor::Endstop2);
        assert!(b.engine.command());
        assert_eq!(b.at(0), MotorState::DelayPreChange);
        assert_eq!(b.power.direction[0], Direction::Forward);
        assert_eq!(b.at(99), MotorState::DelayPreChange);
        assert_eq!(b.at(100), MotorState::MoveStart);
        assert_eq!(b.power.direction[0], Direction::Backward);
        assert!(!b.power.is_enabled(Output::Elevator));
        assert_eq!(b.at(110), MotorState::Move { slow: false });
        assert!(b.power.is_enabled(Output::Elevator));
    }

    #[test]
    fn endstop_before_near_is_early() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        b.set(Sensor::Endstop2, true);
        assert_eq!(b.at(150), MotorState::SafetyReverseEndstopEarly);
        assert!(b.errors.is_set(1));
    }

    #[test]
    fn start_endstop_reengaging_is_early() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        b.at(500);
        b.set(Sensor::Endstop1, true);
        assert_eq!(b.at(600), MotorState::SafetyReverseEndstopEarly);
    }

    #[test]
    fn safety_reverse_heads_back_and_recovers() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        assert_eq!(b.at(3500), MotorState::SafetyReverseEndstopFail);

        assert_eq!(b.at(5499), MotorState::SafetyReverseEndstopFail);
        assert_eq!(b.at(5500), MotorState::DelayPreChange);
        assert_eq!(b.at(5600), MotorState::MoveStart);
        assert_eq!(b.power.direction[0], Direction::Backward);
        assert_eq!(b.at(5600), MotorState::Move { slow: false });

        b.set(Sensor::Endstop1, true);
        assert_eq!(b.at(7000), MotorState::MoveEnd);
        assert!(b.errors.is_set(1));
        b.at(7010);
        assert!(b.errors.is_empty());
        b.at(7200);
        assert!(b.engine.is_idle());

        // A completed move restores the retry budget. The relay is left backward, so the next
        // forward move waits out the pre-change delay first.
        assert!(b.engine.command());
        assert_eq!(b.at(8000), MotorState::DelayPreChange);
        assert_eq!(b.at(8100), MotorState::MoveStart);
        assert_eq!(b.at(8100), MotorState::Move { slow: false });
        b.set(Sensor::Endstop1, false);
        assert_eq!(b.at(11_600), MotorState::SafetyReverseEndstopFail);
        assert!(!b.errors.is_critical());
    }

    #[test]
    fn early_endstop_recovers_by_reversing() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        b.set(Sensor::Endstop2, true);
        assert_eq!(b.at(150), MotorState::SafetyReverseEndstopEarly);

        assert_eq!(b.at(2150), MotorState::DelayPreChange);
        assert_eq!(b.at(2250), MotorState::MoveStart);
        assert_eq!(b.at(2250), MotorState::Move { slow: false });
        assert_eq!(b.power.direction[0], Direction::Backward);

        // Back home well inside the near threshold of a full backward travel.
        b.set(Sensor::Endstop2, false);
        assert_eq!(b.at(2260), MotorState::Move { slow: false });
        b.set(Sensor::Endstop1, true);
        assert_eq!(b.at(2400), MotorState::MoveEnd);
        b.at(2410);
        assert!(b.errors.is_empty());
        assert!(!b.power.is_enabled(Output::Elevator));
    }

    #[test]
    fn start_endstop_reengaging_recovers_by_reversing() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        b.at(300);
        b.set(Sensor::Endstop1, true);
        assert_eq!(b.at(500), MotorState::SafetyReverseEndstopEarly);
        assert!(b.errors.is_set(fault_code(MotorId::Elevator, Direction::Forward)));

        // The reversal heads for the endstop that is already engaged.
        assert_eq!(b.at(2500), MotorState::DelayPreChange);
        assert_eq!(b.at(2600), MotorState::MoveStart);
        assert_eq!(b.at(2600), MotorState::Move { slow: false });
        assert_eq!(b.at(2610), MotorState::MoveEnd);
        b.at(2620);
        assert!(!b.errors.is_critical());
        assert!(b.errors.is_empty());
        b.at(2770);
        assert!(b.engine.is_idle());
    }

    #[test]
    fn second_fault_escalates_to_faulted() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        assert_eq!(b.at(3500), MotorState::SafetyReverseEndstopFail);
        b.at(5500);
        b.at(5600);
        assert_eq!(b.at(5600), MotorState::Move { slow: false });

        // Reversal also never finds its endstop.
        assert_eq!(b.at(5600 + 3500), MotorState::Faulted);
        assert!(b.errors.is_critical());
        assert!(!b.errors.is_set(1));
        assert_eq!(b.errors.iter().count(), 1);
        assert!(!b.power.is_enabled(Output::Elevator));

        // Terminal.
        assert!(!b.engine.command());
        b.set(Sensor::Endstop2, true);
        assert_eq!(b.at(20_000), MotorState::Faulted);
    }

    #[test]
    fn interlock_halts_without_reversing() {
        let mut b = Bench::new(Sensor::Endstop1);
        b.launch_forward(0);
        assert_eq!(b.at(3500), MotorState::SafetyReverseEndstopFail);

        b.power.enabled[Output::Cart.index()] = true;
        assert_eq!(b.at(3510), MotorState::Faulted);
        assert!(b.errors.is_critical());
        assert_eq!(b.power.direction[0], Direction::Forward);
        assert!(!b.power.is_enabled(Output::Elevator));
    }

    #[test]
    fn loader_fault_drops_magnet() {
        let mut engine = MotorEngine::new(MotorId::Loader).with_retries(0);
        let set = CalibrationSet::default();
        engine.load_timing(set.timing(MotorId::Loader), Instant::from_ticks(0));
        let mut power = FakePower::default();
        let mut errors = ErrorCodes::default();
        let sensors = Sensors::default().with(Sensor::Endstop5, true);

        engine.command();
        engine.tick(Instant::from_ticks(0), &sensors, &mut power, &mut errors);
        engine.tick(Instant::from_ticks(0), &sensors, &mut power, &mut errors);
        power.set_output(Output::LoaderMagnet, true);

        let moved = Sensors::default();
        engine.tick(Instant::from_ticks(10), &moved, &mut power, &mut errors);
        engine.tick(Instant::from_ticks(60_000), &moved, &mut power, &mut errors);
        assert!(engine.is_faulted());
        assert!(!power.is_enabled(Output::LoaderMagnet));
        assert!(!power.is_enabled(Output::Loader));
    }

    #[test]
    fn fault_codes_are_unique_per_motor_and_direction() {
        let mut seen = Vec::new();
        for m in MotorId::ALL {
            for d in [Direction::Forward, Direction::Backward] {
                let c = fault_code(m, d);
                assert!((1..ERR_CRITICAL).contains(&c));
                assert!(!seen.contains(&c));
                seen.push(c);
            }
        }
    }
}
