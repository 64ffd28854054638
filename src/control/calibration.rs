// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Two-stage calibration routine.
//!
//! Stage 1 walks the operator through the six endstops in order. For each one the operator holds
//! the endstop and presses the button; a beep confirms it. Endstops that were already engaged
//! when the step began, such as the ones parked motors rest on, are ignored. Pressing with some
//! other endstop newly engaged is a wiring fault, pressing with neither cancels the run.
//!
//! Stage 2 measures each motor in turn. A motor not resting on an endstop is first driven
//! backward until it finds one. From there it is driven to the other endstop of its pair and back
//! again, one leg in each direction. The first leg is forward unless the previous calibration
//! says the motor rests on its forward end; if the resting endstop has not released after
//! [`CAL_RELEASE_TIMEOUT`] the guess was wrong and the leg is reversed. Every drive is preceded by
//! a settle period with the output off and the relay already switched, and is bounded by
//! [`CAL_TIMEOUT`].
//!
//! Nothing is written until all six measurements succeed; the complete set is then saved in one
//! block. A button press during stage 2 cancels the run.

use embedded_storage::Storage;
use log::{error, info, warn};

use crate::config::{
    CAL_RELEASE_TIMEOUT, CAL_STAGE_DELAY, CAL_TIMEOUT, ERR_CAL_TIMEOUT, ERR_CAL_WIRING, ERR_STORE,
};
use crate::drivers::audio::AudioDriver;
use crate::drivers::power::PowerDriver;
use crate::drivers::status_led::ErrorDisplay;
use crate::motors::{CalibrationSet, Direction, Factors, MotorId, Speed, MOTOR_COUNT};
use crate::sensors::{Sensor, Sensors};
use crate::storage::CalibrationStore;
use crate::time::{elapsed, Duration, Instant};

/// Why a calibration run failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CalibrationFault {
    /// The operator confirmed while `found` was engaged instead of `expected`.
    Wiring { expected: Sensor, found: Sensor },
    /// Both endstops of a motor read engaged.
    BothEndstops(MotorId),
    /// A drive did not reach its endstop within the calibration timeout.
    Timeout { motor: MotorId, direction: Direction },
    /// The finished set could not be written.
    Store,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Progress {
    Running,
    Finished(CalibrationSet),
    /// Cancelled by the operator. Stored calibration is untouched.
    Aborted,
    Failed(CalibrationFault),
}

/// One drive of a motor during stage 2.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Leg {
    /// Unmeasured drive to find a starting endstop.
    Seek,
    Forward,
    Backward,
}

impl Leg {
    #[inline]
    pub fn direction(self) -> Direction {
        match self {
            Leg::Forward => Direction::Forward,
            Leg::Seek | Leg::Backward => Direction::Backward,
        }
    }

    #[inline]
    fn reversed(self) -> Self {
        match self {
            Leg::Forward => Leg::Backward,
            Leg::Backward => Leg::Forward,
            Leg::Seek => Leg::Seek,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Waiting for the operator to confirm `Sensor::ENDSTOPS[index]`.
    Validate { index: usize },
    Settle { motor: MotorId, leg: Leg },
    Drive { motor: MotorId, leg: Leg },
    Done,
}

pub struct CalibrationEngine {
    stage: Stage,
    entered: Instant,
    started: bool,
    factors: Factors,
    forward_ms: [u16; MOTOR_COUNT],
    backward_ms: [u16; MOTOR_COUNT],
    forward_endstop: [Sensor; MOTOR_COUNT],
    /// Forward endstops of the previous calibration, used to pick the first drive.
    hint: Option<[Sensor; MOTOR_COUNT]>,
    /// Endstops engaged continuously since the current stage 1 step began.
    resting: [bool; ENDSTOP_COUNT],
    /// Endstop the current leg started from.
    from: Sensor,
    /// Measured legs finished for the current motor.
    legs: u8,
    /// The current leg is a guess; if `from` does not release it is reversed.
    guessing: bool,
    outcome: Progress,
}

const ENDSTOP_COUNT: usize = Sensor::ENDSTOPS.len();

#[inline]
fn to_ms(d: Duration) -> u16 {
    d.to_millis().clamp(1, u16::MAX as u32 - 1) as u16
}

#[inline]
fn endstops(sensors: &Sensors) -> [bool; ENDSTOP_COUNT] {
    Sensor::ENDSTOPS.map(|s| sensors.is_engaged(s))
}

impl CalibrationEngine {
    /// Measured times will be stored together with `factors`.
    pub fn new(factors: Factors) -> Self {
        let defaults = CalibrationSet::default();
        Self {
            stage: Stage::Validate { index: 0 },
            entered: Instant::from_ticks(0),
            started: false,
            factors,
            forward_ms: defaults.forward_ms,
            backward_ms: defaults.backward_ms,
            forward_endstop: defaults.forward_endstop,
            hint: None,
            resting: [false; ENDSTOP_COUNT],
            from: Sensor::Endstop1,
            legs: 0,
            guessing: false,
            outcome: Progress::Running,
        }
    }

    /// Skip the wiring check and go straight to measurement.
    pub fn measure_only(factors: Factors) -> Self {
        let mut cal = Self::new(factors);
        cal.stage = Stage::Validate {
            index: Sensor::ENDSTOPS.len(),
        };
        cal
    }

    /// Start each motor toward the end `set` recorded as its forward end.
    pub fn with_previous(mut self, set: &CalibrationSet) -> Self {
        self.hint = Some(set.forward_endstop);
        self
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    pub fn progress(&self) -> Progress {
        self.outcome
    }

    fn enter(&mut self, stage: Stage, now: Instant) {
        self.stage = stage;
        self.entered = now;
    }

    /// Advance the routine by one check.
    ///
    /// The first check only records which endstops are already engaged; a press is not acted on
    /// until the next one.
    #[allow(clippy::too_many_arguments)]
    pub fn tick<P, A, E, S>(
        &mut self,
        now: Instant,
        sensors: &Sensors,
        power: &mut P,
        audio: &mut A,
        errors: &mut E,
        store: &mut CalibrationStore<S>,
    ) -> Progress
    where
        P: PowerDriver + ?Sized,
        A: AudioDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
        S: Storage,
    {
        if self.outcome != Progress::Running {
            return self.outcome;
        }
        let first = !self.started;
        if first {
            self.started = true;
            self.entered = now;
            self.resting = endstops(sensors);
            info!("calibration: validating endstops");
        }

        match self.stage {
            Stage::Validate { index } if index >= Sensor::ENDSTOPS.len() => {
                info!("calibration: measuring travel");
                self.begin_motor(MotorId::Elevator, false, now, sensors, power, errors);
            }

            Stage::Validate { index } => {
                let current = endstops(sensors);
                for (rest, engaged) in self.resting.iter_mut().zip(current) {
                    *rest &= engaged;
                }
                if !first && sensors.button_pressed() {
                    self.confirm(index, now, sensors, power, audio, errors);
                }
            }

            Stage::Settle { motor, leg } => {
                if sensors.button_pressed() {
                    self.abort(power);
                } else if elapsed(now, self.entered) >= CAL_STAGE_DELAY {
                    power.set_speed(motor, Speed::Fast);
                    power.set_output(motor.into(), true);
                    self.enter(Stage::Drive { motor, leg }, now);
                }
            }

            Stage::Drive { motor, leg } => {
                if sensors.button_pressed() {
                    self.abort(power);
                } else {
                    self.drive(motor, leg, now, sensors, power, audio, errors, store);
                }
            }

            Stage::Done => {}
        }

        self.outcome
    }

    /// Endstops that stayed engaged since the step began (a motor parked on them) are ignored;
    /// only one engaged since then counts against the expected endstop.
    fn confirm<P, A, E>(
        &mut self,
        index: usize,
        now: Instant,
        sensors: &Sensors,
        power: &mut P,
        audio: &mut A,
        errors: &mut E,
    ) where
        P: PowerDriver + ?Sized,
        A: AudioDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        let expected = Sensor::ENDSTOPS[index];
        let stray = Sensor::ENDSTOPS
            .iter()
            .zip(self.resting)
            .find(|&(&s, rest)| s != expected && !rest && sensors.is_engaged(s))
            .map(|(&s, _)| s);

        match (sensors.is_engaged(expected), stray) {
            (true, None) => {
                audio.beep().ok();
                info!("calibration: endstop {} ok", index + 1);
                self.resting = endstops(sensors);
                self.enter(Stage::Validate { index: index + 1 }, now);
            }
            (_, Some(found)) => {
                error!("calibration: expected {:?}, found {:?}", expected, found);
                self.fail(
                    CalibrationFault::Wiring { expected, found },
                    ERR_CAL_WIRING,
                    power,
                    errors,
                );
            }
            (false, None) => self.abort(power),
        }
    }

    /// Pick the first drive of `motor` from the endstops it rests on. After a seek the motor is
    /// at its backward end. Otherwise the orientation is guessed, from the previous calibration
    /// when there is one, and the first leg is reversed if the guess proves wrong.
    fn begin_motor<P, E>(
        &mut self,
        motor: MotorId,
        from_seek: bool,
        now: Instant,
        sensors: &Sensors,
        power: &mut P,
        errors: &mut E,
    ) where
        P: PowerDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        let pair = motor.endstops();
        match sensors.engaged_count(&pair) {
            0 => self.settle(motor, Leg::Seek, now, power),
            1 => {
                self.from = if sensors.is_engaged(pair[0]) {
                    pair[0]
                } else {
                    pair[1]
                };
                self.legs = 0;
                self.guessing = !from_seek;

                let front = self
                    .hint
                    .map(|h| h[motor.index()])
                    .filter(|&s| motor.owns(s));
                let leg = if !from_seek && front == Some(self.from) {
                    Leg::Backward
                } else {
                    Leg::Forward
                };
                self.settle(motor, leg, now, power);
            }
            _ => {
                error!("calibration: {} has both endstops engaged", motor.name());
                self.fail(
                    CalibrationFault::BothEndstops(motor),
                    ERR_CAL_WIRING,
                    power,
                    errors,
                );
            }
        }
    }

    fn settle<P>(&mut self, motor: MotorId, leg: Leg, now: Instant, power: &mut P)
    where
        P: PowerDriver + ?Sized,
    {
        power.set_output(motor.into(), false);
        power.set_direction(motor, leg.direction());
        self.enter(Stage::Settle { motor, leg }, now);
    }

    #[allow(clippy::too_many_arguments)]
    fn drive<P, A, E, S>(
        &mut self,
        motor: MotorId,
        leg: Leg,
        now: Instant,
        sensors: &Sensors,
        power: &mut P,
        audio: &mut A,
        errors: &mut E,
        store: &mut CalibrationStore<S>,
    ) where
        P: PowerDriver + ?Sized,
        A: AudioDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
        S: Storage,
    {
        let t = elapsed(now, self.entered);
        let i = motor.index();
        let target = motor.opposite(self.from).unwrap_or(self.from);

        let arrived = match leg {
            Leg::Seek => sensors.any_engaged(&motor.endstops()),
            Leg::Forward | Leg::Backward => sensors.is_engaged(target),
        };

        if arrived {
            power.set_output(motor.into(), false);
            match leg {
                Leg::Seek => {
                    self.begin_motor(motor, true, now, sensors, power, errors);
                    return;
                }
                Leg::Forward => {
                    self.forward_ms[i] = to_ms(t);
                    self.forward_endstop[i] = target;
                    info!("calibration: {} forward {} ms", motor.name(), t.to_millis());
                }
                Leg::Backward => {
                    self.backward_ms[i] = to_ms(t);
                    self.forward_endstop[i] = self.from;
                    info!("calibration: {} backward {} ms", motor.name(), t.to_millis());
                }
            }

            self.legs += 1;
            if self.legs < 2 {
                self.from = target;
                self.settle(motor, leg.reversed(), now, power);
            } else {
                match MotorId::from_u8(motor as u8 + 1) {
                    Some(next) => self.begin_motor(next, false, now, sensors, power, errors),
                    None => self.finish(audio, errors, store),
                }
            }
            return;
        }

        if self.guessing {
            if !sensors.is_engaged(self.from) {
                self.guessing = false;
            } else if t >= CAL_RELEASE_TIMEOUT {
                power.set_output(motor.into(), false);
                info!(
                    "calibration: {} did not leave {:?}, reversing",
                    motor.name(),
                    self.from
                );
                self.guessing = false;
                self.settle(motor, leg.reversed(), now, power);
                return;
            }
        }

        if t >= CAL_TIMEOUT {
            let direction = leg.direction();
            error!(
                "calibration: {} timed out driving {:?}",
                motor.name(),
                direction
            );
            self.fail(
                CalibrationFault::Timeout { motor, direction },
                ERR_CAL_TIMEOUT,
                power,
                errors,
            );
        }
    }

    fn finish<A, E, S>(&mut self, audio: &mut A, errors: &mut E, store: &mut CalibrationStore<S>)
    where
        A: AudioDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
        S: Storage,
    {
        let set = CalibrationSet {
            forward_ms: self.forward_ms,
            backward_ms: self.backward_ms,
            forward_endstop: self.forward_endstop,
            factors: self.factors,
        };
        self.stage = Stage::Done;

        match store.save(&set) {
            Ok(()) => {
                info!("calibration: saved");
                errors.clear_code(ERR_STORE);
                audio.beep().ok();
                audio.beep().ok();
                self.outcome = Progress::Finished(set);
            }
            Err(_) => {
                error!("calibration: could not save");
                errors.flag(ERR_STORE);
                self.outcome = Progress::Failed(CalibrationFault::Store);
            }
        }
    }

    fn abort<P>(&mut self, power: &mut P)
    where
        P: PowerDriver + ?Sized,
    {
        warn!("calibration: cancelled");
        all_off(power);
        self.stage = Stage::Done;
        self.outcome = Progress::Aborted;
    }

    fn fail<P, E>(&mut self, fault: CalibrationFault, code: u8, power: &mut P, errors: &mut E)
    where
        P: PowerDriver + ?Sized,
        E: ErrorDisplay + ?Sized,
    {
        all_off(power);
        errors.flag(code);
        self.stage = Stage::Done;
        self.outcome = Progress::Failed(fault);
    }
}

fn all_off<P: PowerDriver + ?Sized>(power: &mut P) {
    for m in MotorId::ALL {
        power.set_output(m.into(), false);
    }
}
