// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! The control loop.
//!
//! [`Rig`] owns every collaborator and the three motion engines. One call to [`Rig::tick`] is one
//! loop iteration, in a fixed order:
//!
//! 1. sample and debounce every input;
//! 2. turn a button press into an advance command for each idle motor;
//! 3. advance the elevator, cart and loader engines, in that order;
//! 4. apply the loader magnet policy and any start cue;
//! 5. advance the error display and audio.
//!
//! Because motors are advanced in order, the interlock query made by one engine sees the current
//! tick's output state for motors ahead of it and the previous tick's for motors behind it.
//!
//! Typical usage pattern:
//!
//! ```ignore
//! let mut rig = Rig::new(power, audio, errors, clock);
//! rig.boot(&mut store);
//!
//! loop {
//!     rig.tick(read_inputs());
//! }
//! ```

use embedded_storage::Storage;
use log::{info, warn};

use crate::config::ERR_STORE;
use crate::control::calibration::{CalibrationEngine, Progress};
use crate::control::engine::{MotorEngine, MotorState};
use crate::drivers::audio::{AudioDriver, Clip};
use crate::drivers::power::{Output, PowerDriver};
use crate::drivers::status_led::ErrorDisplay;
use crate::motors::{CalibrationSet, Direction, MotorId, MOTOR_COUNT};
use crate::sensors::{Debouncer, Sensors, SENSOR_COUNT};
use crate::storage::{self, CalibrationStore};
use crate::time::Clock;

pub struct Rig<P, A, E, C> {
    power: P,
    audio: A,
    errors: E,
    clock: C,
    debouncer: Debouncer,
    engines: [MotorEngine; MOTOR_COUNT],
    cues: [Option<Clip>; MOTOR_COUNT],
    calibration: Option<CalibrationSet>,
}

impl<P, A, E, C> Rig<P, A, E, C>
where
    P: PowerDriver,
    A: AudioDriver,
    E: ErrorDisplay,
    C: Clock,
{
    /// Engines start in `INIT` and hold there until calibration is installed.
    pub fn new(power: P, audio: A, errors: E, clock: C) -> Self {
        Self {
            power,
            audio,
            errors,
            clock,
            debouncer: Debouncer::default(),
            engines: MotorId::ALL.map(MotorEngine::new),
            cues: [None; MOTOR_COUNT],
            calibration: None,
        }
    }

    /// Clip played whenever `motor` sets off forward.
    pub fn with_cue(mut self, motor: MotorId, clip: Clip) -> Self {
        self.cues[motor.index()] = Some(clip);
        self
    }

    pub fn with_debouncer(mut self, debouncer: Debouncer) -> Self {
        self.debouncer = debouncer;
        self
    }

    /// Load stored calibration. On failure the store error code is flagged and the motors stay in
    /// `INIT` until a calibration run succeeds.
    pub fn boot<S: Storage>(&mut self, store: &mut CalibrationStore<S>) -> bool {
        match store.load() {
            Ok(set) => {
                info!("boot: calibration loaded");
                self.install(&set);
                true
            }
            Err(e) => {
                let why = match e {
                    storage::Error::Blank => "missing",
                    storage::Error::Corrupt => "corrupt",
                    storage::Error::Storage(_) => "unreadable",
                };
                warn!("boot: stored calibration {}", why);
                self.errors.flag(ERR_STORE);
                false
            }
        }
    }

    /// Take `raw` as the settled input state, so switches already closed at power-up (a held
    /// button included) do not register as fresh presses.
    pub fn preset_inputs(&mut self, raw: [bool; SENSOR_COUNT]) {
        self.debouncer.preset(raw);
    }

    /// Seed every idle engine with `set`.
    pub fn install(&mut self, set: &CalibrationSet) {
        let now = self.clock.now();
        for engine in self.engines.iter_mut() {
            engine.load_timing(set.timing(engine.motor()), now);
        }
        self.calibration = Some(*set);
    }

    /// One iteration of the calibration routine. Installs the result once it finishes.
    pub fn calibration_tick<S: Storage>(
        &mut self,
        cal: &mut CalibrationEngine,
        raw: [bool; SENSOR_COUNT],
        store: &mut CalibrationStore<S>,
    ) -> Progress {
        let now = self.clock.now();
        let sensors = self.debouncer.sample(raw, now);
        let progress = cal.tick(
            now,
            &sensors,
            &mut self.power,
            &mut self.audio,
            &mut self.errors,
            store,
        );
        self.errors.update();
        self.audio.is_playing();

        if let Progress::Finished(set) = progress {
            self.errors.clear_code(ERR_STORE);
            self.install(&set);
        }
        progress
    }

    /// Run calibration to completion, sampling inputs with `read`.
    pub fn calibrate<S, F>(
        &mut self,
        mut cal: CalibrationEngine,
        store: &mut CalibrationStore<S>,
        mut read: F,
    ) -> Progress
    where
        S: Storage,
        F: FnMut() -> [bool; SENSOR_COUNT],
    {
        loop {
            let progress = self.calibration_tick(&mut cal, read(), store);
            if progress != Progress::Running {
                return progress;
            }
        }
    }

    /// One control-loop iteration.
    pub fn tick(&mut self, raw: [bool; SENSOR_COUNT]) -> Sensors {
        let now = self.clock.now();
        let sensors = self.debouncer.sample(raw, now);

        if sensors.button_pressed() {
            if self.errors.is_critical() {
                warn!("rig halted, ignoring button");
            } else {
                for engine in self.engines.iter_mut() {
                    engine.command();
                }
            }
        }

        for i in 0..MOTOR_COUNT {
            self.engines[i].tick(now, &sensors, &mut self.power, &mut self.errors);
            self.cue(i);
        }
        self.magnet();

        self.errors.update();
        self.audio.is_playing();
        sensors
    }

    /// Issue an advance command to a single motor, as a button press would.
    pub fn command(&mut self, motor: MotorId) -> bool {
        if self.errors.is_critical() {
            return false;
        }
        self.engines[motor.index()].command()
    }

    fn cue(&mut self, i: usize) {
        let engine = &self.engines[i];
        if engine.state() != MotorState::MoveStart || engine.direction() != Direction::Forward {
            return;
        }
        if let Some(clip) = self.cues[i] {
            if self.audio.play(clip).is_err() {
                warn!("{}: cue skipped, audio busy", engine.motor().name());
            }
        }
    }

    /// The magnet holds while the loader travels forward and is released otherwise.
    fn magnet(&mut self) {
        let loader = &self.engines[MotorId::Loader.index()];
        let hold = loader.is_moving() && loader.direction() == Direction::Forward;
        if self.power.is_enabled(Output::LoaderMagnet) != hold {
            self.power.set_output(Output::LoaderMagnet, hold);
        }
    }

    #[inline]
    pub fn engine(&self, motor: MotorId) -> &MotorEngine {
        &self.engines[motor.index()]
    }

    #[inline]
    pub fn state(&self, motor: MotorId) -> MotorState {
        self.engines[motor.index()].state()
    }

    /// Calibration currently in effect, if any.
    #[inline]
    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_ref()
    }

    #[inline]
    pub fn power(&self) -> &P {
        &self.power
    }

    #[inline]
    pub fn errors(&self) -> &E {
        &self.errors
    }

    #[inline]
    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn free(self) -> (P, A, E, C) {
        (self.power, self.audio, self.errors, self.clock)
    }
}
