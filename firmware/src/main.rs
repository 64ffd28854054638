// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Firmware for the EWMC coal mine module on an STM32F777.
//!
//! Brings up the board, loads calibration from backup SRAM and hands control to [`Rig`]. Holding
//! the button through reset, or booting without a usable calibration record, runs the calibration
//! routine first.

#![no_main]
#![no_std]

use cortex_m_rt::entry;
use log::{error, info, warn};
use panic_halt as _;

use hal::{
    pac,
    prelude::*,
    serial::{Config, Serial},
    spi::{Mode, Phase, Polarity, Spi},
};
use stm32f7xx_hal as hal;

use ewmc::control::{CalibrationEngine, Progress, Rig};
use ewmc::drivers::{Clip, Isd1700, PowerStage, StatusLed};
use ewmc::hw::Led;
use ewmc::motors::{Factors, MotorId};
use ewmc::storage::CalibrationStore;

mod clock;
mod hw;
mod logger;

use clock::{Millis, SysTickDelay};
use hw::{BackupSram, BoardPins, ChipSelect, IsdLink, SpiBus, Tim4Pwm, Usart};

/// Offset of the calibration record in backup SRAM.
const STORE_BASE: u32 = 0;

#[entry]
fn main() -> ! {
    // Peripherals
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    // Clocks
    let rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.freeze();
    let mut apb2 = rcc.apb2;
    clock::init(cp.SYST, &clocks);

    let pins = BoardPins::new(dp.GPIOA, dp.GPIOC, dp.GPIOD, dp.GPIOE);

    // USART1 (DBG)
    let usart_cfg = Config {
        baud_rate: 115_200.bps(),
        ..Default::default()
    };
    let serial = Serial::new(dp.USART1, (pins.usart1.tx, pins.usart1.rx), &clocks, usart_cfg);
    logger::init(Usart::new(serial), logger::LOG_LEVEL);
    info!("ewmc {} starting", env!("CARGO_PKG_VERSION"));

    // SPI4 to the ISD1700, mode 3
    let spi_mode = Mode {
        polarity: Polarity::IdleHigh,
        phase: Phase::CaptureOnSecondTransition,
    };
    let spi4 = Spi::new(dp.SPI4, (pins.spi4.sck, pins.spi4.miso, pins.spi4.mosi))
        .enable::<u8>(spi_mode, 1.MHz(), &clocks, &mut apb2);
    let link = IsdLink::new(SpiBus::new(spi4), ChipSelect::active_low(pins.spi4.cs));
    let mut audio = Isd1700::new(link, Millis, SysTickDelay);
    if let Err(e) = audio.init() {
        error!("audio: init failed: {:?}", e);
    }

    // Motor outputs
    let power = PowerStage::new(Tim4Pwm::new(dp.TIM4, &clocks).split(), pins.relays);

    let errors = StatusLed::new(Led::active_low(pins.status), Millis);
    let mut store = CalibrationStore::new(BackupSram::new(dp.PWR), STORE_BASE);

    let mut rig = Rig::new(power, audio, errors, Millis)
        .with_cue(MotorId::Elevator, Clip::Canary)
        .with_cue(MotorId::Cart, Clip::Cough1)
        .with_cue(MotorId::Loader, Clip::Explosion);

    let inputs = pins.inputs;
    let requested = inputs.button_held();
    rig.preset_inputs(inputs.read());
    let loaded = rig.boot(&mut store);

    if requested || !loaded {
        info!("calibration: starting (requested: {})", requested);
        let mut cal = CalibrationEngine::new(Factors::default());
        if let Some(previous) = rig.calibration().copied() {
            cal = cal.with_previous(&previous);
        }
        match rig.calibrate(cal, &mut store, || inputs.read()) {
            Progress::Finished(_) => info!("calibration: done"),
            Progress::Aborted => warn!("calibration: cancelled"),
            Progress::Failed(fault) => error!("calibration: failed: {:?}", fault),
            Progress::Running => {}
        }
    }

    info!("entering control loop");
    loop {
        rig.tick(inputs.read());
    }
}
