// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the STM32F777 on the coal mine module.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use stm32f7xx_hal::{
    gpio::{gpioa, gpioc, gpiod, gpioe, Alternate, Input, Output, PullUp, PushPull},
    pac,
    prelude::*,
};

use ewmc::sensors::SENSOR_COUNT;

/// All board pins. Construct this once at startup using:
///
/// ```rust
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOC, dp.GPIOD, dp.GPIOE);
/// ```
pub struct BoardPins {
    pub status: Line,
    pub usart1: Usart1Pins,
    pub spi4: Spi4Pins,
    pub pwm: Tim4Pins,
    pub relays: [Line; 3],
    pub inputs: InputPins,
}

pub struct Usart1Pins {
    pub tx: gpioa::PA9<Alternate<7>>,
    pub rx: gpioa::PA10<Alternate<7>>,
}

/// SPI4 SCK/MISO/MOSI to the ISD1700; CS is driven by hand.
pub struct Spi4Pins {
    pub sck: gpioe::PE12<Alternate<5>>,
    pub miso: gpioe::PE13<Alternate<5>>,
    pub mosi: gpioe::PE14<Alternate<5>>,
    pub cs: gpioe::PE4<Output<PushPull>>,
}

/// TIM4 CH1..CH4: elevator, cart, loader, loader magnet.
pub struct Tim4Pins {
    pub ch1: gpiod::PD12<Alternate<2>>,
    pub ch2: gpiod::PD13<Alternate<2>>,
    pub ch3: gpiod::PD14<Alternate<2>>,
    pub ch4: gpiod::PD15<Alternate<2>>,
}

/// Button and end switches. All close to ground.
pub struct InputPins {
    button: gpioc::PC6<Input<PullUp>>,
    endstop1: gpioc::PC0<Input<PullUp>>,
    endstop2: gpioc::PC1<Input<PullUp>>,
    endstop3: gpioc::PC2<Input<PullUp>>,
    endstop4: gpioc::PC3<Input<PullUp>>,
    endstop5: gpioc::PC4<Input<PullUp>>,
    endstop6: gpioc::PC5<Input<PullUp>>,
}

impl InputPins {
    /// Raw engaged state, indexed like `ewmc::sensors::Sensor`.
    pub fn read(&self) -> [bool; SENSOR_COUNT] {
        [
            self.button.is_low(),
            self.endstop1.is_low(),
            self.endstop2.is_low(),
            self.endstop3.is_low(),
            self.endstop4.is_low(),
            self.endstop5.is_low(),
            self.endstop6.is_low(),
        ]
    }

    #[inline]
    pub fn button_held(&self) -> bool {
        self.button.is_low()
    }
}

/// Push-pull output lines used through `embedded-hal` 1.0.
pub enum Line {
    Relay1(gpiod::PD1<Output<PushPull>>),
    Relay2(gpiod::PD2<Output<PushPull>>),
    Relay3(gpiod::PD3<Output<PushPull>>),
    Status(gpiod::PD8<Output<PushPull>>),
}

impl ErrorType for Line {
    type Error = Infallible;
}

impl OutputPin for Line {
    fn set_low(&mut self) -> Result<(), Infallible> {
        match self {
            Line::Relay1(p) => p.set_low(),
            Line::Relay2(p) => p.set_low(),
            Line::Relay3(p) => p.set_low(),
            Line::Status(p) => p.set_low(),
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        match self {
            Line::Relay1(p) => p.set_high(),
            Line::Relay2(p) => p.set_high(),
            Line::Relay3(p) => p.set_high(),
            Line::Status(p) => p.set_high(),
        }
        Ok(())
    }
}

impl BoardPins {
    /// Create all named pins from raw GPIO peripherals.
    pub fn new(gpioa: pac::GPIOA, gpioc: pac::GPIOC, gpiod: pac::GPIOD, gpioe: pac::GPIOE) -> Self {
        let gpioa = gpioa.split();
        let gpioc = gpioc.split();
        let gpiod = gpiod.split();
        let gpioe = gpioe.split();

        Self {
            status: Line::Status(gpiod.pd8.into_push_pull_output()),

            usart1: Usart1Pins {
                tx: gpioa.pa9.into_alternate::<7>(),
                rx: gpioa.pa10.into_alternate::<7>(),
            },

            spi4: Spi4Pins {
                sck: gpioe.pe12.into_alternate::<5>(),
                miso: gpioe.pe13.into_alternate::<5>(),
                mosi: gpioe.pe14.into_alternate::<5>(),
                cs: gpioe.pe4.into_push_pull_output(),
            },

            pwm: Tim4Pins {
                ch1: gpiod.pd12.into_alternate::<2>(),
                ch2: gpiod.pd13.into_alternate::<2>(),
                ch3: gpiod.pd14.into_alternate::<2>(),
                ch4: gpiod.pd15.into_alternate::<2>(),
            },

            relays: [
                Line::Relay1(gpiod.pd1.into_push_pull_output()),
                Line::Relay2(gpiod.pd2.into_push_pull_output()),
                Line::Relay3(gpiod.pd3.into_push_pull_output()),
            ],

            inputs: InputPins {
                button: gpioc.pc6.into_pull_up_input(),
                endstop1: gpioc.pc0.into_pull_up_input(),
                endstop2: gpioc.pc1.into_pull_up_input(),
                endstop3: gpioc.pc2.into_pull_up_input(),
                endstop4: gpioc.pc3.into_pull_up_input(),
                endstop5: gpioc.pc4.into_pull_up_input(),
                endstop6: gpioc.pc5.into_pull_up_input(),
            },
        }
    }
}
