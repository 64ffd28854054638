// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Four-channel PWM on TIM4 (PD12..PD15) via direct PAC register access.
//!
//! Channels 1-3 drive the elevator, cart and loader H-bridges, channel 4 the loader magnet.

use core::convert::Infallible;

use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use stm32f7xx_hal::{pac, rcc::Clocks};

/// PWM carrier frequency.
pub const PWM_FREQ_HZ: u32 = 1_000;

/// Counter period; duty is expressed in the same units.
const PERIOD: u16 = 1_000;

// OCxM = PWM mode 1, OCxPE = preload, for both channels of one CCMR register
const CCMR_PWM1_PRELOAD: u32 = (0b110 << 4) | (1 << 3) | (0b110 << 12) | (1 << 11);

pub struct Tim4Pwm {
    tim: pac::TIM4,
}

impl Tim4Pwm {
    /// Enable TIM4 and start all four channels at 0 % duty.
    pub fn new(tim: pac::TIM4, clocks: &Clocks) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb1enr.modify(|_, w| w.tim4en().set_bit());

        tim.cr1.modify(|_, w| w.cen().clear_bit());

        let psc = clocks.timclk1().raw() / (PWM_FREQ_HZ * PERIOD as u32) - 1;
        tim.psc.write(|w| unsafe { w.bits(psc) });
        tim.arr.write(|w| unsafe { w.bits(PERIOD as u32 - 1) });

        tim.ccmr1_output()
            .write(|w| unsafe { w.bits(CCMR_PWM1_PRELOAD) });
        tim.ccmr2_output()
            .write(|w| unsafe { w.bits(CCMR_PWM1_PRELOAD) });

        tim.ccr1.write(|w| unsafe { w.bits(0) });
        tim.ccr2.write(|w| unsafe { w.bits(0) });
        tim.ccr3.write(|w| unsafe { w.bits(0) });
        tim.ccr4.write(|w| unsafe { w.bits(0) });

        tim.ccer.modify(|_, w| {
            w.cc1e()
                .set_bit()
                .cc2e()
                .set_bit()
                .cc3e()
                .set_bit()
                .cc4e()
                .set_bit()
        });

        // Latch PSC/ARR, then run
        tim.egr.write(|w| w.ug().set_bit());
        tim.cr1.modify(|_, w| w.arpe().set_bit().cen().set_bit());

        Self { tim }
    }

    /// Hand out the four channels. The timer keeps running.
    pub fn split(self) -> [PwmChannel; 4] {
        [
            PwmChannel { ch: 1 },
            PwmChannel { ch: 2 },
            PwmChannel { ch: 3 },
            PwmChannel { ch: 4 },
        ]
    }
}

/// One TIM4 compare channel. Each channel only ever touches its own CCR.
pub struct PwmChannel {
    ch: u8,
}

impl ErrorType for PwmChannel {
    type Error = Infallible;
}

impl SetDutyCycle for PwmChannel {
    fn max_duty_cycle(&self) -> u16 {
        PERIOD
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        let tim = unsafe { &*pac::TIM4::ptr() };
        let duty = duty.min(PERIOD) as u32;
        match self.ch {
            1 => tim.ccr1.write(|w| unsafe { w.bits(duty) }),
            2 => tim.ccr2.write(|w| unsafe { w.bits(duty) }),
            3 => tim.ccr3.write(|w| unsafe { w.bits(duty) }),
            _ => tim.ccr4.write(|w| unsafe { w.bits(duty) }),
        }
        Ok(())
    }
}
