// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! 1 kHz millisecond tick on SysTick.

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use cortex_m_rt::exception;
use embedded_hal::delay::DelayNs;
use stm32f7xx_hal::rcc::Clocks;

use ewmc::time::{Clock, Instant};

static MILLIS: AtomicU32 = AtomicU32::new(0);

/// Start SysTick at 1 kHz from the core clock. The counter wraps after ~49 days.
pub fn init(mut syst: SYST, clocks: &Clocks) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(clocks.hclk().raw() / 1_000 - 1);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
}

#[exception]
fn SysTick() {
    MILLIS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn now_ms() -> u32 {
    MILLIS.load(Ordering::Relaxed)
}

/// Monotonic clock backed by the SysTick counter.
#[derive(Copy, Clone, Default)]
pub struct Millis;

impl Clock for Millis {
    fn now(&self) -> Instant {
        Instant::from_ticks(now_ms())
    }
}

/// Busy-wait delay on the SysTick counter. Sub-millisecond requests are rounded up.
#[derive(Copy, Clone, Default)]
pub struct SysTickDelay;

impl DelayNs for SysTickDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_ms(us.div_ceil(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        if ms == 0 {
            return;
        }
        // +1 so a partial first tick never shortens the wait
        let start = now_ms();
        while now_ms().wrapping_sub(start) < ms + 1 {
            cortex_m::asm::nop();
        }
    }
}
