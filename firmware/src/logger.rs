// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! `log` backend writing to the debug USART.
//!
//! Lines look like `INFO  ewmc::control::engine: elevator: idle -> move start`. Records are written
//! with interrupts masked so a line never interleaves with another.

use core::cell::RefCell;
use core::fmt::Write;

use cortex_m::interrupt::{self, Mutex};
use log::{Level, Metadata, Record};
use stm32f7xx_hal::pac::USART1;

use crate::hw::Usart;

pub const LOG_LEVEL: Level = Level::Info;

struct SerialLogger {
    port: Mutex<RefCell<Option<Usart<USART1>>>>,
}

static LOGGER: SerialLogger = SerialLogger {
    port: Mutex::new(RefCell::new(None)),
};

/// Install the serial logger. A second call only swaps the port.
pub fn init(usart: Usart<USART1>, level: Level) {
    interrupt::free(|cs| {
        LOGGER.port.borrow(cs).replace(Some(usart));
    });
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level.to_level_filter());
    }
}

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        interrupt::free(|cs| {
            if let Some(tx) = self.port.borrow(cs).borrow_mut().as_mut() {
                let _ = writeln!(
                    tx,
                    "{:<5} {}: {}",
                    record.level(),
                    record.target(),
                    record.args()
                );
            }
        });
    }

    fn flush(&self) {
        interrupt::free(|cs| {
            if let Some(tx) = self.port.borrow(cs).borrow_mut().as_mut() {
                tx.flush();
            }
        });
    }
}
