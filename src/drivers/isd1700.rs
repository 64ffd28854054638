// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! ISD1700 ChipCorder driver.
//!
//! The chip takes short command frames over SPI. Bits go out LSB-first; this driver hands
//! logical bytes to the [`SpiDevice`] and leaves bit order to the bus implementation.
//!
//! Playback length is not read back from the chip. Each clip has a known duration and the driver
//! treats it as playing until that much time has passed.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::config::{BEEP_DELAY, ISD_APC_CONFIG, ISD_POWER_UP_DELAY};
use crate::drivers::audio::{AudioDriver, Clip, CLIP_COUNT};
use crate::time::{elapsed, Clock, Duration, Instant};

// Command bytes
pub mod cmd {
    pub const PU: u8 = 0x01;
    pub const STOP: u8 = 0x02;
    pub const WR_APC2: u8 = 0x65;
    pub const SET_PLAY: u8 = 0x80;
}

/// Message memory range and length of one clip.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClipDescriptor {
    pub start: u16,
    pub stop: u16,
    pub duration: Duration,
}

const fn clip(start: u16, stop: u16, ms: u32) -> ClipDescriptor {
    ClipDescriptor {
        start,
        stop,
        duration: Duration::millis(ms),
    }
}

/// Clip table, indexed by [`Clip`].
pub const CLIPS: [ClipDescriptor; CLIP_COUNT] = [
    clip(0x010, 0x010, 100),
    clip(0x011, 0x027, 2553),
    clip(0x028, 0x03E, 2506),
    clip(0x03F, 0x046, 854),
    clip(0x047, 0x04F, 1000),
];

#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// A clip is already playing.
    Busy,
    Spi(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Spi(e)
    }
}

/// `SET_PLAY` frame for a clip.
pub fn play_frame(desc: &ClipDescriptor) -> [u8; 7] {
    let [start_lo, start_hi] = desc.start.to_le_bytes();
    let [stop_lo, stop_hi] = desc.stop.to_le_bytes();
    [
        cmd::SET_PLAY,
        0x00,
        start_lo,
        start_hi,
        stop_lo,
        stop_hi,
        0x00,
    ]
}

struct Playback {
    started: Instant,
    duration: Duration,
}

pub struct Isd1700<SPI, C, D> {
    spi: SPI,
    clock: C,
    delay: D,
    playing: Option<Playback>,
}

impl<SPI, C, D> Isd1700<SPI, C, D>
where
    SPI: SpiDevice,
    C: Clock,
    D: DelayNs,
{
    pub fn new(spi: SPI, clock: C, delay: D) -> Self {
        Self {
            spi,
            clock,
            delay,
            playing: None,
        }
    }

    /// Power the chip up and load the default APC2 configuration.
    pub fn init(&mut self) -> Result<(), Error<SPI::Error>> {
        self.spi.write(&[cmd::PU, 0x00])?;
        self.delay.delay_ms(ISD_POWER_UP_DELAY.to_millis());
        self.set_config(ISD_APC_CONFIG)
    }

    /// Write the APC2 register (volume and output configuration).
    pub fn set_config(&mut self, word: u16) -> Result<(), Error<SPI::Error>> {
        let [lo, hi] = word.to_le_bytes();
        self.spi.write(&[cmd::WR_APC2, lo, hi])?;
        Ok(())
    }

    /// Cut the current clip short.
    pub fn stop(&mut self) -> Result<(), Error<SPI::Error>> {
        self.spi.write(&[cmd::STOP, 0x00])?;
        self.playing = None;
        Ok(())
    }

    fn remaining(&mut self) -> Option<Duration> {
        let (started, duration) = self.playing.as_ref().map(|p| (p.started, p.duration))?;
        let done = elapsed(self.clock.now(), started);
        if done >= duration {
            self.playing = None;
            None
        } else {
            Some(duration - done)
        }
    }

    pub fn free(self) -> (SPI, C, D) {
        (self.spi, self.clock, self.delay)
    }
}

impl<SPI, C, D> AudioDriver for Isd1700<SPI, C, D>
where
    SPI: SpiDevice,
    C: Clock,
    D: DelayNs,
{
    type Error = Error<SPI::Error>;

    fn play(&mut self, clip: Clip) -> Result<(), Self::Error> {
        if self.is_playing() {
            return Err(Error::Busy);
        }
        let desc = &CLIPS[clip.index()];
        self.spi.write(&play_frame(desc))?;
        self.playing = Some(Playback {
            started: self.clock.now(),
            duration: desc.duration,
        });
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        self.remaining().is_some()
    }

    fn beep(&mut self) -> Result<(), Self::Error> {
        if let Some(rest) = self.remaining() {
            self.delay.delay_ms(rest.to_millis());
            self.playing = None;
        }
        self.play(Clip::Beep)?;
        self.delay
            .delay_ms((CLIPS[Clip::Beep.index()].duration + BEEP_DELAY).to_millis());
        self.playing = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeClock, FakeDelay, FakeSpi};

    fn chip() -> (Isd1700<FakeSpi, FakeClock, FakeDelay>, FakeSpi, FakeClock) {
        let spi = FakeSpi::default();
        let clock = FakeClock::at(0);
        let isd = Isd1700::new(spi.clone(), clock.clone(), FakeDelay(clock.clone()));
        (isd, spi, clock)
    }

    #[test]
    fn init_powers_up_then_configures() {
        let (mut isd, spi, clock) = chip();
        isd.init().unwrap();
        assert_eq!(spi.frames(), vec![vec![0x01, 0x00], vec![0x65, 0xA0, 0x04]]);
        assert_eq!(clock.ms(), 50);
    }

    #[test]
    fn play_sends_pointer_frame() {
        let (mut isd, spi, _) = chip();
        isd.play(Clip::Canary).unwrap();
        assert_eq!(
            spi.frames(),
            vec![vec![0x80, 0x00, 0x28, 0x00, 0x3E, 0x00, 0x00]]
        );
    }

    #[test]
    fn second_request_is_rejected_while_playing() {
        let (mut isd, spi, clock) = chip();
        isd.play(Clip::Cough1).unwrap();
        clock.advance(853);
        assert_eq!(isd.play(Clip::Explosion), Err(Error::Busy));
        assert_eq!(spi.frames().len(), 1);

        clock.advance(1);
        assert!(!isd.is_playing());
        isd.play(Clip::Explosion).unwrap();
        assert_eq!(spi.frames().len(), 2);
    }

    #[test]
    fn beep_waits_for_active_clip() {
        let (mut isd, spi, clock) = chip();
        isd.play(Clip::Cough2).unwrap();
        clock.advance(400);
        isd.beep().unwrap();
        // 600 ms left of the cough, then 100 ms beep and 150 ms settle
        assert_eq!(clock.ms(), 400 + 600 + 100 + 150);
        assert_eq!(spi.frames()[1][2], 0x10);
        assert!(!isd.is_playing());
    }

    #[test]
    fn stop_clears_playback() {
        let (mut isd, spi, _) = chip();
        isd.play(Clip::Explosion).unwrap();
        isd.stop().unwrap();
        assert!(!isd.is_playing());
        assert_eq!(spi.frames()[1], vec![0x02, 0x00]);
    }
}
