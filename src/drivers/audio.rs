// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Audio playback interface.
//!
//! The chip plays one clip at a time. A request made while a clip is still playing is rejected;
//! the playing clip always runs to completion.

/// Number of stored clips.
pub const CLIP_COUNT: usize = 5;

/// A stored audio clip.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Clip {
    Beep = 0,
    Explosion = 1,
    Canary = 2,
    Cough1 = 3,
    Cough2 = 4,
}

impl Clip {
    pub const ALL: [Clip; CLIP_COUNT] = [
        Clip::Beep,
        Clip::Explosion,
        Clip::Canary,
        Clip::Cough1,
        Clip::Cough2,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

pub trait AudioDriver {
    type Error;

    /// Start playback without waiting for it to finish.
    fn play(&mut self, clip: Clip) -> Result<(), Self::Error>;

    /// Whether a clip is still playing. Expires finished playback as a side effect.
    fn is_playing(&mut self) -> bool;

    /// Play the beep and block until it has finished plus a short settle gap.
    ///
    /// This is the only blocking call in the control loop. It waits at most for the longest clip
    /// plus the beep itself.
    fn beep(&mut self) -> Result<(), Self::Error>;
}
