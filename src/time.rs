// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Millisecond time base.
//!
//! All waits in the control loop are polled comparisons against a monotonic millisecond counter.
//! The counter is 32 bits wide and wraps after ~49 days, so elapsed time is always computed with
//! wrapping arithmetic.

/// Millisecond instant.
pub type Instant = fugit::TimerInstantU32<1000>;

/// Millisecond duration.
pub type Duration = fugit::MillisDurationU32;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock> Clock for &C {
    #[inline]
    fn now(&self) -> Instant {
        C::now(self)
    }
}

/// Time elapsed from `since` to `now`, tolerant of counter wrap.
#[inline]
pub fn elapsed(now: Instant, since: Instant) -> Duration {
    Duration::from_ticks(now.ticks().wrapping_sub(since.ticks()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_counter_wrap() {
        let since = Instant::from_ticks(u32::MAX - 9);
        let now = Instant::from_ticks(20);
        assert_eq!(elapsed(now, since), Duration::millis(30));
    }

    #[test]
    fn elapsed_is_zero_for_same_instant() {
        let t = Instant::from_ticks(1234);
        assert_eq!(elapsed(t, t).to_millis(), 0);
    }
}
