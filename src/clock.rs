//! Free-running microsecond counter.
//!
//! The echo width is measured by sampling a hardware counter at both edges of
//! the pulse. Counters on small parts are often only 16 bits wide, so every
//! elapsed-time computation in this crate goes through [`span`], which takes
//! the difference modulo the counter period.

/// A raw counter value. One tick is one microsecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Tick(pub u32);

/// Mask selecting the significant bits of a `bits` wide counter.
#[inline]
pub const fn mask(bits: u32) -> u32 {
    if bits >= u32::BITS {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Ticks elapsed from `start` to `end` on a `bits` wide counter.
///
/// The result is only meaningful if the true elapsed time is shorter than one
/// counter period.
///
/// ```
/// use sr04::clock::{span, Tick};
///
/// assert_eq!(span(Tick(65530), Tick(10), 16), 16);
/// ```
#[inline]
pub const fn span(start: Tick, end: Tick, bits: u32) -> u32 {
    end.0.wrapping_sub(start.0) & mask(bits)
}

/// A monotonic counter ticking once per microsecond.
///
/// Reading the counter must not disturb it, and must be cheap enough to call
/// in a tight polling loop.
pub trait Clock {
    /// Width of the counter in bits. The counter wraps at `2^BITS`.
    const BITS: u32;

    /// Current counter value.
    fn now(&mut self) -> Tick;

    /// Ticks elapsed since `start`, wrap-corrected.
    #[inline]
    fn since(&mut self, start: Tick) -> u32 {
        let now = self.now();
        span(start, now, Self::BITS)
    }
}

impl<C: Clock + ?Sized> Clock for &mut C {
    const BITS: u32 = C::BITS;

    #[inline]
    fn now(&mut self) -> Tick {
        C::now(self)
    }
}

/// Accumulates elapsed ticks across any number of counter wraps, as long as
/// it is polled at least once per counter period.
#[derive(Debug)]
pub(crate) struct Stopwatch {
    last: Tick,
    elapsed: u64,
}

impl Stopwatch {
    pub(crate) fn start<C: Clock>(clock: &mut C) -> Self {
        Self::from_tick(clock.now())
    }

    pub(crate) fn from_tick(last: Tick) -> Self {
        Self { last, elapsed: 0 }
    }

    /// Fold in a fresh counter reading and return the total so far.
    pub(crate) fn lap<C: Clock>(&mut self, now: Tick) -> u64 {
        self.elapsed += u64::from(span(self.last, now, C::BITS));
        self.last = now;
        self.elapsed
    }
}

/// Host clock backed by [`std::time::Instant`], truncated to a 32-bit
/// microsecond counter.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Start a clock at zero.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    const BITS: u32 = 32;

    fn now(&mut self) -> Tick {
        Tick(self.origin.elapsed().as_micros() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u32);

    impl Clock for Fixed {
        const BITS: u32 = 16;

        fn now(&mut self) -> Tick {
            Tick(self.0)
        }
    }

    #[test]
    fn span_without_wrap() {
        assert_eq!(span(Tick(100), Tick(1276), 16), 1176);
        assert_eq!(span(Tick(7), Tick(7), 16), 0);
    }

    #[test]
    fn span_across_16_bit_wrap() {
        assert_eq!(span(Tick(65530), Tick(10), 16), 16);
        assert_eq!(span(Tick(65535), Tick(0), 16), 1);
    }

    #[test]
    fn span_across_32_bit_wrap() {
        assert_eq!(span(Tick(u32::MAX - 1), Tick(3), 32), 5);
    }

    #[test]
    fn mask_widths() {
        assert_eq!(mask(16), 0xffff);
        assert_eq!(mask(24), 0x00ff_ffff);
        assert_eq!(mask(32), u32::MAX);
    }

    #[test]
    fn since_is_wrap_corrected() {
        let mut clock = Fixed(4);
        assert_eq!(clock.since(Tick(65000)), 540);
    }

    #[test]
    fn stopwatch_survives_multiple_wraps() {
        let mut watch = Stopwatch::from_tick(Tick(0));
        let mut total = 0;
        for step in 1..=10u32 {
            total = watch.lap::<Fixed>(Tick((step * 30_000) & 0xffff));
        }
        assert_eq!(total, 300_000);
    }

    #[cfg(feature = "std")]
    #[test]
    fn std_clock_moves_forward() {
        let mut clock = StdClock::new();
        let start = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.since(start) >= 2000);
    }
}
