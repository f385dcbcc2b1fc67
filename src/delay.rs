//! Busy-wait delays measured against a [`Clock`].
//!
//! Counting instructions ties delay length to the core frequency and to the
//! optimiser. Polling the microsecond counter instead gives delays that are
//! correct on any core, at the cost of spinning the CPU.

use embedded_hal::delay::DelayNs;

use crate::clock::{Clock, Stopwatch};

/// A blocking [`DelayNs`] that spins on a [`Clock`].
///
/// Resolution is one tick, so nanosecond requests are rounded up to the next
/// whole microsecond. Delays longer than the counter period are fine.
#[derive(Debug)]
pub struct ClockDelay<C> {
    clock: C,
}

impl<C: Clock> ClockDelay<C> {
    /// Wrap a clock. Pass `&mut clock` to borrow a clock owned elsewhere.
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Give the clock back.
    pub fn release(self) -> C {
        self.clock
    }

    /// Spin for at least `us` microseconds.
    pub fn wait_us(&mut self, us: u64) {
        let mut watch = Stopwatch::start(&mut self.clock);
        while watch.lap::<C>(self.clock.now()) < us {
            core::hint::spin_loop();
        }
    }
}

impl<C: Clock> DelayNs for ClockDelay<C> {
    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        self.wait_us(u64::from(ns.div_ceil(1000)));
    }

    #[inline]
    fn delay_us(&mut self, us: u32) {
        self.wait_us(u64::from(us));
    }

    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        self.wait_us(u64::from(ms) * 1000);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::sim::SimSensor;

    #[test]
    fn waits_at_least_the_requested_time() {
        let sensor = SimSensor::new();
        let mut delay = ClockDelay::new(sensor.clock());

        delay.delay_us(10);
        let after_short = sensor.elapsed_us();
        assert!((10..=12).contains(&after_short), "{after_short}");

        delay.delay_ms(100);
        let after_long = sensor.elapsed_us() - after_short;
        assert!((100_000..=100_002).contains(&after_long), "{after_long}");
    }

    #[test]
    fn nanoseconds_round_up_to_a_tick() {
        let sensor = SimSensor::new();
        let mut delay = ClockDelay::new(sensor.clock());

        delay.delay_ns(1);
        assert!(sensor.elapsed_us() >= 1);
    }

    #[test]
    fn zero_returns_immediately() {
        let sensor = SimSensor::new();
        let mut delay = ClockDelay::new(sensor.clock());

        delay.delay_us(0);
        assert!(sensor.elapsed_us() <= 2);
    }
}
