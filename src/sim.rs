//! Simulated sensor for host-side testing.
//!
//! Every handle shares one timeline counted in microseconds. Time only moves
//! when the clock is read (one tick per read), or, for async code, when the
//! simulated delay is polled. That makes each run fully deterministic: a
//! polling loop that samples the echo line once per clock read measures a
//! pulse of `w` microseconds as exactly `w` ticks.

use std::{cell::Cell, convert::Infallible, rc::Rc};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::{
    clock::{mask, Clock, Tick},
    distance::cm_to_echo,
    SPEED_OF_SOUND_MPS,
};

/// Time from the trigger's falling edge to the echo's rising edge. The real
/// part spends this sending its 40 kHz burst.
pub const DEFAULT_LATENCY_US: u32 = 450;

/// How the simulated sensor answers a trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Never raise the echo line, like a disconnected sensor.
    Silent,
    /// Raise the echo line for this many microseconds.
    Pulse(u32),
    /// Raise the echo line and never drop it.
    StuckHigh,
}

#[derive(Debug)]
struct State {
    now: Cell<u64>,
    origin: u64,
    latency: Cell<u32>,
    response: Cell<Response>,
    echo: Cell<Option<(u64, u64)>>,
    trigger_high_since: Cell<Option<u64>>,
    last_trigger_width: Cell<Option<u64>>,
    triggers: Cell<u32>,
}

/// An HC-SR04 on a simulated timeline.
#[derive(Debug, Clone)]
pub struct SimSensor {
    state: Rc<State>,
}

impl Default for SimSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSensor {
    /// A silent sensor with the clock at zero.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// A silent sensor with the clock starting at `tick`. Useful to force a
    /// counter wrap in the middle of a measurement.
    pub fn starting_at(tick: u32) -> Self {
        let origin = u64::from(tick);
        Self {
            state: Rc::new(State {
                now: Cell::new(origin),
                origin,
                latency: Cell::new(DEFAULT_LATENCY_US),
                response: Cell::new(Response::Silent),
                echo: Cell::new(None),
                trigger_high_since: Cell::new(None),
                last_trigger_width: Cell::new(None),
                triggers: Cell::new(0),
            }),
        }
    }

    /// Answer the following triggers with `response`.
    pub fn respond(&self, response: Response) {
        self.state.response.set(response);
    }

    /// Answer the following triggers with an echo as wide as the round trip
    /// to a target `cm` centimetres away at [`SPEED_OF_SOUND_MPS`].
    pub fn place_target_cm(&self, cm: f32) {
        self.respond(Response::Pulse(cm_to_echo(cm, SPEED_OF_SOUND_MPS)));
    }

    /// Change the trigger-to-echo latency.
    pub fn set_latency_us(&self, us: u32) {
        self.state.latency.set(us);
    }

    /// The 16-bit, 1 µs counter.
    pub fn clock(&self) -> SimClock {
        SimClock {
            state: self.state.clone(),
        }
    }

    /// The trigger input of the sensor.
    pub fn trigger_pin(&self) -> SimTrigger {
        SimTrigger {
            state: self.state.clone(),
        }
    }

    /// The echo output of the sensor.
    pub fn echo_pin(&self) -> SimEcho {
        SimEcho {
            state: self.state.clone(),
        }
    }

    /// An async delay that advances the timeline while it is polled.
    #[cfg(feature = "async")]
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            state: self.state.clone(),
        }
    }

    /// Microseconds since the sensor was created.
    pub fn elapsed_us(&self) -> u64 {
        self.state.now.get() - self.state.origin
    }

    /// Number of complete trigger pulses seen.
    pub fn trigger_count(&self) -> u32 {
        self.state.triggers.get()
    }

    /// Width of the last complete trigger pulse.
    pub fn last_trigger_width_us(&self) -> Option<u64> {
        self.state.last_trigger_width.get()
    }

    /// Move the timeline forward without reading the clock.
    pub fn advance(&self, us: u64) {
        self.state.advance(us);
    }
}

impl State {
    fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }

    fn echo_high(&self) -> bool {
        let now = self.now.get();
        matches!(self.echo.get(), Some((rise, fall)) if rise <= now && now < fall)
    }

    fn fire(&self) {
        let rise = self.now.get() + u64::from(self.latency.get());
        let echo = match self.response.get() {
            Response::Silent => None,
            Response::Pulse(width) => Some((rise, rise + u64::from(width))),
            Response::StuckHigh => Some((rise, u64::MAX)),
        };
        self.echo.set(echo);
    }
}

/// Simulated free-running counter. Each read advances time by one tick.
#[derive(Debug, Clone)]
pub struct SimClock {
    state: Rc<State>,
}

impl Clock for SimClock {
    const BITS: u32 = 16;

    fn now(&mut self) -> Tick {
        let now = self.state.now.get();
        self.state.advance(1);
        Tick(now as u32 & mask(Self::BITS))
    }
}

/// Trigger line into the simulated sensor. The echo is scheduled on the
/// falling edge.
#[derive(Debug, Clone)]
pub struct SimTrigger {
    state: Rc<State>,
}

impl ErrorType for SimTrigger {
    type Error = Infallible;
}

impl OutputPin for SimTrigger {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if let Some(since) = self.state.trigger_high_since.take() {
            self.state
                .last_trigger_width
                .set(Some(self.state.now.get() - since));
            self.state.triggers.set(self.state.triggers.get() + 1);
            self.state.fire();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.state.trigger_high_since.get().is_none() {
            self.state.trigger_high_since.set(Some(self.state.now.get()));
        }
        Ok(())
    }
}

/// Echo line out of the simulated sensor. Reading it does not move time.
#[derive(Debug, Clone)]
pub struct SimEcho {
    state: Rc<State>,
}

impl ErrorType for SimEcho {
    type Error = Infallible;
}

impl InputPin for SimEcho {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.state.echo_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state.echo_high())
    }
}

#[cfg(feature = "async")]
mod asynch {
    use core::{future::poll_fn, task::Poll};
    use std::rc::Rc;

    use embedded_hal_async::{delay::DelayNs, digital::Wait};

    use super::{SimEcho, State};

    impl SimEcho {
        async fn wait_for_level(&mut self, high: bool) {
            poll_fn(|cx| {
                if self.state.echo_high() == high {
                    Poll::Ready(())
                } else {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            })
            .await
        }
    }

    impl Wait for SimEcho {
        async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
            self.wait_for_level(true).await;
            Ok(())
        }

        async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
            self.wait_for_level(false).await;
            Ok(())
        }

        async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
            self.wait_for_level(false).await;
            self.wait_for_level(true).await;
            Ok(())
        }

        async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
            self.wait_for_level(true).await;
            self.wait_for_level(false).await;
            Ok(())
        }

        async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
            let level = self.state.echo_high();
            self.wait_for_level(!level).await;
            Ok(())
        }
    }

    /// Async delay on the simulated timeline. Each poll advances time by one
    /// microsecond until the deadline is reached.
    #[derive(Debug, Clone)]
    pub struct SimDelay {
        pub(super) state: Rc<State>,
    }

    impl DelayNs for SimDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.delay_us(ns.div_ceil(1000)).await
        }

        async fn delay_us(&mut self, us: u32) {
            let deadline = self.state.now.get() + u64::from(us);
            poll_fn(|cx| {
                if self.state.now.get() >= deadline {
                    Poll::Ready(())
                } else {
                    self.state.advance(1);
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            })
            .await
        }
    }
}

#[cfg(feature = "async")]
pub use asynch::SimDelay;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_follows_trigger_falling_edge() {
        let sensor = SimSensor::new();
        sensor.respond(Response::Pulse(100));
        sensor.set_latency_us(5);
        let mut trigger = sensor.trigger_pin();
        let mut echo = sensor.echo_pin();

        trigger.set_high().unwrap();
        sensor.advance(10);
        trigger.set_low().unwrap();
        assert_eq!(sensor.last_trigger_width_us(), Some(10));
        assert_eq!(sensor.trigger_count(), 1);

        assert!(echo.is_low().unwrap());
        sensor.advance(5);
        assert!(echo.is_high().unwrap());
        sensor.advance(99);
        assert!(echo.is_high().unwrap());
        sensor.advance(1);
        assert!(echo.is_low().unwrap());
    }

    #[test]
    fn silent_sensor_never_answers() {
        let sensor = SimSensor::new();
        let mut trigger = sensor.trigger_pin();
        let mut echo = sensor.echo_pin();

        trigger.set_high().unwrap();
        trigger.set_low().unwrap();
        sensor.advance(1_000_000);
        assert!(echo.is_low().unwrap());
    }

    #[test]
    fn clock_wraps_at_16_bits() {
        let sensor = SimSensor::starting_at(65535);
        let mut clock = sensor.clock();

        assert_eq!(clock.now(), Tick(65535));
        assert_eq!(clock.now(), Tick(0));
        assert_eq!(sensor.elapsed_us(), 2);
    }

    #[test]
    fn target_distance_maps_to_round_trip_width() {
        let sensor = SimSensor::new();
        sensor.place_target_cm(20.0);
        assert_eq!(sensor.state.response.get(), Response::Pulse(1176));
    }

    #[test]
    fn target_width_tracks_speed_of_sound() {
        let sensor = SimSensor::new();
        for cm in [5.0, 100.0, 200.0] {
            sensor.place_target_cm(cm);
            let expected = cm_to_echo(cm, SPEED_OF_SOUND_MPS);
            assert_eq!(sensor.state.response.get(), Response::Pulse(expected));
        }
        sensor.place_target_cm(100.0);
        assert_eq!(sensor.state.response.get(), Response::Pulse(5882));
    }
}
