//! The measurement loop.
//!
//! One cycle walks `Idle -> Triggering -> AwaitingEcho -> Reporting -> Idle`
//! and nothing carries over from one cycle to the next. Timeouts and
//! out-of-range targets are reported like any other reading; only a pin or
//! sink failure ends the loop.

use core::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

#[cfg(feature = "tracing")]
use tracing::{info, instrument, trace};

use crate::{report::Report, Clock, Error, Measurement, Rangefinder};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Phase {
    /// Between cycles.
    Idle,
    /// Sending the trigger pulse.
    Triggering,
    /// Timing the echo pulse.
    AwaitingEcho,
    /// Handing the measurement to the sink and pausing.
    Reporting,
}

/// Everything the loop owns: the rangefinder (pins and counter) and the
/// report sink.
pub struct Context<TRIG, ECHO, CLK, SINK> {
    rangefinder: Rangefinder<TRIG, ECHO, CLK>,
    sink: SINK,
    phase: Phase,
}

impl<TRIG, ECHO, CLK, SINK> Context<TRIG, ECHO, CLK, SINK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    CLK: Clock,
    SINK: Report,
{
    /// Assemble the loop.
    pub fn new(rangefinder: Rangefinder<TRIG, ECHO, CLK>, sink: SINK) -> Self {
        Self {
            rangefinder,
            sink,
            phase: Phase::Idle,
        }
    }

    /// Current phase.
    ///
    /// A cycle runs to completion inside [`Self::run_cycle`], and a failed
    /// cycle is reset, so callers always observe [`Phase::Idle`] here. The
    /// intermediate phases show up as `phase` trace events under the
    /// `tracing` feature.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The report sink.
    #[inline]
    pub fn sink(&self) -> &SINK {
        &self.sink
    }

    /// The report sink, mutably.
    #[inline]
    pub fn sink_mut(&mut self) -> &mut SINK {
        &mut self.sink
    }

    /// The rangefinder.
    #[inline]
    pub fn rangefinder(&mut self) -> &mut Rangefinder<TRIG, ECHO, CLK> {
        &mut self.rangefinder
    }

    /// Take the loop apart.
    pub fn release(self) -> (Rangefinder<TRIG, ECHO, CLK>, SINK) {
        (self.rangefinder, self.sink)
    }

    fn enter(&mut self, phase: Phase) {
        #[cfg(feature = "tracing")]
        trace!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    /// Run one full cycle, including the pause that follows the report, and
    /// return what was reported.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), err))]
    pub fn run_cycle(&mut self) -> Result<Measurement, Error> {
        let result = self.cycle();
        if result.is_err() {
            self.phase = Phase::Idle;
        }
        result
    }

    fn cycle(&mut self) -> Result<Measurement, Error> {
        self.enter(Phase::Triggering);
        self.rangefinder.trigger()?;

        self.enter(Phase::AwaitingEcho);
        let capture = self
            .rangefinder
            .capture_echo()
            .map(|window| window.duration_us());
        let measurement = self.rangefinder.config().classify(capture)?;

        self.enter(Phase::Reporting);
        #[cfg(feature = "tracing")]
        info!(%measurement, "report");
        #[cfg(feature = "defmt-03")]
        defmt::debug!("report {}", measurement);
        self.sink
            .report(&measurement)
            .map_err(|_| Error::Report)?;

        let pause = self.rangefinder.config().cycle_delay_us;
        self.rangefinder.delay().delay_us(pause);

        self.enter(Phase::Idle);
        Ok(measurement)
    }

    /// Run cycles forever. Returns only if a pin or the sink fails.
    pub fn run(&mut self) -> Result<Infallible, Error> {
        loop {
            self.run_cycle()?;
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use std::{string::String, vec::Vec};

    use embedded_hal::digital::{ErrorKind, ErrorType};

    use super::*;
    use crate::{
        report::TextReport,
        sim::{Response, SimSensor},
        Config,
    };

    #[derive(Default)]
    struct Recorder(Vec<Measurement>);

    impl Report for Recorder {
        type Error = Infallible;

        fn report(&mut self, measurement: &Measurement) -> Result<(), Infallible> {
            self.0.push(*measurement);
            Ok(())
        }
    }

    fn context<S: Report>(
        sensor: &SimSensor,
        sink: S,
    ) -> Context<crate::sim::SimTrigger, crate::sim::SimEcho, crate::sim::SimClock, S> {
        let rangefinder = Rangefinder::new(
            sensor.trigger_pin(),
            sensor.echo_pin(),
            sensor.clock(),
            Config::DEFAULT,
        )
        .unwrap();
        Context::new(rangefinder, sink)
    }

    #[test]
    fn cycle_returns_to_idle() {
        let sensor = SimSensor::new();
        sensor.respond(Response::Pulse(2000));
        let mut ctx = context(&sensor, Recorder::default());

        assert_eq!(ctx.phase(), Phase::Idle);
        ctx.run_cycle().unwrap();
        assert_eq!(ctx.phase(), Phase::Idle);
        assert_eq!(ctx.sink().0, [Measurement::Distance(34.0)]);
    }

    #[test]
    fn pauses_after_report() {
        let sensor = SimSensor::new();
        sensor.respond(Response::Pulse(2000));
        let mut ctx = context(&sensor, Recorder::default());

        ctx.run_cycle().unwrap();
        // trigger, latency and echo take well under 3 ms
        let spent = sensor.elapsed_us();
        assert!((100_000..103_000).contains(&spent), "{spent}");
    }

    #[test]
    fn no_state_between_cycles() {
        let sensor = SimSensor::new();
        let mut ctx = context(&sensor, Recorder::default());

        sensor.respond(Response::Pulse(2000));
        ctx.run_cycle().unwrap();
        sensor.respond(Response::Silent);
        ctx.run_cycle().unwrap();
        sensor.respond(Response::Pulse(50));
        ctx.run_cycle().unwrap();
        sensor.respond(Response::Pulse(2000));
        ctx.run_cycle().unwrap();

        assert_eq!(
            ctx.sink().0,
            [
                Measurement::Distance(34.0),
                Measurement::TimedOut,
                Measurement::OutOfRange,
                Measurement::Distance(34.0),
            ]
        );
        assert_eq!(sensor.trigger_count(), 4);
    }

    #[test]
    fn text_lines_per_cycle() {
        let sensor = SimSensor::new();
        let mut ctx = context(&sensor, TextReport::new(String::new()));

        sensor.respond(Response::Pulse(2000));
        ctx.run_cycle().unwrap();
        sensor.respond(Response::Silent);
        ctx.run_cycle().unwrap();

        assert_eq!(
            ctx.sink().get_ref(),
            "Distance: 34.00 cm\r\nOut of range!\r\n"
        );
    }

    struct BrokenEcho;

    impl ErrorType for BrokenEcho {
        type Error = ErrorKind;
    }

    impl InputPin for BrokenEcho {
        fn is_high(&mut self) -> Result<bool, ErrorKind> {
            Err(ErrorKind::Other)
        }

        fn is_low(&mut self) -> Result<bool, ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn run_stops_on_pin_failure() {
        let sensor = SimSensor::new();
        let rangefinder = Rangefinder::new(
            sensor.trigger_pin(),
            BrokenEcho,
            sensor.clock(),
            Config::DEFAULT,
        )
        .unwrap();
        let mut ctx = Context::new(rangefinder, Recorder::default());

        let err = ctx.run().unwrap_err();
        assert_eq!(err, Error::Gpio(ErrorKind::Other));
        assert_eq!(ctx.phase(), Phase::Idle);
        assert!(ctx.sink().0.is_empty());
    }

    #[test]
    fn run_stops_on_sink_failure() {
        struct Closed;

        impl Report for Closed {
            type Error = ();

            fn report(&mut self, _: &Measurement) -> Result<(), ()> {
                Err(())
            }
        }

        let sensor = SimSensor::new();
        sensor.respond(Response::Pulse(2000));
        let mut ctx = context(&sensor, Closed);

        assert_eq!(ctx.run().unwrap_err(), Error::Report);
    }
}
