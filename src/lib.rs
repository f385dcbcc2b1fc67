//! Blocking driver for HC-SR04 style ultrasonic rangefinders.
//!
//! The sensor is started with a short pulse on its trigger line and answers
//! with a pulse on its echo line whose width is the round-trip time of
//! flight. This crate times that pulse against a free-running microsecond
//! counter, bounds every wait with a timeout and turns the width into a
//! distance.
//!
//! ```
//! use sr04::{cycle::Context, report::TextReport, sim::SimSensor, Config, Rangefinder};
//!
//! let sensor = SimSensor::new();
//! sensor.place_target_cm(34.0);
//!
//! let rangefinder = Rangefinder::new(
//!     sensor.trigger_pin(),
//!     sensor.echo_pin(),
//!     sensor.clock(),
//!     Config::DEFAULT,
//! )?;
//! let mut ctx = Context::new(rangefinder, TextReport::new(String::new()));
//!
//! ctx.run_cycle()?;
//! assert_eq!(ctx.sink().get_ref(), "Distance: 34.00 cm\r\n");
//! # Ok::<(), sr04::Error>(())
//! ```
//!
//! On hardware, pass the HAL's GPIO pins and a [`Clock`] over a timer
//! running at 1 MHz, then call [`cycle::Context::run`].

#![warn(missing_docs)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod clock;
pub mod cycle;
pub mod delay;
pub mod distance;
pub mod echo;
pub mod report;
#[cfg(feature = "std")]
pub mod sim;
pub mod trigger;
#[cfg(feature = "async")]
pub mod wait;

use core::fmt;

use embedded_hal::digital::{self, ErrorKind, InputPin, OutputPin};

#[cfg(feature = "tracing")]
use tracing::{debug, instrument, warn};

pub use clock::{Clock, Tick};
pub use delay::ClockDelay;
pub use distance::{to_distance, Measurement};
pub use echo::{Edge, PulseWindow};

/// Speed of sound used for conversion, in m/s.
pub const SPEED_OF_SOUND_MPS: f32 = 340.0;

/// Nearest distance the sensor is trusted to resolve, in cm.
pub const MIN_DISTANCE_CM: f32 = 5.0;

/// Furthest distance the sensor is trusted to resolve, in cm.
pub const MAX_DISTANCE_CM: f32 = 200.0;

/// Width of the trigger pulse, in µs.
pub const TRIGGER_WIDTH_US: u32 = 10;

/// Longest wait for each edge of the echo pulse, in µs.
pub const ECHO_TIMEOUT_US: u32 = 30_000;

/// Pause between the end of a report and the next trigger, in µs.
pub const CYCLE_DELAY_US: u32 = 100_000;

/// Fixed ranging parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Width of the trigger pulse (µs).
    pub trigger_width_us: u32,
    /// Timeout for each edge of the echo pulse (µs).
    pub echo_timeout_us: u32,
    /// Lower bound of the trusted range (cm).
    pub min_distance_cm: f32,
    /// Upper bound of the trusted range (cm).
    pub max_distance_cm: f32,
    /// Speed of sound (m/s).
    pub speed_of_sound_mps: f32,
    /// Pause between cycles (µs).
    pub cycle_delay_us: u32,
}

impl Config {
    /// The HC-SR04 defaults.
    pub const DEFAULT: Self = Self {
        trigger_width_us: TRIGGER_WIDTH_US,
        echo_timeout_us: ECHO_TIMEOUT_US,
        min_distance_cm: MIN_DISTANCE_CM,
        max_distance_cm: MAX_DISTANCE_CM,
        speed_of_sound_mps: SPEED_OF_SOUND_MPS,
        cycle_delay_us: CYCLE_DELAY_US,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error {
    /// The echo line did not reach the given edge in time.
    Timeout(Edge),
    /// A pin could not be read or driven.
    Gpio(ErrorKind),
    /// The report sink refused the report.
    Report,
    /// The echo timeout is not shorter than one counter period, so a pulse
    /// could not be timed unambiguously from its edge stamps.
    TimeoutTooLong,
}

impl Error {
    pub(crate) fn gpio<E: digital::Error>(err: E) -> Self {
        Self::Gpio(err.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(Edge::Rising) => f.write_str("echo never rose"),
            Self::Timeout(Edge::Falling) => f.write_str("echo never fell"),
            Self::Gpio(kind) => write!(f, "gpio error: {kind:?}"),
            Self::Report => f.write_str("report sink failed"),
            Self::TimeoutTooLong => f.write_str("echo timeout exceeds counter period"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// An ultrasonic rangefinder on a trigger/echo pin pair.
pub struct Rangefinder<TRIG, ECHO, CLK> {
    trigger: TRIG,
    echo: ECHO,
    clock: CLK,
    config: Config,
}

impl<TRIG, ECHO, CLK> Rangefinder<TRIG, ECHO, CLK>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    CLK: Clock,
{
    /// Take ownership of the pins and the counter. The trigger line is
    /// driven low so every later pulse starts from idle.
    pub fn new(mut trigger: TRIG, echo: ECHO, clock: CLK, config: Config) -> Result<Self, Error> {
        trigger.set_low().map_err(Error::gpio)?;

        Ok(Self {
            trigger,
            echo,
            clock,
            config,
        })
    }

    /// Ranging parameters.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send one trigger pulse.
    #[inline]
    pub fn trigger(&mut self) -> Result<(), Error> {
        let width = self.config.trigger_width_us;
        trigger::trigger(&mut self.trigger, &mut ClockDelay::new(&mut self.clock), width)
            .map_err(Error::gpio)
    }

    /// Time the echo pulse following a trigger.
    #[inline]
    pub fn capture_echo(&mut self) -> Result<PulseWindow, Error> {
        echo::capture_echo(&mut self.echo, &mut self.clock, self.config.echo_timeout_us)
    }

    /// Trigger, time the echo and classify the result.
    ///
    /// Only pin failures are errors. A sensor that does not answer yields
    /// [`Measurement::TimedOut`].
    #[cfg_attr(feature = "tracing", instrument(skip(self), ret, err))]
    pub fn measure(&mut self) -> Result<Measurement, Error> {
        self.trigger()?;

        let capture = self.capture_echo().map(|window| window.duration_us());

        #[cfg(feature = "tracing")]
        match &capture {
            Ok(width) => debug!(width_us = width, "echo captured"),
            Err(Error::Timeout(edge)) => warn!(?edge, "echo timed out"),
            Err(_) => {}
        }

        #[cfg(feature = "defmt-03")]
        if let Ok(width) = &capture {
            defmt::debug!("echo {}us", width);
        }

        self.config.classify(capture)
    }

    /// A delay running off this rangefinder's counter.
    #[inline]
    pub fn delay(&mut self) -> ClockDelay<&mut CLK> {
        ClockDelay::new(&mut self.clock)
    }

    /// Give back the pins and the counter.
    pub fn release(self) -> (TRIG, ECHO, CLK) {
        (self.trigger, self.echo, self.clock)
    }
}
