//! Pulse width to distance conversion.

use core::fmt;

use crate::{Config, Error};

/// The outcome of one ranging cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Measurement {
    /// A target inside the trusted range, in centimetres.
    Distance(f32),
    /// An echo was timed but the target is too near or too far.
    OutOfRange,
    /// The echo line never completed a pulse.
    TimedOut,
}

impl Measurement {
    /// Distance in centimetres, if in range.
    #[inline]
    pub fn cm(&self) -> Option<f32> {
        match self {
            Self::Distance(cm) => Some(*cm),
            _ => None,
        }
    }

    /// Whether this measurement carries a distance.
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Distance(_))
    }
}

/// Formats the report line without its terminator. A timeout reads the same
/// as an out-of-range target.
impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distance(cm) => write!(f, "Distance: {cm:.2} cm"),
            Self::OutOfRange | Self::TimedOut => f.write_str("Out of range!"),
        }
    }
}

/// Round-trip echo width to one-way distance in centimetres.
///
/// `width * speed / 2`, with the speed in m/s scaled to cm/µs.
#[inline]
pub fn echo_to_cm(duration_us: u32, speed_of_sound_mps: f32) -> f32 {
    duration_us as f32 * speed_of_sound_mps / 2.0 / 10_000.0
}

/// One-way distance in centimetres to the round-trip echo width, rounded to
/// the nearest whole microsecond.
#[inline]
pub fn cm_to_echo(cm: f32, speed_of_sound_mps: f32) -> u32 {
    (cm * 2.0 * 10_000.0 / speed_of_sound_mps + 0.5) as u32
}

impl Config {
    /// Echo widths, in whole microseconds, that bound the trusted range.
    ///
    /// The counter cannot resolve anything finer than a tick, so the
    /// distance limits are snapped to the nearest tick before comparing.
    /// With the defaults this is `294..=11765`.
    pub fn echo_range_us(&self) -> (u32, u32) {
        (
            cm_to_echo(self.min_distance_cm, self.speed_of_sound_mps),
            cm_to_echo(self.max_distance_cm, self.speed_of_sound_mps),
        )
    }

    /// Convert an echo width into a classified measurement.
    pub fn to_distance(&self, duration_us: u32) -> Measurement {
        let (min, max) = self.echo_range_us();
        if (min..=max).contains(&duration_us) {
            Measurement::Distance(echo_to_cm(duration_us, self.speed_of_sound_mps))
        } else {
            Measurement::OutOfRange
        }
    }

    /// Fold a capture result into a measurement. Timeouts become
    /// [`Measurement::TimedOut`]; other errors are passed through.
    pub fn classify(&self, capture: Result<u32, Error>) -> Result<Measurement, Error> {
        match capture {
            Ok(duration_us) => Ok(self.to_distance(duration_us)),
            Err(Error::Timeout(_)) => Ok(Measurement::TimedOut),
            Err(e) => Err(e),
        }
    }
}

/// Convert an echo width using the default configuration.
///
/// ```
/// use sr04::{to_distance, Measurement};
///
/// assert_eq!(to_distance(50), Measurement::OutOfRange);
/// assert!(to_distance(1176).is_valid());
/// ```
#[inline]
pub fn to_distance(duration_us: u32) -> Measurement {
    Config::DEFAULT.to_distance(duration_us)
}
