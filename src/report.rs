//! Where measurements go.
//!
//! On an STM32F103 board this is USART1 at 9600 baud, one line per cycle.
//! Any [`core::fmt::Write`] can stand in for it through [`TextReport`].

use core::fmt::{self, Write};

use crate::Measurement;

/// A one-way channel that accepts one measurement per cycle.
pub trait Report {
    /// Error raised when the channel cannot take the report.
    type Error;

    /// Hand over a measurement.
    fn report(&mut self, measurement: &Measurement) -> Result<(), Self::Error>;
}

impl<R: Report + ?Sized> Report for &mut R {
    type Error = R::Error;

    #[inline]
    fn report(&mut self, measurement: &Measurement) -> Result<(), Self::Error> {
        R::report(self, measurement)
    }
}

/// Line printed for a timeout when timeouts are reported on their own.
pub const TIMEOUT_LINE: &str = "Sensor timeout!";

/// Text reporter writing one `\r\n` terminated line per measurement.
///
/// ```
/// use sr04::{report::{Report, TextReport}, Measurement};
///
/// let mut out = String::new();
/// TextReport::new(&mut out).report(&Measurement::Distance(20.0)).unwrap();
/// assert_eq!(out, "Distance: 20.00 cm\r\n");
/// ```
#[derive(Debug)]
pub struct TextReport<W> {
    out: W,
    distinct_timeouts: bool,
}

impl<W: Write> TextReport<W> {
    /// Report into `out`, printing timeouts as out of range.
    pub fn new(out: W) -> Self {
        Self {
            out,
            distinct_timeouts: false,
        }
    }

    /// Print timeouts as [`TIMEOUT_LINE`] instead of as out of range.
    pub fn distinct_timeouts(mut self, distinct: bool) -> Self {
        self.distinct_timeouts = distinct;
        self
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Give the writer back.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Report for TextReport<W> {
    type Error = fmt::Error;

    fn report(&mut self, measurement: &Measurement) -> fmt::Result {
        match measurement {
            Measurement::TimedOut if self.distinct_timeouts => {
                write!(self.out, "{TIMEOUT_LINE}\r\n")
            }
            _ => write!(self.out, "{measurement}\r\n"),
        }
    }
}
