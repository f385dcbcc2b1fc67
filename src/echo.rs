//! Echo pulse capture by polling.

use embedded_hal::digital::InputPin;

use crate::{
    clock::{span, Clock, Stopwatch, Tick},
    Error,
};

/// An edge of the echo pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Edge {
    /// Echo line going high: the burst left the sensor.
    Rising,
    /// Echo line going low: the reflection came back.
    Falling,
}

/// Counter readings taken at both edges of one echo pulse.
///
/// A window only exists for a completed pulse; a capture that times out
/// yields [`Error::Timeout`] instead, so a window never holds half a
/// measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PulseWindow {
    start: Tick,
    end: Tick,
    duration_us: u32,
}

impl PulseWindow {
    /// Build a window from readings of a `bits` wide counter. The pulse is
    /// assumed shorter than one counter period.
    pub const fn new(start: Tick, end: Tick, bits: u32) -> Self {
        Self {
            start,
            end,
            duration_us: span(start, end, bits),
        }
    }

    /// Build a window whose width was timed separately, e.g. across several
    /// counter wraps.
    pub const fn with_duration(start: Tick, end: Tick, duration_us: u32) -> Self {
        Self {
            start,
            end,
            duration_us,
        }
    }

    /// Counter value at the rising edge.
    pub const fn start(&self) -> Tick {
        self.start
    }

    /// Counter value at the falling edge.
    pub const fn end(&self) -> Tick {
        self.end
    }

    /// Pulse width in microseconds, corrected for counter wrap.
    pub const fn duration_us(&self) -> u32 {
        self.duration_us
    }
}

/// Wait for `echo` to settle at `high`, giving up after `timeout_us`.
///
/// Returns the counter reading taken when the level was seen, and the time
/// elapsed since `since` at that reading.
fn poll_level<P, C>(
    echo: &mut P,
    clock: &mut C,
    high: bool,
    since: Tick,
    timeout_us: u32,
) -> Result<Option<(Tick, u64)>, Error>
where
    P: InputPin,
    C: Clock,
{
    let mut watch = Stopwatch::from_tick(since);
    loop {
        if echo.is_high().map_err(Error::gpio)? == high {
            let now = clock.now();
            return Ok(Some((now, watch.lap::<C>(now))));
        }
        if watch.lap::<C>(clock.now()) >= u64::from(timeout_us) {
            return Ok(None);
        }
    }
}

/// Capture one echo pulse.
///
/// Polls `echo` for the rising edge, then for the falling edge, stamping each
/// with `clock`. Each phase is bounded by `timeout_us` on its own, so a
/// missing sensor or a line stuck high returns [`Error::Timeout`] after at
/// most `timeout_us` of polling per phase.
///
/// The width is accumulated while polling, so pulses longer than one counter
/// period are measured correctly.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(echo, clock), err))]
pub fn capture_echo<P, C>(echo: &mut P, clock: &mut C, timeout_us: u32) -> Result<PulseWindow, Error>
where
    P: InputPin,
    C: Clock,
{
    let armed = clock.now();
    let (start, _) = poll_level(echo, clock, true, armed, timeout_us)?
        .ok_or(Error::Timeout(Edge::Rising))?;

    #[cfg(feature = "defmt-03")]
    defmt::trace!("echo rose at {}", start.0);

    let (end, width) = poll_level(echo, clock, false, start, timeout_us)?
        .ok_or(Error::Timeout(Edge::Falling))?;

    #[cfg(feature = "defmt-03")]
    defmt::trace!("echo fell at {}", end.0);

    let width = u32::try_from(width).unwrap_or(u32::MAX);
    Ok(PulseWindow::with_duration(start, end, width))
}
