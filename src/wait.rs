//! Async capture for HALs that can wait on pin edges.
//!
//! Instead of spinning on the echo line, each edge wait is raced against a
//! timeout delay. The counter is still read at each edge, so accuracy depends
//! on how quickly the executor resumes the task after the edge interrupt.

use core::pin::pin;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::{delay::DelayNs, digital::Wait};
use futures_util::future::{select, Either};

#[cfg(feature = "tracing")]
use tracing::{instrument, warn};

use crate::{clock::mask, Clock, Config, Edge, Error, Measurement, PulseWindow};

/// Send one trigger pulse using an async delay.
pub async fn trigger<P, D>(pin: &mut P, delay: &mut D, width_us: u32) -> Result<(), Error>
where
    P: OutputPin,
    D: DelayNs,
{
    #[cfg(feature = "defmt-03")]
    defmt::trace!("trigger {}us", width_us);

    pin.set_high().map_err(Error::gpio)?;
    delay.delay_us(width_us).await;
    pin.set_low().map_err(Error::gpio)
}

async fn edge<P, D>(echo: &mut P, delay: &mut D, which: Edge, timeout_us: u32) -> Result<(), Error>
where
    P: Wait,
    D: DelayNs,
{
    let level = async {
        match which {
            Edge::Rising => echo.wait_for_high().await,
            Edge::Falling => echo.wait_for_low().await,
        }
    };

    match select(pin!(delay.delay_us(timeout_us)), pin!(level)).await {
        Either::Left(_) => Err(Error::Timeout(which)),
        Either::Right((Ok(()), _)) => Ok(()),
        Either::Right((Err(e), _)) => Err(Error::gpio(e)),
    }
}

/// Capture one echo pulse, waiting on each edge for at most `timeout_us`.
///
/// The width is taken from the two edge stamps, so `timeout_us` must be
/// shorter than one counter period.
///
/// # Errors
///
/// - [`Error::TimeoutTooLong`] if `timeout_us` spans a full counter period.
/// - [`Error::Timeout`] if an edge does not arrive in time.
/// - [`Error::Gpio`] if the pin reports an error.
pub async fn capture_echo<P, C, D>(
    echo: &mut P,
    clock: &mut C,
    delay: &mut D,
    timeout_us: u32,
) -> Result<PulseWindow, Error>
where
    P: Wait,
    C: Clock,
    D: DelayNs,
{
    if u64::from(timeout_us) > u64::from(mask(C::BITS)) {
        return Err(Error::TimeoutTooLong);
    }

    edge(echo, delay, Edge::Rising, timeout_us).await?;
    let start = clock.now();

    #[cfg(feature = "defmt-03")]
    defmt::trace!("echo rose at {}", start.0);

    edge(echo, delay, Edge::Falling, timeout_us).await?;
    let end = clock.now();

    #[cfg(feature = "defmt-03")]
    defmt::trace!("echo fell at {}", end.0);

    Ok(PulseWindow::new(start, end, C::BITS))
}

/// Trigger, capture and classify one measurement.
///
/// ```
/// # tokio_test::block_on(async {
/// use sr04::{sim::SimSensor, wait, Config};
///
/// let sensor = SimSensor::new();
/// sensor.place_target_cm(50.0);
///
/// let measurement = wait::measure(
///     &mut sensor.trigger_pin(),
///     &mut sensor.echo_pin(),
///     &mut sensor.clock(),
///     &mut sensor.delay(),
///     &Config::DEFAULT,
/// )
/// .await?;
/// assert!(measurement.is_valid());
/// # Ok::<(), sr04::Error>(())
/// # });
/// ```
#[cfg_attr(feature = "tracing", instrument(skip_all, ret, err))]
pub async fn measure<TRIG, ECHO, C, D>(
    trigger_pin: &mut TRIG,
    echo: &mut ECHO,
    clock: &mut C,
    delay: &mut D,
    config: &Config,
) -> Result<Measurement, Error>
where
    TRIG: OutputPin,
    ECHO: Wait,
    C: Clock,
    D: DelayNs,
{
    trigger(trigger_pin, delay, config.trigger_width_us).await?;

    let capture = capture_echo(echo, clock, delay, config.echo_timeout_us)
        .await
        .map(|window| window.duration_us());

    #[cfg(feature = "tracing")]
    if let Err(Error::Timeout(edge)) = &capture {
        warn!(?edge, "echo timed out");
    }

    config.classify(capture)
}
