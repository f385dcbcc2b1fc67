//! Trigger pulse generation.

use embedded_hal::{delay::DelayNs, digital::OutputPin};

/// Emit one trigger pulse: drive `pin` high for `width_us`, then low.
///
/// The sensor starts ranging on the falling edge, so the echo line should be
/// polled right after this returns.
#[inline]
pub fn trigger<P, D>(pin: &mut P, delay: &mut D, width_us: u32) -> Result<(), P::Error>
where
    P: OutputPin,
    D: DelayNs,
{
    #[cfg(feature = "defmt-03")]
    defmt::trace!("trigger {}us", width_us);

    pin.set_high()?;
    delay.delay_us(width_us);
    pin.set_low()
}
