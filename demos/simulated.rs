//! Runs the ranging loop against the simulated sensor and prints the report
//! lines. Set `RUST_LOG=sr04=debug` with `--features tracing` to see the
//! driver's spans.

use std::fmt;

use sr04::{
    cycle::Context,
    report::TextReport,
    sim::{Response, SimSensor},
    Config, Rangefinder,
};
use tracing_subscriber::EnvFilter;

/// Stand-in for the UART.
struct Stdout;

impl fmt::Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print!("{s}");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let sensor = SimSensor::new();
    let rangefinder = Rangefinder::new(
        sensor.trigger_pin(),
        sensor.echo_pin(),
        sensor.clock(),
        Config::DEFAULT,
    )?;
    let mut ctx = Context::new(rangefinder, TextReport::new(Stdout));

    let targets = [20.0, 3.0, 150.0, 250.0];
    for cm in targets {
        sensor.place_target_cm(cm);
        ctx.run_cycle()?;
    }

    sensor.respond(Response::Silent);
    ctx.run_cycle()?;

    println!("simulated {} ms", sensor.elapsed_us() / 1000);
    Ok(())
}
