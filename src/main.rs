//! linetracer binary: bring up the hardware, run the control loop.
//!
//! Usage: `linetracer [config.toml]` — without an argument the built-in
//! calibrated defaults are used.

use anyhow::{Context, Result};
use linetracer::camera::SyntheticCamera;
use linetracer::config::Config;
use linetracer::core::Scheduler;
use linetracer::nodes::FollowerNode;
use linetracer::ranging::{RangeMonitor, SimulatedRangeSensor};

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading config {}", path)),
        None => Ok(Config::default()),
    }
}

#[cfg(unix)]
fn run() -> Result<()> {
    use linetracer::hardware::{find_device_bus, LinuxI2c, Pca9685};

    let config = load_config()?;

    println!("Initializing line follower...");

    let bus_number = match config.pwm.bus {
        Some(n) => n,
        None => find_device_bus(config.pwm.address).with_context(|| {
            format!(
                "no I2C bus with a device at 0x{:02X}",
                config.pwm.address
            )
        })?,
    };
    let bus = LinuxI2c::open(bus_number)?;
    let mut pca =
        Pca9685::new(Box::new(bus), config.pwm.address).context("PWM expander bring-up")?;
    pca.set_frequency(config.pwm.frequency_hz);

    let camera = SyntheticCamera::from_config(&config.camera).with_sway(0.2);

    // Optional obstacle ranging; independent of the control loop
    let mut ranging = config
        .ranging
        .enabled
        .then(|| RangeMonitor::start(
            Box::new(SimulatedRangeSensor::new(1500.0)),
            config.ranging.front_window_deg,
        ));

    let follower = FollowerNode::new(Box::new(camera), pca, &config)?;

    let mut scheduler = Scheduler::new();
    scheduler
        .add(follower)
        .order(0)
        .rate_hz(config.control.control_hz)
        .done();

    println!("System ready. Ctrl+C to stop.");
    let result = scheduler.run();

    if let Some(monitor) = ranging.as_mut() {
        println!(
            "Last frontal distance: {:.0} mm ({} sweeps)",
            monitor.front_distance_mm(),
            monitor.sample_count()
        );
        monitor.stop();
    }

    result.context("control loop")?;
    println!("Stopped safely.");
    Ok(())
}

#[cfg(not(unix))]
fn run() -> Result<()> {
    anyhow::bail!("linetracer requires Linux I2C bus access")
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
