//! # linetracer
//!
//! A line-following robot controller: camera-fed perception, PD steering
//! and slew-limited PWM motor actuation over an I2C expander, composed
//! into a fixed-rate control loop.
//!
//! The building blocks:
//!
//! - **Vision**: ROI extraction, thresholding, morphological cleanup and
//!   centroid computation producing a lateral error plus a confidence score
//! - **Control**: a discrete PD law mapping error to per-wheel commands
//! - **Actuation**: per-wheel slew limiting and dead-zone compensation,
//!   driving a 16-channel PWM expander at the register level
//! - **Core**: node lifecycle, a cooperative fixed-rate scheduler with
//!   guaranteed hardware-safe shutdown, and node-attributed logging
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use linetracer::camera::SyntheticCamera;
//! use linetracer::config::Config;
//! use linetracer::core::Scheduler;
//! use linetracer::hardware::{LinuxI2c, Pca9685};
//! use linetracer::nodes::FollowerNode;
//!
//! let config = Config::default();
//! let bus = LinuxI2c::open(7)?;
//! let mut pca = Pca9685::new(Box::new(bus), config.pwm.address)?;
//! pca.set_frequency(config.pwm.frequency_hz);
//! let camera = SyntheticCamera::from_config(&config.camera);
//! let follower = FollowerNode::new(Box::new(camera), pca, &config)?;
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.add(follower).order(0).rate_hz(config.control.control_hz).done();
//! scheduler.run()?;
//! # Ok::<(), linetracer::error::TracerError>(())
//! ```

pub mod camera;
pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod hardware;
pub mod motor;
pub mod nodes;
pub mod ranging;
pub mod vision;

// Re-export commonly used types for easy access
pub use crate::config::Config;
pub use crate::core::{Node, NodeState, Scheduler};
pub use crate::error::{TracerError, TracerResult};
