//! Steering control.

pub mod pd;

pub use pd::{SteeringController, WheelCommand};
