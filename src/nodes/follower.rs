//! The line-follower orchestrator node.
//!
//! One tick = one pass of the pipeline: acquire a frame, detect the line,
//! gate on detection quality, steer, actuate. Data flows one way; the
//! only state carried across ticks lives in the controller (`prev_error`)
//! and the wheel actuators (`current_speed`).

use crate::camera::FrameSource;
use crate::config::Config;
use crate::control::SteeringController;
use crate::core::Node;
use crate::error::TracerResult;
use crate::motor::MotorDriver;
use crate::vision::{LineDetector, LineObservation};

pub struct FollowerNode {
    camera: Box<dyn FrameSource>,
    detector: LineDetector,
    controller: SteeringController,
    motors: MotorDriver,
    min_confidence: f32,
    control_hz: f64,
}

impl FollowerNode {
    pub fn new(
        camera: Box<dyn FrameSource>,
        pca: crate::hardware::Pca9685,
        config: &Config,
    ) -> TracerResult<Self> {
        config.validate()?;
        Ok(Self {
            camera,
            detector: LineDetector::new(&config.vision),
            controller: SteeringController::new(&config.control),
            motors: MotorDriver::new(pca, &config.motor),
            min_confidence: config.vision.min_confidence,
            control_hz: config.control.control_hz,
        })
    }

    pub fn motors(&self) -> &MotorDriver {
        &self.motors
    }

    pub fn controller(&self) -> &SteeringController {
        &self.controller
    }
}

impl Node for FollowerNode {
    fn name(&self) -> &str {
        "follower"
    }

    fn rate_hz(&self) -> Option<f64> {
        Some(self.control_hz)
    }

    fn init(&mut self) -> TracerResult<()> {
        crate::tlog!(
            info,
            "line follower ready ({}Hz, min confidence {:.2})",
            self.control_hz,
            self.min_confidence
        );
        Ok(())
    }

    fn tick(&mut self) -> TracerResult<()> {
        // A failed read means the capture device is gone: fatal.
        let frame = self.camera.read()?;
        let perception = self.detector.process(&frame);

        match perception.observation {
            LineObservation::Detected {
                error, confidence, ..
            } if confidence >= self.min_confidence => {
                let cmd = self.controller.step(error);
                self.motors.set(cmd.left, cmd.right);
                let (left, right) = self.motors.speeds();
                crate::tlog!(
                    info,
                    "err {:+.2} | conf {:.2} | L {:+.2} R {:+.2}",
                    error,
                    confidence,
                    left,
                    right
                );
            }
            LineObservation::Detected { confidence, .. } => {
                // Low confidence: stop without stepping the controller,
                // so prev_error keeps its last driven value
                crate::tlog!(warn, "Lost line (conf {:.2}) - stopping", confidence);
                self.motors.stop();
            }
            LineObservation::NotFound => {
                crate::tlog!(warn, "Lost line (no detection) - stopping");
                self.motors.stop();
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) -> TracerResult<()> {
        self.motors.stop();
        // Defense in depth: zero every expander channel, not just ours
        self.motors.pca_mut().stop_all();
        self.camera.close();
        crate::tlog!(info, "Motors stopped, PWM channels zeroed");
        Ok(())
    }
}
