//! Line perception: frame type, image operations and the detector.

pub mod detector;
pub mod frame;
pub mod ops;

pub use detector::{DebugView, LineDetector, LineObservation, Perception};
pub use frame::Frame;
