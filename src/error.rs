//! Unified error handling for linetracer.
//!
//! One crate-wide error type so every subsystem reports failures the same
//! way, from config parsing down to bus I/O.

use thiserror::Error;

/// Main error type for linetracer operations
#[derive(Debug, Error)]
pub enum TracerError {
    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hardware driver errors (I2C bus, PWM expander)
    #[error("Driver error: {0}")]
    Driver(String),

    /// Camera / frame acquisition errors
    #[error("Capture error: {0}")]
    Capture(String),

    /// Node-related errors
    #[error("Node '{node}' error: {message}")]
    Node { node: String, message: String },

    /// Scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// Invalid input/argument errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Initialization errors
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

impl From<toml::de::Error> for TracerError {
    fn from(err: toml::de::Error) -> Self {
        TracerError::Config(format!("TOML parse error: {}", err))
    }
}

/// Convenience type alias for Results using TracerError
pub type TracerResult<T> = std::result::Result<T, TracerError>;

/// Short alias — `Result<T>` is equivalent to `TracerResult<T>`
pub type Result<T> = TracerResult<T>;

// Helper constructors — prefer these over building variants inline so call
// sites stay typed (no accidental stringly errors).
impl TracerError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TracerError::Config(msg.into())
    }

    /// Create a driver error
    pub fn driver<S: Into<String>>(msg: S) -> Self {
        TracerError::Driver(msg.into())
    }

    /// Create a capture error
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        TracerError::Capture(msg.into())
    }

    /// Create a node error with node name and message
    pub fn node<S: Into<String>, T: Into<String>>(node: S, message: T) -> Self {
        TracerError::Node {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        TracerError::InvalidInput(msg.into())
    }
}
