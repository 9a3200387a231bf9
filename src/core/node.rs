//! Node lifecycle trait and state.

use crate::error::TracerResult;
use std::fmt;

/// Lifecycle states, used by the scheduler for monitoring and by the
/// shutdown path to decide what still needs cleanup.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Uninitialized,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Error(String),
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Uninitialized => write!(f, "Uninitialized"),
            NodeState::Initializing => write!(f, "Initializing"),
            NodeState::Running => write!(f, "Running"),
            NodeState::Stopping => write!(f, "Stopping"),
            NodeState::Stopped => write!(f, "Stopped"),
            NodeState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// A schedulable unit with full lifecycle support.
///
/// Use the `tlog!()` macro for logging within any lifecycle method; the
/// scheduler sets the node context around each call.
///
/// ```ignore
/// impl Node for MyNode {
///     fn init(&mut self) -> TracerResult<()> {
///         tlog!(info, "bringing up hardware");
///         Ok(())
///     }
///
///     fn tick(&mut self) -> TracerResult<()> {
///         // one control iteration; Err is fatal to the loop
///         Ok(())
///     }
/// }
/// ```
pub trait Node: Send {
    /// The node's name (must be unique within a scheduler).
    ///
    /// Defaults to the struct's type name (e.g. `FollowerNode`).
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        match full.rfind("::") {
            Some(pos) => &full[pos + 2..],
            None => full,
        }
    }

    /// Initialize the node (called once at startup). An error here is
    /// fatal: the scheduler never enters its running state.
    fn init(&mut self) -> TracerResult<()> {
        Ok(())
    }

    /// One iteration of work. Returning an error is fatal to the whole
    /// loop — the scheduler transitions to its shutdown sequence.
    fn tick(&mut self) -> TracerResult<()>;

    /// Shutdown the node (called once at cleanup, on every exit path).
    fn shutdown(&mut self) -> TracerResult<()> {
        Ok(())
    }

    /// This node's tick rate in Hz. `None` means tick on every scheduler
    /// pass. Can be overridden at registration time.
    fn rate_hz(&self) -> Option<f64> {
        None
    }
}
