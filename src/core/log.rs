//! Thread-local node logging context.
//!
//! The `tlog!()` macro lets nodes log without threading a context handle
//! through every call. The scheduler sets the current node name before
//! each lifecycle call (init, tick, shutdown) and clears it after, so
//! every line is attributed to the node that produced it.

use colored::Colorize;
use std::cell::RefCell;
use std::io::Write;

thread_local! {
    static CURRENT_NODE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    fn tag(self) -> colored::ColoredString {
        match self {
            LogLevel::Info => "[INFO]".blue(),
            LogLevel::Warning => "[WARN]".yellow(),
            LogLevel::Error => "[ERROR]".red(),
            LogLevel::Debug => "[DEBUG]".bright_black(),
        }
    }
}

/// Set the current node context for this thread. Called by the scheduler
/// before invoking node lifecycle methods.
pub fn set_node_context(name: &str) {
    CURRENT_NODE.with(|ctx| {
        let mut slot = ctx.borrow_mut();
        match *slot {
            // Reuse the allocation when possible
            Some(ref mut existing) => {
                existing.clear();
                existing.push_str(name);
            }
            None => *slot = Some(name.to_owned()),
        }
    });
}

/// Clear the current node context for this thread. Called by the
/// scheduler after node lifecycle methods complete.
pub fn clear_node_context() {
    CURRENT_NODE.with(|ctx| {
        if let Some(ref mut existing) = *ctx.borrow_mut() {
            existing.clear();
        }
    });
}

/// Internal function used by the `tlog!()` macro.
pub fn log_with_context(level: LogLevel, message: String) {
    let node_name = CURRENT_NODE.with(|ctx| {
        ctx.borrow()
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| "main".to_string())
    });

    let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
    let line = format!(
        "{} {} {} {}\n",
        stamp,
        level.tag(),
        format!("[{}]", node_name).yellow(),
        message
    );
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(line.as_bytes());
    let _ = stderr.flush();
}

/// Log a message from within a node lifecycle method.
///
/// ```ignore
/// tlog!(info, "System ready");
/// tlog!(warn, "Lost line (conf: {:.2})", conf);
/// tlog!(error, "I2C write failed: {}", e);
/// tlog!(debug, "mask area: {}", area);
/// ```
#[macro_export]
macro_rules! tlog {
    (info, $($arg:tt)*) => {
        $crate::core::log::log_with_context($crate::core::log::LogLevel::Info, format!($($arg)*))
    };
    (warn, $($arg:tt)*) => {
        $crate::core::log::log_with_context($crate::core::log::LogLevel::Warning, format!($($arg)*))
    };
    (error, $($arg:tt)*) => {
        $crate::core::log::log_with_context($crate::core::log::LogLevel::Error, format!($($arg)*))
    };
    (debug, $($arg:tt)*) => {
        $crate::core::log::log_with_context($crate::core::log::LogLevel::Debug, format!($($arg)*))
    };
}
