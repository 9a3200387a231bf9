//! Cooperative fixed-rate scheduler.
//!
//! Holds registered nodes and drives their lifecycle: init in order,
//! tick at each node's rate, shutdown on every exit path. Rate gating is
//! a minimum-period floor — a node never ticks faster than its declared
//! rate, but no strict periodic guarantee is made. Cancellation is
//! cooperative: SIGINT/SIGTERM set a flag that is checked between
//! iterations, so an iteration always completes its work before exit.

use crate::core::log::{clear_node_context, set_node_context};
use crate::core::node::{Node, NodeState};
use crate::error::{TracerError, TracerResult};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(unix)]
static SIGTERM_RECEIVED: AtomicBool = AtomicBool::new(false);

/// SIGTERM handler — sets a flag and lets the loop do the cleanup.
///
/// # Safety
/// Signal handlers must only call async-signal-safe functions; storing to
/// an atomic qualifies.
#[cfg(unix)]
extern "C" fn sigterm_handler(_signum: libc::c_int) {
    SIGTERM_RECEIVED.store(true, Ordering::SeqCst);
}

struct RegisteredNode {
    node: Box<dyn Node>,
    order: u32,
    period: Option<Duration>,
    last_tick: Option<Instant>,
    initialized: bool,
}

/// Central orchestrator: holds nodes, drives the tick loop.
pub struct Scheduler {
    nodes: Vec<RegisteredNode>,
    running: Arc<Mutex<bool>>,
    state: NodeState,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            running: Arc::new(Mutex::new(true)),
            state: NodeState::Uninitialized,
        }
    }

    /// Register a node. Chain `.order(..)` / `.rate_hz(..)` and finish
    /// with `.done()`:
    ///
    /// ```ignore
    /// scheduler.add(follower).order(0).rate_hz(30.0).done();
    /// ```
    pub fn add(&mut self, node: impl Node + 'static) -> NodeHandle<'_> {
        let order = self.nodes.len() as u32;
        let period = node.rate_hz().map(period_from_hz);
        self.nodes.push(RegisteredNode {
            node: Box::new(node),
            order,
            period,
            last_tick: None,
            initialized: false,
        });
        let index = self.nodes.len() - 1;
        NodeHandle {
            scheduler: self,
            index,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Shared stop flag; clearing it ends the loop after the current
    /// iteration.
    pub fn running_flag(&self) -> Arc<Mutex<bool>> {
        self.running.clone()
    }

    /// Run all nodes until interrupted or a node fails.
    pub fn run(&mut self) -> TracerResult<()> {
        self.run_inner(None)
    }

    /// Run all nodes for at most `duration`, then shut down gracefully.
    pub fn run_for(&mut self, duration: Duration) -> TracerResult<()> {
        self.run_inner(Some(duration))
    }

    fn run_inner(&mut self, duration: Option<Duration>) -> TracerResult<()> {
        self.state = NodeState::Initializing;
        *self.running.lock() = true;

        let running = self.running.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            eprintln!("\nCtrl+C received, shutting down...");
            *running.lock() = false;
        }) {
            // Already installed by an earlier run in this process
            crate::tlog!(warn, "signal handler not installed: {}", e);
        }

        #[cfg(unix)]
        // SAFETY: SIGTERM is a valid signal and sigterm_handler is a
        // valid extern "C" function pointer for the duration of the process.
        unsafe {
            libc::signal(
                libc::SIGTERM,
                sigterm_handler as *const () as libc::sighandler_t,
            );
        }

        self.nodes.sort_by_key(|n| n.order);

        // Initialize in order; any failure aborts startup but still shuts
        // down whatever already came up.
        for i in 0..self.nodes.len() {
            let name = self.nodes[i].node.name().to_string();
            set_node_context(&name);
            let result = catch_unwind(AssertUnwindSafe(|| self.nodes[i].node.init()));
            clear_node_context();

            let result = match result {
                Ok(r) => r,
                Err(_) => Err(TracerError::node(&name, "panicked during init")),
            };
            match result {
                Ok(()) => {
                    self.nodes[i].initialized = true;
                    crate::tlog!(info, "Initialized node '{}'", name);
                }
                Err(e) => {
                    crate::tlog!(error, "Failed to initialize node '{}': {}", name, e);
                    self.shutdown_nodes();
                    self.state = NodeState::Error(e.to_string());
                    return Err(e);
                }
            }
        }

        self.state = NodeState::Running;
        let start = Instant::now();
        let mut fatal: Option<TracerError> = None;

        'main: while self.is_running() {
            if let Some(limit) = duration {
                if start.elapsed() >= limit {
                    crate::tlog!(info, "Scheduler reached time limit of {:?}", limit);
                    break;
                }
            }
            #[cfg(unix)]
            if SIGTERM_RECEIVED.load(Ordering::SeqCst) {
                crate::tlog!(info, "SIGTERM received, shutting down...");
                break;
            }

            let now = Instant::now();
            for registered in self.nodes.iter_mut() {
                if !registered.initialized || !due(registered, now) {
                    continue;
                }
                registered.last_tick = Some(now);

                let name = registered.node.name().to_string();
                set_node_context(&name);
                let result = catch_unwind(AssertUnwindSafe(|| registered.node.tick()));
                clear_node_context();

                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        crate::tlog!(error, "Node '{}' failed: {}", name, e);
                        fatal = Some(e);
                        break 'main;
                    }
                    Err(_) => {
                        let e = TracerError::node(&name, "panicked during tick");
                        crate::tlog!(error, "{}", e);
                        fatal = Some(e);
                        break 'main;
                    }
                }
            }

            // Minimum-period floor: yield briefly and re-check rather than
            // tracking exact deadlines.
            std::thread::sleep(Duration::from_millis(1));
        }

        self.state = NodeState::Stopping;
        self.shutdown_nodes();
        self.state = NodeState::Stopped;

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Shut down every initialized node exactly once, containing panics
    /// so one misbehaving node cannot skip the others' cleanup.
    fn shutdown_nodes(&mut self) {
        for registered in self.nodes.iter_mut() {
            if !registered.initialized {
                continue;
            }
            registered.initialized = false;
            let name = registered.node.name().to_string();
            set_node_context(&name);
            let result = catch_unwind(AssertUnwindSafe(|| registered.node.shutdown()));
            clear_node_context();
            match result {
                Ok(Ok(())) => crate::tlog!(info, "Node '{}' stopped", name),
                Ok(Err(e)) => crate::tlog!(error, "Node '{}' shutdown error: {}", name, e),
                Err(_) => crate::tlog!(error, "Node '{}' panicked during shutdown", name),
            }
        }
    }
}

fn due(registered: &RegisteredNode, now: Instant) -> bool {
    match (registered.period, registered.last_tick) {
        (Some(period), Some(last)) => now.duration_since(last) >= period,
        _ => true,
    }
}

fn period_from_hz(hz: f64) -> Duration {
    // Floor at 1mHz so a bad rate degrades instead of overflowing Duration
    Duration::from_secs_f64(1.0 / hz.max(0.001))
}

/// Builder-style handle returned by [`Scheduler::add`].
pub struct NodeHandle<'a> {
    scheduler: &'a mut Scheduler,
    index: usize,
}

impl NodeHandle<'_> {
    /// Execution order within a scheduler pass (lower runs first).
    pub fn order(self, order: u32) -> Self {
        self.scheduler.nodes[self.index].order = order;
        self
    }

    /// Tick rate in Hz, overriding the node's own `rate_hz()`.
    pub fn rate_hz(self, hz: f64) -> Self {
        self.scheduler.nodes[self.index].period = Some(period_from_hz(hz));
        self
    }

    /// Finish registration.
    pub fn done(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct CountingNode {
        ticks: Arc<AtomicU32>,
        shutdowns: Arc<AtomicU32>,
        fail_after: Option<u32>,
    }

    impl Node for CountingNode {
        fn name(&self) -> &str {
            "counting"
        }

        fn tick(&mut self) -> TracerResult<()> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(limit) = self.fail_after {
                if n >= limit {
                    return Err(TracerError::node("counting", "tick limit reached"));
                }
            }
            Ok(())
        }

        fn shutdown(&mut self) -> TracerResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn run_for_ticks_and_shuts_down() {
        let ticks = Arc::new(AtomicU32::new(0));
        let shutdowns = Arc::new(AtomicU32::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .add(CountingNode {
                ticks: ticks.clone(),
                shutdowns: shutdowns.clone(),
                fail_after: None,
            })
            .order(0)
            .rate_hz(100.0)
            .done();

        scheduler
            .run_for(Duration::from_millis(100))
            .expect("clean run");

        let n = ticks.load(Ordering::SeqCst);
        // 100Hz over 100ms: roughly 10 ticks, floor semantics allow fewer
        assert!(n > 1 && n <= 100, "unexpected tick count {}", n);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(*scheduler.state(), NodeState::Stopped);
    }

    #[test]
    fn failing_tick_is_fatal_but_cleanup_runs() {
        let ticks = Arc::new(AtomicU32::new(0));
        let shutdowns = Arc::new(AtomicU32::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .add(CountingNode {
                ticks: ticks.clone(),
                shutdowns: shutdowns.clone(),
                fail_after: Some(3),
            })
            .done();

        let result = scheduler.run_for(Duration::from_secs(5));
        assert!(result.is_err());
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rate_floor_limits_tick_count() {
        let ticks = Arc::new(AtomicU32::new(0));
        let shutdowns = Arc::new(AtomicU32::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .add(CountingNode {
                ticks: ticks.clone(),
                shutdowns: shutdowns.clone(),
                fail_after: None,
            })
            .rate_hz(10.0)
            .done();

        scheduler
            .run_for(Duration::from_millis(250))
            .expect("clean run");

        // 10Hz over 250ms: at most 4 ticks (floor semantics), at least 1
        let n = ticks.load(Ordering::SeqCst);
        assert!((1..=4).contains(&n), "unexpected tick count {}", n);
    }
}
