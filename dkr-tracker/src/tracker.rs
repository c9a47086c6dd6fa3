//! The public tracker handle

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::callbacks::{Callback, Callbacks, TrackerEvent};
use crate::config::{validate_port, validate_reconnect_attempts, TrackerConfig};
use crate::connection::ConnectionState;
use crate::error::{Result, TrackerError};
use crate::poller::{Shared, StopReason};
use crate::transport::{HttpTransport, Transport};

/// Polling client for the DKR Rando auto-tracker server.
///
/// The tracker probes `http://<host>:<port>/` once per cycle, reports
/// connection changes, and while connected fetches every resource that has a
/// callback, invoking the callback whenever the content changes.
///
/// Construction starts the loop on the current tokio runtime; the first cycle
/// runs immediately. The handle is cheap to clone and every clone controls the
/// same loop. Callbacks may call back into the tracker, for example to stop the
/// loop from `reconnectFailed`.
///
/// # Example
///
/// ```no_run
/// use dkr_tracker::{Callbacks, DkrRandoAutoTracker};
///
/// #[tokio::main]
/// async fn main() -> dkr_tracker::Result<()> {
///     let callbacks = Callbacks::new()
///         .on_connected(|first| println!("connected (first: {first})"))
///         .on_map_updated(|map| println!("map: {map}"));
///
///     let tracker = DkrRandoAutoTracker::new(callbacks, 4675)?;
///     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
///     tracker.stop_internal_loop();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DkrRandoAutoTracker {
    inner: Arc<Shared>,
}

impl DkrRandoAutoTracker {
    /// Create a tracker for `localhost:<port>` with default settings.
    pub fn new(callbacks: Callbacks, port: u16) -> Result<Self> {
        Self::with_config(TrackerConfig::default().with_port(port), callbacks)
    }

    pub fn with_config(config: TrackerConfig, callbacks: Callbacks) -> Result<Self> {
        Self::with_transport(config, callbacks, Arc::new(HttpTransport::new()))
    }

    /// Create a tracker that talks to the server through `transport`.
    pub fn with_transport(
        config: TrackerConfig,
        callbacks: Callbacks,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;

        let inner = Arc::new(Shared::new(config, callbacks, transport, runtime));
        inner.restart();
        Ok(Self { inner })
    }

    /// Install a handler, replacing the current one for its event.
    ///
    /// Cached resource content is kept, so a new update handler only fires
    /// once the content changes again.
    pub fn set_callback(&self, callback: Callback) {
        tracing::debug!("Setting {} callback", callback.event());
        self.inner.callbacks.write().set(callback);
    }

    /// Replace the handler for `event` with the no-op.
    pub fn clear_callback(&self, event: TrackerEvent) {
        tracing::debug!("Clearing {} callback", event);
        self.inner.callbacks.write().clear(event);
    }

    /// Change the delay between cycles and restart the loop.
    pub fn set_internal_loop_delay(&self, delay: Duration) {
        self.inner.config.write().loop_delay = delay;
        self.restart_internal_loop();
    }

    /// Change the port used from the next probe on.
    pub fn set_port(&self, port: u16) -> Result<()> {
        validate_port(port)?;
        self.inner.config.write().port = port;
        Ok(())
    }

    /// Change how many consecutive failed probes trigger `reconnectFailed`.
    /// The failure count starts over.
    pub fn set_reconnect_attempts_count(&self, attempts: u32) -> Result<()> {
        validate_reconnect_attempts(attempts)?;
        self.inner.config.write().reconnect_attempts = attempts;
        self.inner.state.lock().monitor.set_threshold(attempts);
        Ok(())
    }

    /// Stop scheduling cycles. Requests already in flight finish but their
    /// results are discarded. Calling this when the loop is stopped does
    /// nothing.
    pub fn stop_internal_loop(&self) {
        if self.inner.stop() {
            tracing::info!("Polling loop stop requested");
        }
    }

    /// Stop the loop if it is running and start a new one immediately.
    pub fn restart_internal_loop(&self) {
        self.inner.restart();
    }

    pub fn port(&self) -> u16 {
        self.inner.config.read().port
    }

    pub fn loop_delay(&self) -> Duration {
        self.inner.config.read().loop_delay
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().monitor.state()
    }

    /// Whether a loop continuation is pending.
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Why the loop last stopped, or `None` while it is running.
    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.inner.state.lock().last_stop.clone()
    }

    pub fn stats(&self) -> TrackerStats {
        let (port, loop_delay) = {
            let config = self.inner.config.read();
            (config.port, config.loop_delay)
        };
        let is_running = self.inner.is_running();
        let state = self.inner.state.lock();

        TrackerStats {
            port,
            loop_delay,
            connection_state: state.monitor.state(),
            failed_attempts: state.monitor.failed_attempts(),
            reconnect_threshold: state.monitor.threshold(),
            cycles: state.cycles,
            is_running,
            last_stop: state.last_stop.clone(),
        }
    }
}

impl fmt::Debug for DkrRandoAutoTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkrRandoAutoTracker")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Snapshot of a tracker's state
#[derive(Debug, Clone)]
pub struct TrackerStats {
    pub port: u16,
    pub loop_delay: Duration,
    pub connection_state: ConnectionState,
    pub failed_attempts: u32,
    pub reconnect_threshold: u32,
    pub cycles: u64,
    pub is_running: bool,
    pub last_stop: Option<StopReason>,
}

impl fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracker Stats:")?;
        writeln!(f, "  Port: {}", self.port)?;
        writeln!(f, "  Loop delay: {:?}", self.loop_delay)?;
        writeln!(f, "  Connection: {:?}", self.connection_state)?;
        writeln!(
            f,
            "  Failed probes: {}/{}",
            self.failed_attempts, self.reconnect_threshold
        )?;
        writeln!(f, "  Cycles: {}", self.cycles)?;
        match &self.last_stop {
            Some(reason) if !self.is_running => writeln!(f, "  Loop: {}", reason),
            _ => writeln!(f, "  Loop: {}", if self.is_running { "running" } else { "idle" }),
        }
    }
}
