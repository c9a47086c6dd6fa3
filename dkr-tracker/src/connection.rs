//! Connection lifecycle tracking
//!
//! [`ConnectionMonitor`] is the pure state machine behind each cycle: it is fed
//! one reachability probe result per cycle and reports which callbacks should
//! fire. It performs no I/O so the polling loop and tests drive it directly.

/// Whether the server's base endpoint is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// A change of [`ConnectionState`] caused by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The server became reachable. `first` is true only for the very first
    /// connection of a tracker instance.
    Connected { first: bool },
    Disconnected,
}

/// What a single probe result means for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// The failure threshold was reached on this probe
    pub reconnect_failed: bool,
    /// State change to report, if any
    pub transition: Option<Transition>,
    /// Resources should be polled this cycle
    pub poll_resources: bool,
}

#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    failed_attempts: u32,
    threshold: u32,
    has_connected: bool,
}

impl ConnectionMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            failed_attempts: 0,
            threshold,
            has_connected: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed probes since the last success or threshold trip.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Change the failure threshold. The failure count starts over.
    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
        self.failed_attempts = 0;
    }

    /// Apply one probe result.
    pub fn observe(&mut self, reachable: bool) -> ProbeOutcome {
        let mut reconnect_failed = false;

        if reachable {
            self.failed_attempts = 0;
        } else {
            self.failed_attempts += 1;
            if self.failed_attempts >= self.threshold {
                reconnect_failed = true;
                self.failed_attempts = 0;
            }
        }

        let transition = match (reachable, self.state) {
            (true, ConnectionState::Disconnected) => {
                let first = !self.has_connected;
                self.has_connected = true;
                self.state = ConnectionState::Connected;
                Some(Transition::Connected { first })
            }
            (false, ConnectionState::Connected) => {
                self.state = ConnectionState::Disconnected;
                Some(Transition::Disconnected)
            }
            _ => None,
        };

        ProbeOutcome {
            reconnect_failed,
            transition,
            poll_resources: self.state == ConnectionState::Connected,
        }
    }
}
