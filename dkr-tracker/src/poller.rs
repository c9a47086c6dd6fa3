//! Polling loop and cycle body
//!
//! One tokio task runs per loop generation. Each iteration runs a cycle
//! (probe, connection transition, resource polling) and then sleeps for the
//! configured delay. Restarting the loop cancels the current generation's
//! token and spawns a new task; a cancelled generation never acts on results
//! it receives afterwards.
//!
//! Locks are never held across an `.await` and never held while a user
//! callback runs, so callbacks may call back into the tracker. When both are
//! needed the loop slot is locked before the poll state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::try_join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::callbacks::Callbacks;
use crate::config::TrackerConfig;
use crate::connection::{ConnectionMonitor, Transition};
use crate::error::TrackerError;
use crate::resource::{ContentCache, Resource};
use crate::transport::{Endpoint, Transport};

/// Why the polling loop stopped scheduling cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop_internal_loop` was called
    Requested,
    /// The `serverError` callback returned true
    ServerErrorSignalled,
    /// The `reconnectFailed` callback returned true and the tracker is
    /// configured to honor it
    ReconnectAbandoned,
    /// A resource could not be fetched or decoded
    FetchFailed(TrackerError),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stopped on request"),
            StopReason::ServerErrorSignalled => write!(f, "stopped by serverError callback"),
            StopReason::ReconnectAbandoned => write!(f, "stopped by reconnectFailed callback"),
            StopReason::FetchFailed(e) => write!(f, "stopped after fetch failure: {e}"),
        }
    }
}

/// State mutated by cycles and setters.
#[derive(Debug)]
pub(crate) struct PollState {
    pub(crate) monitor: ConnectionMonitor,
    pub(crate) cache: ContentCache,
    pub(crate) cycles: u64,
    pub(crate) last_stop: Option<StopReason>,
}

/// The single pending continuation of the loop.
#[derive(Debug)]
pub(crate) struct LoopHandle {
    generation: u64,
    token: CancellationToken,
    _task: JoinHandle<()>,
}

/// Everything a tracker handle and its loop task share.
pub(crate) struct Shared {
    pub(crate) config: RwLock<TrackerConfig>,
    pub(crate) callbacks: RwLock<Callbacks>,
    pub(crate) state: Mutex<PollState>,
    loop_slot: Mutex<Option<LoopHandle>>,
    transport: Arc<dyn Transport>,
    runtime: tokio::runtime::Handle,
    next_generation: AtomicU64,
}

pub(crate) enum CycleOutcome {
    /// Schedule the next cycle
    Continue,
    /// The generation was cancelled while the cycle ran
    Cancelled,
    /// Stop scheduling cycles
    Stop(StopReason),
}

enum ResourceStop {
    Cancelled,
    Stop(StopReason),
}

impl Shared {
    pub(crate) fn new(
        config: TrackerConfig,
        callbacks: Callbacks,
        transport: Arc<dyn Transport>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let state = PollState {
            monitor: ConnectionMonitor::new(config.reconnect_attempts),
            cache: ContentCache::new(),
            cycles: 0,
            last_stop: None,
        };

        Self {
            config: RwLock::new(config),
            callbacks: RwLock::new(callbacks),
            state: Mutex::new(state),
            loop_slot: Mutex::new(None),
            transport,
            runtime,
            next_generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        let config = self.config.read();
        Endpoint::new(config.host.clone(), config.port, config.request_timeout)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.loop_slot.lock().is_some()
    }

    /// Cancel the current generation, if any. Returns whether one was running.
    pub(crate) fn stop(&self) -> bool {
        let mut slot = self.loop_slot.lock();
        let stopped = Self::cancel_locked(&mut slot, &self.state);
        if stopped {
            self.state.lock().last_stop = Some(StopReason::Requested);
        }
        stopped
    }

    /// Cancel the current generation and start a new one whose first cycle
    /// runs immediately.
    pub(crate) fn restart(self: &Arc<Self>) {
        let mut slot = self.loop_slot.lock();
        Self::cancel_locked(&mut slot, &self.state);
        self.state.lock().last_stop = None;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let task = self.runtime.spawn(run_loop(
            Arc::downgrade(self),
            generation,
            token.clone(),
        ));

        *slot = Some(LoopHandle {
            generation,
            token,
            _task: task,
        });
    }

    fn cancel_locked(slot: &mut Option<LoopHandle>, state: &Mutex<PollState>) -> bool {
        match slot.take() {
            Some(handle) => {
                // Cancelling under the state lock means a cycle that is
                // about to act on a result either finishes first or sees
                // the cancellation.
                let _state = state.lock();
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Record that `generation` stopped on its own.
    fn finish(&self, generation: u64, reason: StopReason) {
        let mut slot = self.loop_slot.lock();
        let current = slot
            .as_ref()
            .is_some_and(|handle| handle.generation == generation);
        if current {
            *slot = None;
            self.state.lock().last_stop = Some(reason);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_slot.get_mut().take() {
            handle.token.cancel();
        }
    }
}

async fn run_loop(shared: Weak<Shared>, generation: u64, token: CancellationToken) {
    tracing::info!(generation, "Polling loop started");

    loop {
        if token.is_cancelled() {
            break;
        }
        let Some(inner) = shared.upgrade() else {
            break;
        };

        match run_cycle(&inner, &token).await {
            CycleOutcome::Continue => {}
            CycleOutcome::Cancelled => break,
            CycleOutcome::Stop(reason) => {
                tracing::info!(generation, %reason, "Polling loop stopped");
                inner.finish(generation, reason);
                return;
            }
        }

        let delay = inner.config.read().loop_delay;
        drop(inner);

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::info!(generation, "Polling loop cancelled");
}

/// Run one cycle against the current configuration and callbacks.
pub(crate) async fn run_cycle(inner: &Shared, token: &CancellationToken) -> CycleOutcome {
    let endpoint = inner.endpoint();
    let stop_on_reconnect_failed = inner.config.read().stop_on_reconnect_failed;
    let callbacks = inner.callbacks.read().clone();

    let reachable = match inner.transport.probe(&endpoint).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Probe failed: {}", e);
            false
        }
    };

    let (outcome, failed_attempts) = {
        let mut state = inner.state.lock();
        if token.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        state.cycles += 1;
        let outcome = state.monitor.observe(reachable);
        (outcome, state.monitor.failed_attempts())
    };

    tracing::debug!(
        reachable,
        failed_attempts,
        "Probed {}",
        endpoint.base_url()
    );

    let mut abandon = false;
    if outcome.reconnect_failed {
        tracing::warn!("Server unreachable at {}, reconnect attempts exhausted", endpoint.base_url());
        abandon = callbacks.reconnect_failed() && stop_on_reconnect_failed;
    }

    match outcome.transition {
        Some(Transition::Connected { first }) => {
            tracing::info!(first, "Connected to {}", endpoint.base_url());
            callbacks.connected(first);
        }
        Some(Transition::Disconnected) => {
            tracing::info!("Disconnected from {}", endpoint.base_url());
            callbacks.disconnected();
        }
        None => {}
    }

    if abandon {
        return CycleOutcome::Stop(StopReason::ReconnectAbandoned);
    }
    if token.is_cancelled() {
        return CycleOutcome::Cancelled;
    }
    if !outcome.poll_resources {
        return CycleOutcome::Continue;
    }

    let polls = callbacks
        .subscribed_resources()
        .into_iter()
        .map(|resource| poll_resource(inner, &callbacks, &endpoint, token, resource));

    match try_join_all(polls).await {
        Ok(_) => CycleOutcome::Continue,
        Err(ResourceStop::Cancelled) => CycleOutcome::Cancelled,
        Err(ResourceStop::Stop(reason)) => CycleOutcome::Stop(reason),
    }
}

async fn poll_resource(
    inner: &Shared,
    callbacks: &Callbacks,
    endpoint: &Endpoint,
    token: &CancellationToken,
    resource: Resource,
) -> Result<(), ResourceStop> {
    let fetched = inner.transport.fetch(endpoint, resource).await;
    if token.is_cancelled() {
        return Err(ResourceStop::Cancelled);
    }

    let content: Value = match fetched {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("Failed to poll {}: {}", resource, e);
            return Err(ResourceStop::Stop(StopReason::FetchFailed(e)));
        }
    };

    let changed = {
        let mut state = inner.state.lock();
        if token.is_cancelled() {
            return Err(ResourceStop::Cancelled);
        }
        state.cache.record_if_changed(resource, &content)
    };
    if !changed {
        return Ok(());
    }

    tracing::debug!("{} changed", resource);
    let stop_requested = callbacks.resource_updated(resource, &content);
    if resource == Resource::ServerError && stop_requested {
        return Err(ResourceStop::Stop(StopReason::ServerErrorSignalled));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};

    /// Transport that replays scripted answers. The last answer of each
    /// script repeats once the script runs out.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        probes: Mutex<VecDeque<bool>>,
        resources: Mutex<HashMap<Resource, VecDeque<Result<Value>>>>,
        fetches: Mutex<Vec<(u16, Resource)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn probes(self, probes: &[bool]) -> Self {
            self.probes.lock().extend(probes.iter().copied());
            self
        }

        pub(crate) fn serve(self, resource: Resource, answers: Vec<Result<Value>>) -> Self {
            self.resources.lock().insert(resource, answers.into());
            self
        }

        pub(crate) fn fetched(&self) -> Vec<(u16, Resource)> {
            self.fetches.lock().clone()
        }
    }

    fn next_of<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn probe(&self, endpoint: &Endpoint) -> Result<()> {
            match next_of(&mut self.probes.lock()) {
                Some(true) => Ok(()),
                _ => Err(TrackerError::Network {
                    url: endpoint.base_url(),
                    message: "connection refused".to_string(),
                }),
            }
        }

        async fn fetch(&self, endpoint: &Endpoint, resource: Resource) -> Result<Value> {
            self.fetches.lock().push((endpoint.port, resource));
            let mut resources = self.resources.lock();
            let queue = resources.entry(resource).or_default();
            next_of(queue).unwrap_or_else(|| Ok(json!({})))
        }
    }

    /// Ordered log of callback invocations.
    #[derive(Clone, Default)]
    pub(crate) struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        pub(crate) fn push(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        pub(crate) fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }

        pub(crate) fn count(&self, prefix: &str) -> usize {
            self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
        }

        pub(crate) fn callbacks(&self) -> Callbacks {
            let (a, b, c, d, e, f, g) = (
                self.clone(),
                self.clone(),
                self.clone(),
                self.clone(),
                self.clone(),
                self.clone(),
                self.clone(),
            );
            Callbacks::new()
                .on_connected(move |first| a.push(format!("connected({first})")))
                .on_disconnected(move || b.push("disconnected"))
                .on_reconnect_failed(move || {
                    c.push("reconnectFailed");
                    false
                })
                .on_server_error(move |payload| {
                    d.push(format!("serverError {payload}"));
                    payload.get("stop") == Some(&Value::Bool(true))
                })
                .on_save_data_updated(move |payload| e.push(format!("saveData {payload}")))
                .on_gold_balloons_updated(move |payload| f.push(format!("goldBalloons {payload}")))
                .on_map_updated(move |payload| g.push(format!("map {payload}")))
        }
    }

    fn shared(transport: ScriptedTransport, callbacks: Callbacks) -> (Arc<Shared>, Arc<ScriptedTransport>) {
        shared_with(TrackerConfig::default(), transport, callbacks)
    }

    fn shared_with(
        config: TrackerConfig,
        transport: ScriptedTransport,
        callbacks: Callbacks,
    ) -> (Arc<Shared>, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let shared = Arc::new(Shared::new(
            config,
            callbacks,
            transport.clone(),
            tokio::runtime::Handle::current(),
        ));
        (shared, transport)
    }

    async fn cycles(shared: &Shared, n: usize) -> Vec<&'static str> {
        let token = CancellationToken::new();
        let mut outcomes = Vec::new();
        for _ in 0..n {
            outcomes.push(match run_cycle(shared, &token).await {
                CycleOutcome::Continue => "continue",
                CycleOutcome::Cancelled => "cancelled",
                CycleOutcome::Stop(_) => "stop",
            });
        }
        outcomes
    }

    #[tokio::test]
    async fn test_connected_fires_before_resource_callbacks() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default()
            .probes(&[true])
            .serve(Resource::Map, vec![Ok(json!({"OW": ["DD"]}))]);
        let (shared, _) = shared(transport, recorder.callbacks());

        assert_eq!(cycles(&shared, 1).await, vec!["continue"]);
        assert_eq!(
            recorder.entries(),
            vec!["connected(true)".to_string(), r#"map {"OW":["DD"]}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_identical_content_reported_once() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default()
            .probes(&[true])
            .serve(
                Resource::Map,
                vec![Ok(json!({"OW": ["DD"]})), Ok(json!({"OW": ["DD"]}))],
            );
        let (shared, _) = shared(transport, recorder.callbacks());

        cycles(&shared, 3).await;
        assert_eq!(recorder.count("map"), 1);
        assert_eq!(shared.state.lock().cache.last_seen(Resource::Map), r#"{"OW":["DD"]}"#);
    }

    #[tokio::test]
    async fn test_no_polling_while_disconnected() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default().probes(&[false]);
        let (shared, transport) = shared(transport, recorder.callbacks());

        assert_eq!(cycles(&shared, 3).await, vec!["continue"; 3]);
        assert!(transport.fetched().is_empty());
        assert!(recorder.entries().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_skips_resource_polling() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default().probes(&[true, false, true]);
        let (shared, transport) = shared(transport, recorder.callbacks());

        cycles(&shared, 3).await;
        assert_eq!(
            recorder.entries(),
            vec!["connected(true)", "disconnected", "connected(false)"]
        );
        // Four resources polled on cycles one and three only.
        assert_eq!(transport.fetched().len(), 8);
    }

    #[tokio::test]
    async fn test_reconnect_failed_once_per_threshold_run() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default().probes(&[false]);
        let (shared, _) = shared(transport, recorder.callbacks());

        cycles(&shared, 6).await;
        assert_eq!(recorder.count("reconnectFailed"), 1);
        assert_eq!(shared.state.lock().monitor.failed_attempts(), 1);

        cycles(&shared, 4).await;
        assert_eq!(recorder.count("reconnectFailed"), 2);
    }

    #[tokio::test]
    async fn test_reconnect_failed_result_ignored_by_default() {
        let transport = ScriptedTransport::default().probes(&[false]);
        let callbacks = Callbacks::new().on_reconnect_failed(|| true);
        let config = TrackerConfig::default().with_reconnect_attempts(1);
        let (shared, _) = shared_with(config, transport, callbacks);

        assert_eq!(cycles(&shared, 2).await, vec!["continue", "continue"]);
    }

    #[tokio::test]
    async fn test_reconnect_failed_can_stop_when_enabled() {
        let transport = ScriptedTransport::default().probes(&[false]);
        let callbacks = Callbacks::new().on_reconnect_failed(|| true);
        let config = TrackerConfig::default()
            .with_reconnect_attempts(2)
            .with_stop_on_reconnect_failed(true);
        let (shared, _) = shared_with(config, transport, callbacks);

        assert_eq!(cycles(&shared, 2).await, vec!["continue", "stop"]);
    }

    #[tokio::test]
    async fn test_server_error_true_stops_cycle() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default()
            .probes(&[true])
            .serve(Resource::ServerError, vec![Ok(json!({"stop": true}))]);
        let (shared, _) = shared(transport, recorder.callbacks());

        let token = CancellationToken::new();
        match run_cycle(&shared, &token).await {
            CycleOutcome::Stop(reason) => assert_eq!(reason, StopReason::ServerErrorSignalled),
            _ => panic!("Expected the cycle to stop"),
        }
        assert_eq!(recorder.count("serverError"), 1);
    }

    #[tokio::test]
    async fn test_server_error_false_keeps_polling() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default()
            .probes(&[true])
            .serve(Resource::ServerError, vec![Ok(json!({"message": "warning"}))]);
        let (shared, _) = shared(transport, recorder.callbacks());

        assert_eq!(cycles(&shared, 2).await, vec!["continue", "continue"]);
        assert_eq!(recorder.count("serverError"), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_without_update() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default().probes(&[true]).serve(
            Resource::SaveData,
            vec![Err(TrackerError::Decode {
                resource: Resource::SaveData,
                message: "expected value".to_string(),
            })],
        );
        let (shared, _) = shared(transport, recorder.callbacks());

        let token = CancellationToken::new();
        match run_cycle(&shared, &token).await {
            CycleOutcome::Stop(StopReason::FetchFailed(TrackerError::Decode { resource, .. })) => {
                assert_eq!(resource, Resource::SaveData)
            }
            _ => panic!("Expected a fetch failure"),
        }
        assert_eq!(recorder.count("saveData"), 0);
        assert_eq!(shared.state.lock().cache.last_seen(Resource::SaveData), "{}");
    }

    #[tokio::test]
    async fn test_only_subscribed_resources_fetched() {
        let transport = ScriptedTransport::default().probes(&[true]);
        let callbacks = Callbacks::new().on_gold_balloons_updated(|_| {});
        let (shared, transport) = shared(transport, callbacks);

        cycles(&shared, 1).await;
        assert_eq!(transport.fetched(), vec![(4675, Resource::GoldBalloons)]);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_does_not_act() {
        let recorder = Recorder::default();
        let transport = ScriptedTransport::default().probes(&[true]);
        let (shared, _) = shared(transport, recorder.callbacks());

        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(run_cycle(&shared, &token).await, CycleOutcome::Cancelled));
        assert!(recorder.entries().is_empty());
        assert_eq!(shared.state.lock().cycles, 0);
    }

    #[tokio::test]
    async fn test_port_change_applies_to_next_cycle() {
        let transport = ScriptedTransport::default().probes(&[true]);
        let callbacks = Callbacks::new().on_map_updated(|_| {});
        let (shared, transport) = shared(transport, callbacks);

        cycles(&shared, 1).await;
        shared.config.write().port = 5000;
        cycles(&shared, 1).await;

        assert_eq!(
            transport.fetched(),
            vec![(4675, Resource::Map), (5000, Resource::Map)]
        );
    }
}
