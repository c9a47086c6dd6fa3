//! Callback table
//!
//! The embedding application reacts to the tracker through a fixed set of
//! events. Each event has its own handler signature; a missing handler behaves
//! like a no-op that returns `false`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::resource::Resource;

/// Handler for `connected`. The argument is true on the first connection only.
pub type ConnectedHandler = Arc<dyn Fn(bool) + Send + Sync>;
/// Handler for `disconnected`.
pub type DisconnectedHandler = Arc<dyn Fn() + Send + Sync>;
/// Handler for `reconnectFailed`.
pub type ReconnectFailedHandler = Arc<dyn Fn() -> bool + Send + Sync>;
/// Handler for a resource update. The return value only matters for
/// `serverError`, where `true` stops the loop.
pub type ResourceHandler = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Events the tracker reports to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerEvent {
    Connected,
    Disconnected,
    ReconnectFailed,
    ServerError,
    SaveDataUpdated,
    GoldBalloonsUpdated,
    MapUpdated,
}

impl TrackerEvent {
    pub const ALL: [TrackerEvent; 7] = [
        TrackerEvent::Connected,
        TrackerEvent::Disconnected,
        TrackerEvent::ReconnectFailed,
        TrackerEvent::ServerError,
        TrackerEvent::SaveDataUpdated,
        TrackerEvent::GoldBalloonsUpdated,
        TrackerEvent::MapUpdated,
    ];

    /// Name the event is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            TrackerEvent::Connected => "connected",
            TrackerEvent::Disconnected => "disconnected",
            TrackerEvent::ReconnectFailed => "reconnectFailed",
            TrackerEvent::ServerError => "serverError",
            TrackerEvent::SaveDataUpdated => "saveDataUpdated",
            TrackerEvent::GoldBalloonsUpdated => "goldBalloonsUpdated",
            TrackerEvent::MapUpdated => "mapUpdated",
        }
    }

    /// The resource whose updates this event reports, if any.
    pub fn resource(&self) -> Option<Resource> {
        match self {
            TrackerEvent::ServerError => Some(Resource::ServerError),
            TrackerEvent::SaveDataUpdated => Some(Resource::SaveData),
            TrackerEvent::GoldBalloonsUpdated => Some(Resource::GoldBalloons),
            TrackerEvent::MapUpdated => Some(Resource::Map),
            _ => None,
        }
    }
}

impl fmt::Display for TrackerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackerEvent::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| format!("Unknown callback: {s}"))
    }
}

/// A handler bound to the event it serves.
#[derive(Clone)]
pub enum Callback {
    Connected(ConnectedHandler),
    Disconnected(DisconnectedHandler),
    ReconnectFailed(ReconnectFailedHandler),
    ServerError(ResourceHandler),
    SaveDataUpdated(Arc<dyn Fn(&Value) + Send + Sync>),
    GoldBalloonsUpdated(Arc<dyn Fn(&Value) + Send + Sync>),
    MapUpdated(Arc<dyn Fn(&Value) + Send + Sync>),
}

impl Callback {
    pub fn connected(f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Callback::Connected(Arc::new(f))
    }

    pub fn disconnected(f: impl Fn() + Send + Sync + 'static) -> Self {
        Callback::Disconnected(Arc::new(f))
    }

    pub fn reconnect_failed(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Callback::ReconnectFailed(Arc::new(f))
    }

    pub fn server_error(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Callback::ServerError(Arc::new(f))
    }

    pub fn save_data_updated(f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Callback::SaveDataUpdated(Arc::new(f))
    }

    pub fn gold_balloons_updated(f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Callback::GoldBalloonsUpdated(Arc::new(f))
    }

    pub fn map_updated(f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Callback::MapUpdated(Arc::new(f))
    }

    /// The event this handler is registered for.
    pub fn event(&self) -> TrackerEvent {
        match self {
            Callback::Connected(_) => TrackerEvent::Connected,
            Callback::Disconnected(_) => TrackerEvent::Disconnected,
            Callback::ReconnectFailed(_) => TrackerEvent::ReconnectFailed,
            Callback::ServerError(_) => TrackerEvent::ServerError,
            Callback::SaveDataUpdated(_) => TrackerEvent::SaveDataUpdated,
            Callback::GoldBalloonsUpdated(_) => TrackerEvent::GoldBalloonsUpdated,
            Callback::MapUpdated(_) => TrackerEvent::MapUpdated,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&self.event()).finish()
    }
}

/// The set of handlers a tracker dispatches to.
///
/// Cloning is cheap: handlers are reference counted. The polling loop takes a
/// snapshot at the start of each cycle, so replacing a handler never affects a
/// cycle that is already running.
#[derive(Clone, Default)]
pub struct Callbacks {
    connected: Option<ConnectedHandler>,
    disconnected: Option<DisconnectedHandler>,
    reconnect_failed: Option<ReconnectFailedHandler>,
    resources: HashMap<Resource, ResourceHandler>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connected(self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.with(Callback::connected(f))
    }

    pub fn on_disconnected(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.with(Callback::disconnected(f))
    }

    pub fn on_reconnect_failed(self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.with(Callback::reconnect_failed(f))
    }

    pub fn on_server_error(self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.with(Callback::server_error(f))
    }

    pub fn on_save_data_updated(self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.with(Callback::save_data_updated(f))
    }

    pub fn on_gold_balloons_updated(self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.with(Callback::gold_balloons_updated(f))
    }

    pub fn on_map_updated(self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.with(Callback::map_updated(f))
    }

    fn with(mut self, callback: Callback) -> Self {
        self.set(callback);
        self
    }

    /// Install `callback`, replacing any handler already set for its event.
    pub fn set(&mut self, callback: Callback) {
        match callback {
            Callback::Connected(f) => self.connected = Some(f),
            Callback::Disconnected(f) => self.disconnected = Some(f),
            Callback::ReconnectFailed(f) => self.reconnect_failed = Some(f),
            Callback::ServerError(f) => {
                self.resources.insert(Resource::ServerError, f);
            }
            Callback::SaveDataUpdated(f) => {
                self.resources.insert(Resource::SaveData, discard_result(f));
            }
            Callback::GoldBalloonsUpdated(f) => {
                self.resources.insert(Resource::GoldBalloons, discard_result(f));
            }
            Callback::MapUpdated(f) => {
                self.resources.insert(Resource::Map, discard_result(f));
            }
        }
    }

    /// Remove the handler for `event`, leaving the no-op in its place.
    pub fn clear(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Connected => self.connected = None,
            TrackerEvent::Disconnected => self.disconnected = None,
            TrackerEvent::ReconnectFailed => self.reconnect_failed = None,
            _ => {
                if let Some(resource) = event.resource() {
                    self.resources.remove(&resource);
                }
            }
        }
    }

    pub fn is_set(&self, event: TrackerEvent) -> bool {
        match event {
            TrackerEvent::Connected => self.connected.is_some(),
            TrackerEvent::Disconnected => self.disconnected.is_some(),
            TrackerEvent::ReconnectFailed => self.reconnect_failed.is_some(),
            _ => event
                .resource()
                .is_some_and(|resource| self.resources.contains_key(&resource)),
        }
    }

    /// Resources that have a handler, in polling order.
    pub fn subscribed_resources(&self) -> Vec<Resource> {
        Resource::ALL
            .into_iter()
            .filter(|resource| self.resources.contains_key(resource))
            .collect()
    }

    pub(crate) fn connected(&self, first_connection: bool) {
        if let Some(f) = &self.connected {
            f(first_connection);
        }
    }

    pub(crate) fn disconnected(&self) {
        if let Some(f) = &self.disconnected {
            f();
        }
    }

    pub(crate) fn reconnect_failed(&self) -> bool {
        self.reconnect_failed.as_ref().is_some_and(|f| f())
    }

    pub(crate) fn resource_updated(&self, resource: Resource, content: &Value) -> bool {
        self.resources
            .get(&resource)
            .is_some_and(|f| f(content))
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<_> = TrackerEvent::ALL
            .into_iter()
            .filter(|event| self.is_set(*event))
            .map(|event| event.name())
            .collect();
        f.debug_struct("Callbacks").field("set", &set).finish()
    }
}

fn discard_result(f: Arc<dyn Fn(&Value) + Send + Sync>) -> ResourceHandler {
    Arc::new(move |content: &Value| {
        f(content);
        false
    })
}
