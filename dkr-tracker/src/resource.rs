//! Remote resources and their change-detection cache

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Serialization every resource starts from before its first fetch.
pub const EMPTY_CONTENT: &str = "{}";

/// A JSON endpoint published by the auto-tracker server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    SaveData,
    GoldBalloons,
    Map,
    ServerError,
}

impl Resource {
    /// Every resource, in the order they are polled.
    pub const ALL: [Resource; 4] = [
        Resource::SaveData,
        Resource::GoldBalloons,
        Resource::Map,
        Resource::ServerError,
    ];

    /// Path segment of the endpoint, e.g. `savedata` for `/savedata`.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::SaveData => "savedata",
            Resource::GoldBalloons => "goldballoons",
            Resource::Map => "map",
            Resource::ServerError => "servererror",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.path() == s)
            .ok_or_else(|| format!("Unknown resource: {s}"))
    }
}

/// Deterministic string form of a JSON value.
///
/// `serde_json::Map` is ordered by key, so two documents that differ only in
/// member order serialize identically.
pub fn canonical(value: &Value) -> String {
    value.to_string()
}

/// Last-seen canonical content for every resource.
#[derive(Debug, Clone)]
pub struct ContentCache {
    last_seen: HashMap<Resource, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        let last_seen = Resource::ALL
            .into_iter()
            .map(|resource| (resource, EMPTY_CONTENT.to_string()))
            .collect();
        Self { last_seen }
    }

    /// Stored serialization for `resource`.
    pub fn last_seen(&self, resource: Resource) -> &str {
        self.last_seen
            .get(&resource)
            .map(String::as_str)
            .unwrap_or(EMPTY_CONTENT)
    }

    /// Store `value` if it differs from what was last seen.
    ///
    /// Returns `true` when the stored content changed. The caller must invoke
    /// the resource's callback in that case.
    pub fn record_if_changed(&mut self, resource: Resource, value: &Value) -> bool {
        let serialized = canonical(value);
        if self.last_seen(resource) == serialized {
            return false;
        }
        self.last_seen.insert(resource, serialized);
        true
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}
