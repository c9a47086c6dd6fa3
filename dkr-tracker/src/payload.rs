//! Typed views over the documents the server publishes
//!
//! Callbacks receive raw `serde_json::Value`s; these types let an application
//! decode the ones it understands.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Warps seen so far: area code to the ordered list of areas entered from it.
pub type MapData = BTreeMap<String, Vec<String>>;

/// A single gold balloon pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalloonPickup {
    pub flag: u16,
}

/// Gold balloon pickups grouped by area code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoldBalloons(pub BTreeMap<String, Vec<BalloonPickup>>);

impl GoldBalloons {
    /// Total pickups across all areas.
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn in_area(&self, area: &str) -> &[BalloonPickup] {
        self.0.get(area).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Decode a callback payload into `T`.
pub fn decode<T: DeserializeOwned>(value: &Value) -> serde_json::Result<T> {
    T::deserialize(value)
}
