//! The running graph of warps the player has taken

use std::collections::BTreeMap;

use dkr_tracker::payload::{self, MapData};
use serde_json::Value;

use crate::error::{MapError, Result};

/// Area code every layout starts from.
pub const ROOT_AREA: &str = "OW";

/// Directed graph of areas, merged from successive `mapUpdated` payloads.
///
/// Merging is additive: edges are never removed, and each area keeps its
/// neighbours in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaGraph {
    nodes: BTreeMap<String, Vec<String>>,
}

impl AreaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `map` into the graph. Returns the number of edges added.
    pub fn merge(&mut self, map: &MapData) -> usize {
        let mut added = 0;
        for (area, neighbours) in map {
            let known = self.nodes.entry(area.clone()).or_default();
            for neighbour in neighbours {
                if !known.contains(neighbour) {
                    known.push(neighbour.clone());
                    added += 1;
                }
            }
        }
        tracing::debug!(added, areas = self.nodes.len(), "Merged map update");
        added
    }

    /// Decode a raw `mapUpdated` payload and merge it.
    pub fn merge_value(&mut self, value: &Value) -> Result<usize> {
        let map: MapData =
            payload::decode(value).map_err(|e| MapError::InvalidPayload(e.to_string()))?;
        Ok(self.merge(&map))
    }

    /// Forget every area and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Areas with at least one recorded warp out of them.
    pub fn areas(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn neighbours(&self, area: &str) -> &[String] {
        self.nodes.get(area).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().flat_map(|(from, neighbours)| {
            neighbours.iter().map(move |to| (from.as_str(), to.as_str()))
        })
    }
}
