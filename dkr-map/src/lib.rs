//! # dkr-map
//!
//! Keeps a running graph of the warps a player has taken and lays it out for
//! drawing.
//!
//! Feed every `mapUpdated` payload from the tracker into
//! [`AreaGraph::merge_value`], then call [`layout`] and [`render_svg`] to
//! redraw:
//!
//! ```
//! use dkr_map::{layout, render_svg, AreaGraph, LayoutOptions};
//! use serde_json::json;
//!
//! let mut graph = AreaGraph::new();
//! graph.merge_value(&json!({"OW": ["DD"]})).unwrap();
//!
//! let svg = render_svg(&layout(&graph, &LayoutOptions::default()));
//! assert!(svg.contains(">DD</text>"));
//! ```

mod error;
mod graph;
mod layout;
mod svg;

pub use error::*;
pub use graph::*;
pub use layout::*;
pub use svg::*;
