//! Recursive circular layout of the area graph
//!
//! The root area sits at the canvas centre. Each area's unplaced neighbours
//! are spread evenly on a circle around it; every level down shrinks the
//! text and the circle and rotates the starting angle. Areas already placed
//! elsewhere in the walk keep their first position.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::graph::{AreaGraph, ROOT_AREA};

/// Length of an arrow head in pixels.
pub const ARROW_HEAD_LENGTH: f64 = 10.0;

/// Width of one monospace glyph relative to the font size.
const GLYPH_WIDTH: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub width: f64,
    pub height: f64,
    pub root: String,
    /// Font size of the root label
    pub text_size: u32,
    /// Distance from the root to its neighbours
    pub radius: u32,
    /// Rotation added to the starting angle at each level, in radians
    pub angle_step: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
            root: ROOT_AREA.to_string(),
            text_size: 24,
            radius: 120,
            angle_step: 15.0,
        }
    }
}

impl LayoutOptions {
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// An area drawn as a labelled circle.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Circle radius
    pub r: f64,
    pub text_size: u32,
}

/// A warp drawn from the edge of one circle to the edge of another.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub from: String,
    pub to: String,
    pub start: (f64, f64),
    pub end: (f64, f64),
    /// Ends of the two strokes forming the head at `end`
    pub head: [(f64, f64); 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PlacedNode>,
    pub arrows: Vec<Arrow>,
}

impl Layout {
    pub fn node(&self, name: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Lay out every area reachable from `options.root`.
///
/// Edges touching an area that is not reachable from the root are left out.
pub fn layout(graph: &AreaGraph, options: &LayoutOptions) -> Layout {
    let mut walk = Walk {
        graph,
        angle_step: options.angle_step,
        placed: Vec::new(),
        index: HashMap::new(),
        visited: Vec::new(),
    };
    walk.place(
        &options.root,
        options.width / 2.0,
        options.height / 2.0,
        options.text_size,
        options.radius,
        0.0,
    );

    let arrows = graph
        .edges()
        .filter_map(|(from, to)| {
            let from_node = &walk.placed[*walk.index.get(from)?];
            let to_node = &walk.placed[*walk.index.get(to)?];
            Some(arrow_between(from_node, to_node))
        })
        .collect();

    Layout {
        width: options.width,
        height: options.height,
        nodes: walk.placed,
        arrows,
    }
}

struct Walk<'a> {
    graph: &'a AreaGraph,
    angle_step: f64,
    placed: Vec<PlacedNode>,
    index: HashMap<String, usize>,
    visited: Vec<String>,
}

impl Walk<'_> {
    fn place(&mut self, name: &str, x: f64, y: f64, text_size: u32, radius: u32, angle: f64) {
        if self.visited.iter().any(|done| done == name) {
            return;
        }
        self.visited.push(name.to_string());

        let pending: Vec<String> = self
            .graph
            .neighbours(name)
            .iter()
            .filter(|neighbour| !self.visited.contains(*neighbour))
            .cloned()
            .collect();

        let positions = circular_positions(x, y, f64::from(radius), angle, pending.len());
        for (child, (cx, cy)) in pending.iter().zip(positions) {
            self.place(
                child,
                cx,
                cy,
                scale(text_size, 0.75),
                scale(radius, 0.5),
                angle + self.angle_step,
            );
        }

        self.index.insert(name.to_string(), self.placed.len());
        self.placed.push(PlacedNode {
            name: name.to_string(),
            x,
            y,
            r: node_radius(name, text_size),
            text_size,
        });
    }
}

fn scale(value: u32, factor: f64) -> u32 {
    (f64::from(value) * factor).trunc() as u32
}

/// `count` points evenly spaced on a circle, the first at `angle`.
fn circular_positions(cx: f64, cy: f64, radius: f64, angle: f64, count: usize) -> Vec<(f64, f64)> {
    let step = 2.0 * PI / count as f64;
    (0..count)
        .map(|i| {
            let a = angle + step * i as f64;
            (cx + radius * a.cos(), cy + radius * a.sin())
        })
        .collect()
}

/// Circle radius that fits `label` at `text_size` with half a glyph of
/// padding on each side.
pub fn node_radius(label: &str, text_size: u32) -> f64 {
    let size = f64::from(text_size);
    let text_width = GLYPH_WIDTH * size * label.chars().count() as f64;
    (text_width + size) / 2.0
}

fn arrow_between(from: &PlacedNode, to: &PlacedNode) -> Arrow {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let start = (from.x + angle.cos() * from.r, from.y + angle.sin() * from.r);
    let end = (to.x - angle.cos() * to.r, to.y - angle.sin() * to.r);

    let shaft = (end.1 - start.1).atan2(end.0 - start.0);
    let head = [
        (
            end.0 - ARROW_HEAD_LENGTH * (shaft - PI / 6.0).cos(),
            end.1 - ARROW_HEAD_LENGTH * (shaft - PI / 6.0).sin(),
        ),
        (
            end.0 - ARROW_HEAD_LENGTH * (shaft + PI / 6.0).cos(),
            end.1 - ARROW_HEAD_LENGTH * (shaft + PI / 6.0).sin(),
        ),
    ];

    Arrow {
        from: from.name.clone(),
        to: to.name.clone(),
        start,
        end,
        head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dkr_tracker::payload::{decode, MapData};
    use serde_json::json;

    const EPSILON: f64 = 1e-9;

    fn graph(value: serde_json::Value) -> AreaGraph {
        let map: MapData = decode(&value).unwrap();
        let mut graph = AreaGraph::new();
        graph.merge(&map);
        graph
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_empty_graph_places_root_only() {
        let layout = layout(&AreaGraph::new(), &LayoutOptions::default());

        assert_eq!(layout.nodes.len(), 1);
        let root = layout.node("OW").unwrap();
        assert!(close(root.x, 250.0) && close(root.y, 250.0));
        assert_eq!(root.text_size, 24);
        assert!(layout.arrows.is_empty());
    }

    #[test]
    fn test_custom_canvas_size_moves_root() {
        let options = LayoutOptions::default().with_size(800.0, 600.0);
        let layout = layout(&graph(json!({"OW": ["DD"]})), &options);

        assert!(close(layout.width, 800.0) && close(layout.height, 600.0));
        let root = layout.node("OW").unwrap();
        assert!(close(root.x, 400.0) && close(root.y, 300.0));
        let dd = layout.node("DD").unwrap();
        assert!(close(dd.x, 520.0) && close(dd.y, 300.0));
    }

    #[test]
    fn test_node_radius() {
        // Two glyphs at 24px: (28.8 + 24) / 2
        assert!(close(node_radius("OW", 24), 26.4));
        assert!(close(node_radius("", 10), 5.0));
    }

    #[test]
    fn test_children_shrink_and_rotate() {
        let layout = layout(
            &graph(json!({"OW": ["DD"], "DD": ["BL1"]})),
            &LayoutOptions::default(),
        );

        let dd = layout.node("DD").unwrap();
        assert!(close(dd.x, 370.0) && close(dd.y, 250.0));
        assert_eq!(dd.text_size, 18);

        let bl1 = layout.node("BL1").unwrap();
        assert!(close(bl1.x, 370.0 + 60.0 * 15f64.cos()));
        assert!(close(bl1.y, 250.0 + 60.0 * 15f64.sin()));
        assert_eq!(bl1.text_size, 13);
    }

    #[test]
    fn test_siblings_spread_evenly() {
        let layout = layout(&graph(json!({"OW": ["DD", "SI"]})), &LayoutOptions::default());

        let dd = layout.node("DD").unwrap();
        let si = layout.node("SI").unwrap();
        assert!(close(dd.x, 370.0));
        assert!(close(si.x, 130.0));
        assert!(close(si.y, 250.0));
    }

    #[test]
    fn test_cycles_place_each_area_once() {
        let layout = layout(
            &graph(json!({"OW": ["DD", "SI"], "DD": ["OW", "SI"], "SI": ["OW"]})),
            &LayoutOptions::default(),
        );

        assert_eq!(layout.nodes.len(), 3);
        assert_eq!(layout.arrows.len(), 5);
        // Parents are recorded after their children.
        assert_eq!(layout.nodes.last().unwrap().name, "OW");
    }

    #[test]
    fn test_unreachable_areas_are_skipped() {
        let layout = layout(
            &graph(json!({"OW": ["DD"], "FC": ["PL"]})),
            &LayoutOptions::default(),
        );

        assert!(layout.node("FC").is_none());
        assert!(layout.node("PL").is_none());
        assert_eq!(layout.arrows.len(), 1);
    }

    #[test]
    fn test_arrow_touches_circle_edges() {
        let layout = layout(&graph(json!({"OW": ["DD"]})), &LayoutOptions::default());
        let arrow = &layout.arrows[0];
        let ow = layout.node("OW").unwrap();
        let dd = layout.node("DD").unwrap();

        assert!(close(arrow.start.0, ow.x + ow.r));
        assert!(close(arrow.end.0, dd.x - dd.r));
        assert!(close(arrow.start.1, 250.0) && close(arrow.end.1, 250.0));
        for (hx, _) in arrow.head {
            assert!(hx < arrow.end.0);
        }
    }
}
