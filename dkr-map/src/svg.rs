//! SVG rendering of a [`Layout`]

use std::fmt::Write;

use crate::layout::Layout;

const NODE_FILL: &str = "black";
const LABEL_FILL: &str = "white";
const ARROW_STROKE: &str = "red";

/// Render `layout` as a standalone SVG document.
///
/// Areas are drawn as filled circles with centred labels, warps as arrows
/// between circle edges.
pub fn render_svg(layout: &Layout) -> String {
    let mut svg = String::new();
    // Writing to a String cannot fail.
    let _ = write_svg(&mut svg, layout);
    svg
}

fn write_svg(out: &mut String, layout: &Layout) -> std::fmt::Result {
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = layout.width,
        h = layout.height
    )?;

    for node in &layout.nodes {
        let size = f64::from(node.text_size);
        writeln!(
            out,
            r#"  <circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"#,
            node.x, node.y, node.r, NODE_FILL
        )?;
        writeln!(
            out,
            r#"  <text x="{:.2}" y="{:.2}" font-family="Arial" font-size="{}" text-anchor="middle" fill="{}">{}</text>"#,
            node.x,
            node.y + size / (2.0 * std::f64::consts::SQRT_2),
            node.text_size,
            LABEL_FILL,
            escape(&node.name)
        )?;
    }

    for arrow in &layout.arrows {
        let [left, right] = arrow.head;
        writeln!(
            out,
            r#"  <path d="M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} M {:.2} {:.2} L {:.2} {:.2}" stroke="{}" fill="none"/>"#,
            arrow.start.0,
            arrow.start.1,
            arrow.end.0,
            arrow.end.1,
            left.0,
            left.1,
            arrow.end.0,
            arrow.end.1,
            right.0,
            right.1,
            ARROW_STROKE
        )?;
    }

    writeln!(out, "</svg>")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
