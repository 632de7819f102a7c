//! SVG export of an overlay frame.
//!
//! The document uses a `0 0 1 1` viewBox with `preserveAspectRatio="none"`,
//! so unit-square shapes land on the image's actual pixel box whatever its
//! aspect ratio.

use std::fmt::Write;

use super::{OverlayFrame, OverlayShape, ShapePrimitive};
use crate::detect::DetectionKind;

struct KindStyle {
    stroke: &'static str,
    fill: &'static str,
}

fn style_for(kind: DetectionKind) -> KindStyle {
    match kind {
        DetectionKind::Healthy => KindStyle {
            stroke: "#1a9334",
            fill: "rgba(72,249,10,0.25)",
        },
        DetectionKind::Irregular => KindStyle {
            stroke: "#ffb21d",
            fill: "rgba(255,178,29,0.25)",
        },
        DetectionKind::Disease => KindStyle {
            stroke: "#ff3838",
            fill: "rgba(255,56,56,0.25)",
        },
    }
}

/// Render `frame` as a standalone SVG sized `width` x `height` pixels.
pub fn render_svg(frame: &OverlayFrame, width: u32, height: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 1 1" preserveAspectRatio="none">"#,
        width, height
    );
    for shape in &frame.shapes {
        write_shape(&mut out, shape);
    }
    out.push_str("</svg>\n");
    out
}

fn write_shape(out: &mut String, shape: &OverlayShape) {
    let style = style_for(shape.kind);
    let common = format!(
        r#"stroke="{}" fill="{}" stroke-width="2" vector-effect="non-scaling-stroke" data-kind="{}""#,
        style.stroke, style.fill, shape.kind
    );
    let title = escape(&shape_title(shape));
    match &shape.primitive {
        ShapePrimitive::Polygon { points } => {
            let pts: Vec<String> = points.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
            let _ = writeln!(
                out,
                r#"  <polygon points="{}" {}><title>{}</title></polygon>"#,
                pts.join(" "),
                common,
                title
            );
        }
        ShapePrimitive::Rect {
            x,
            y,
            width,
            height,
        } => {
            let _ = writeln!(
                out,
                r#"  <rect x="{}" y="{}" width="{}" height="{}" {}><title>{}</title></rect>"#,
                x, y, width, height, common, title
            );
        }
    }
}

fn shape_title(shape: &OverlayShape) -> String {
    let label = if shape.label.is_empty() {
        shape.kind.as_str()
    } else {
        shape.label.as_str()
    };
    match shape.confidence {
        Some(c) => format!("{} {:.0}%", label, c * 100.0),
        None => label.to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
