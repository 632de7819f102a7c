//! Geometry projection for overlay rendering.
//!
//! Shapes are emitted in unit-square coordinates. The renderer stretches the
//! unit square over the displayed image's pixel box; no scaling happens here.

pub mod svg;

use serde::Serialize;

use crate::detect::{ConfidenceThreshold, Detection, DetectionKind, DetectionSet, Geometry, Point};
use crate::metrics::{summarize, Summary};

/// Render-ready derivative of a [`Detection`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayShape {
    pub id: usize,
    pub label: String,
    pub kind: DetectionKind,
    pub confidence: Option<f64>,
    pub primitive: ShapePrimitive,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapePrimitive {
    Polygon { points: Vec<Point> },
    Rect { x: f64, y: f64, width: f64, height: f64 },
}

impl ShapePrimitive {
    /// Outline vertices; a rect yields its four corners clockwise from top-left.
    pub fn vertices(&self) -> Vec<Point> {
        match self {
            ShapePrimitive::Polygon { points } => points.clone(),
            ShapePrimitive::Rect {
                x,
                y,
                width,
                height,
            } => vec![
                Point::new(*x, *y),
                Point::new(x + width, *y),
                Point::new(x + width, y + height),
                Point::new(*x, y + height),
            ],
        }
    }
}

/// Project one detection into overlay space.
///
/// Polygons pass through unchanged. Boxes become rects with
/// `width = x2 - x1` and `height = y2 - y1`. No clamping happens; parsing has
/// already guaranteed finite, normalized input.
pub fn project(detection: &Detection) -> OverlayShape {
    let primitive = match &detection.geometry {
        Geometry::Polygon { points } => ShapePrimitive::Polygon {
            points: points.clone(),
        },
        Geometry::Box { x1, y1, x2, y2 } => ShapePrimitive::Rect {
            x: *x1,
            y: *y1,
            width: x2 - x1,
            height: y2 - y1,
        },
    };
    OverlayShape {
        id: detection.id,
        label: detection.label.clone(),
        kind: detection.kind,
        confidence: detection.confidence.value(),
        primitive,
    }
}

/// One render pass: visible shapes plus the numbers shown beside them.
#[derive(Clone, Debug, Serialize)]
pub struct OverlayFrame {
    pub threshold: ConfidenceThreshold,
    pub shapes: Vec<OverlayShape>,
    pub summary: Summary,
    /// Parsed detections hidden by the threshold.
    pub hidden: usize,
    /// Raw records rejected by the parser.
    pub dropped: usize,
}

impl OverlayFrame {
    /// Filter `set` at `threshold`, project what remains, and summarize it.
    ///
    /// `count_labels` are the domain substrings counted in the summary.
    pub fn build<S: AsRef<str>>(
        set: &DetectionSet,
        threshold: ConfidenceThreshold,
        count_labels: &[S],
    ) -> Self {
        let visible = set.visible(threshold);
        let shapes = visible.iter().copied().map(project).collect();
        let summary = summarize(&visible, count_labels);
        Self {
            threshold,
            hidden: set.len() - visible.len(),
            dropped: set.dropped(),
            shapes,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Confidence;

    fn det(geometry: Geometry) -> Detection {
        Detection {
            id: 7,
            label: "irregular patch".to_string(),
            confidence: Confidence::Known(0.4),
            geometry,
            kind: DetectionKind::Irregular,
        }
    }

    #[test]
    fn polygon_passes_through() {
        let points = vec![Point::new(0.1, 0.2), Point::new(0.5, 0.2), Point::new(0.3, 0.8)];
        let shape = project(&det(Geometry::Polygon {
            points: points.clone(),
        }));
        assert_eq!(shape.primitive, ShapePrimitive::Polygon { points });
        assert_eq!(shape.kind, DetectionKind::Irregular);
        assert_eq!(shape.confidence, Some(0.4));
        assert_eq!(shape.id, 7);
    }

    #[test]
    fn box_becomes_rect() {
        let shape = project(&det(Geometry::Box {
            x1: 0.25,
            y1: 0.5,
            x2: 0.75,
            y2: 1.0,
        }));
        assert_eq!(
            shape.primitive,
            ShapePrimitive::Rect {
                x: 0.25,
                y: 0.5,
                width: 0.5,
                height: 0.5
            }
        );
    }

    #[test]
    fn rect_vertices_are_corners() {
        let rect = ShapePrimitive::Rect {
            x: 0.0,
            y: 0.0,
            width: 0.5,
            height: 0.25,
        };
        assert_eq!(
            rect.vertices(),
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.5, 0.0),
                Point::new(0.5, 0.25),
                Point::new(0.0, 0.25),
            ]
        );
    }

    #[test]
    fn unknown_confidence_projects_to_none() {
        let mut d = det(Geometry::Box {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        });
        d.confidence = Confidence::Unknown;
        assert_eq!(project(&d).confidence, None);
    }
}
