//! Detection record parsing.
//!
//! Upstream inference payloads are loosely typed: the label may live under any
//! of several keys, confidence may be a number or a numeric string, and
//! geometry comes either as a normalized polygon or as four box corners.
//! Each variable field is read through an ordered list of candidate keys; the
//! first candidate that yields a value wins.

use serde_json::{Map, Value};

use super::classify::classify;
use super::result::{Confidence, Detection, Geometry, Point};

/// Label keys in priority order.
pub const LABEL_FIELDS: &[&str] = &["class", "class_name", "label", "name"];
/// Confidence keys in priority order.
pub const CONFIDENCE_FIELDS: &[&str] = &["confidence"];
/// Normalized polygon key: an array of `[x, y]` pairs in [0,1].
pub const POLYGON_FIELD: &str = "polygon_normalized";
/// Normalized box corner keys.
pub const BOX_FIELDS: [&str; 4] = ["x1", "y1", "x2", "y2"];

const MIN_POLYGON_POINTS: usize = 3;

/// Why a raw record did not become a [`Detection`].
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    NotAnObject,
    MissingGeometry,
    TooFewPoints(usize),
    PointOutOfRange,
    InvalidBoxCoordinate(&'static str),
    BoxOutOfRange,
    DegenerateBox,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NotAnObject => write!(f, "record is not an object"),
            RejectReason::MissingGeometry => write!(f, "no polygon or box geometry"),
            RejectReason::TooFewPoints(n) => {
                write!(f, "polygon has {} usable points, need {}", n, MIN_POLYGON_POINTS)
            }
            RejectReason::PointOutOfRange => write!(f, "polygon point outside unit square"),
            RejectReason::InvalidBoxCoordinate(field) => {
                write!(f, "box coordinate '{}' is not a finite number", field)
            }
            RejectReason::BoxOutOfRange => write!(f, "box corner outside unit square"),
            RejectReason::DegenerateBox => write!(f, "box has non-positive width or height"),
        }
    }
}

/// Parse one raw record into a [`Detection`].
///
/// `id` is the record's 1-based position in its source array. Malformed
/// records are rejected with a reason; nothing here panics.
pub fn parse_record(id: usize, raw: &Value) -> Result<Detection, RejectReason> {
    let record = raw.as_object().ok_or(RejectReason::NotAnObject)?;
    let geometry = parse_geometry(record)?;
    let label = first_match(record, LABEL_FIELDS, label_text)
        .unwrap_or_default()
        .to_lowercase();
    let confidence = first_match(record, CONFIDENCE_FIELDS, coerce_f64)
        .map(Confidence::Known)
        .unwrap_or(Confidence::Unknown);
    let kind = classify(&label);
    Ok(Detection {
        id,
        label,
        confidence,
        geometry,
        kind,
    })
}

/// Try `fields` in order and return the first value `extract` accepts.
fn first_match<T>(
    record: &Map<String, Value>,
    fields: &[&str],
    extract: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    fields
        .iter()
        .filter_map(|field| record.get(*field))
        .find_map(extract)
}

fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerce a JSON number or numeric string to a finite `f64`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn parse_geometry(record: &Map<String, Value>) -> Result<Geometry, RejectReason> {
    // The polygon encoding wins when both are present.
    if let Some(Value::Array(points)) = record.get(POLYGON_FIELD) {
        return parse_polygon(points);
    }
    if BOX_FIELDS.iter().all(|field| record.contains_key(*field)) {
        return parse_box(record);
    }
    Err(RejectReason::MissingGeometry)
}

fn parse_polygon(raw_points: &[Value]) -> Result<Geometry, RejectReason> {
    let points: Vec<Point> = raw_points.iter().filter_map(parse_point).collect();
    if points.len() < MIN_POLYGON_POINTS {
        return Err(RejectReason::TooFewPoints(points.len()));
    }
    if !points.iter().all(|p| in_unit(p.x) && in_unit(p.y)) {
        return Err(RejectReason::PointOutOfRange);
    }
    Ok(Geometry::Polygon { points })
}

/// A usable vertex is a two-element array of finite numbers or numeric strings.
fn parse_point(raw: &Value) -> Option<Point> {
    match raw.as_array()?.as_slice() {
        [x, y] => Some(Point::new(coerce_f64(x)?, coerce_f64(y)?)),
        _ => None,
    }
}

fn parse_box(record: &Map<String, Value>) -> Result<Geometry, RejectReason> {
    let mut corners = [0.0f64; 4];
    for (slot, field) in corners.iter_mut().zip(BOX_FIELDS) {
        *slot = record
            .get(field)
            .and_then(coerce_f64)
            .ok_or(RejectReason::InvalidBoxCoordinate(field))?;
    }
    let [x1, y1, x2, y2] = corners;
    if !corners.iter().all(|v| in_unit(*v)) {
        return Err(RejectReason::BoxOutOfRange);
    }
    if x2 <= x1 || y2 <= y1 {
        return Err(RejectReason::DegenerateBox);
    }
    Ok(Geometry::Box { x1, y1, x2, y2 })
}

fn in_unit(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}
