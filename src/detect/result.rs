use serde::Serialize;

/// One classified region of interest from an inference result.
///
/// Built only by [`crate::detect::parse_record`]; every value that exists has
/// passed structural validation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    /// 1-based position in the unfiltered source array.
    pub id: usize,
    /// Lower-cased class label, possibly empty.
    pub label: String,
    pub confidence: Confidence,
    pub geometry: Geometry,
    pub kind: DetectionKind,
}

/// Detection confidence as reported upstream.
///
/// `Unknown` is a distinct state, not zero: filtering never hides it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Confidence {
    Known(f64),
    Unknown,
}

impl Confidence {
    pub fn value(self) -> Option<f64> {
        match self {
            Confidence::Known(c) => Some(c),
            Confidence::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Confidence::Known(_))
    }
}

/// A point in unit-square coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Detection geometry, already normalized to [0,1].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// At least three vertices.
    Polygon { points: Vec<Point> },
    /// Corner box with `x2 > x1` and `y2 > y1`.
    Box { x1: f64, y1: f64, x2: f64, y2: f64 },
}

/// Semantic category of a detection. Drives overlay styling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Healthy,
    Irregular,
    Disease,
}

impl DetectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionKind::Healthy => "healthy",
            DetectionKind::Irregular => "irregular",
            DetectionKind::Disease => "disease",
        }
    }
}

impl std::fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
