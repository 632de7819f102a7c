//! Summary numbers for display.
//!
//! [`summarize`] counts what the overlay currently shows; it is only ever fed
//! the visible set. [`ScanMetrics`] carries the upstream figures that are
//! displayed verbatim and never recomputed here.

use serde::Serialize;
use serde_json::Value;

use crate::detect::{Detection, DetectionKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub healthy: usize,
    pub irregular: usize,
    pub disease: usize,
}

impl KindCounts {
    pub fn get(&self, kind: DetectionKind) -> usize {
        match kind {
            DetectionKind::Healthy => self.healthy,
            DetectionKind::Irregular => self.irregular,
            DetectionKind::Disease => self.disease,
        }
    }

    fn bump(&mut self, kind: DetectionKind) {
        match kind {
            DetectionKind::Healthy => self.healthy += 1,
            DetectionKind::Irregular => self.irregular += 1,
            DetectionKind::Disease => self.disease += 1,
        }
    }
}

/// Counts over the visible detections.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub by_kind: KindCounts,
    /// `(substring, count)` per requested label substring, in request order.
    pub matches: Vec<(String, usize)>,
}

impl Summary {
    /// Count for a requested substring, if it was requested.
    pub fn matching(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_lowercase();
        self.matches
            .iter()
            .find(|(n, _)| *n == needle)
            .map(|(_, count)| *count)
    }
}

/// Summarize visible detections, counting each substring in `count_labels`.
pub fn summarize<S: AsRef<str>>(visible: &[&Detection], count_labels: &[S]) -> Summary {
    let mut by_kind = KindCounts::default();
    for det in visible {
        by_kind.bump(det.kind);
    }
    let matches = count_labels
        .iter()
        .map(|needle| {
            let needle = needle.as_ref().to_lowercase();
            let count = count_matching(visible, &needle);
            (needle, count)
        })
        .collect();
    Summary {
        total: visible.len(),
        by_kind,
        matches,
    }
}

/// Number of visible detections whose label contains `needle`.
pub fn count_matching(visible: &[&Detection], needle: &str) -> usize {
    let needle = needle.to_lowercase();
    visible.iter().filter(|d| d.label.contains(&needle)).count()
}

/// Ground footprint reported for a scan.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FieldArea {
    pub altitude_m: Option<f64>,
    pub area_m2: Option<f64>,
    pub area_hectares: Option<f64>,
    pub area_acres: Option<f64>,
}

/// Upstream agronomic figures, type-checked but otherwise trusted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScanMetrics {
    pub field_health_percent: Option<f64>,
    pub overall_yield_index: Option<f64>,
    pub kernel_development_score: Option<f64>,
    pub discoloration_index: Option<f64>,
    pub leaf_dryness_index: Option<f64>,
    pub yield_summary: Option<String>,
    pub field_area: Option<FieldArea>,
}

impl ScanMetrics {
    /// Read metrics from a scan result object. Wrongly typed fields are `None`.
    pub fn from_result(result: &Value) -> Self {
        let health = result.get("field_health");
        let yield_estimate = result.get("yield_estimate");
        let field_area = result
            .get("field_area")
            .filter(|v| v.is_object())
            .map(|area| FieldArea {
                altitude_m: number_at(Some(area), "altitude_m"),
                area_m2: number_at(Some(area), "area_m2"),
                area_hectares: number_at(Some(area), "area_hectares"),
                area_acres: number_at(Some(area), "area_acres"),
            });
        Self {
            field_health_percent: number_at(health, "field_health_percent"),
            overall_yield_index: number_at(yield_estimate, "overall_yield_index"),
            kernel_development_score: number_at(yield_estimate, "kernel_development_score"),
            discoloration_index: number_at(yield_estimate, "discoloration_index"),
            leaf_dryness_index: number_at(yield_estimate, "leaf_dryness_index"),
            yield_summary: yield_estimate
                .and_then(|y| y.get("summary"))
                .and_then(Value::as_str)
                .map(str::to_string),
            field_area,
        }
    }

    /// Index bars are shown only alongside detections and at least one index.
    pub fn has_index_bars(&self, detection_count: usize) -> bool {
        detection_count > 0
            && (self.kernel_development_score.is_some()
                || self.discoloration_index.is_some()
                || self.leaf_dryness_index.is_some())
    }
}

fn number_at(parent: Option<&Value>, key: &str) -> Option<f64> {
    parent?.get(key)?.as_f64()
}
