//! Scan result envelope.
//!
//! A stored scan result is whatever JSON the API returned for the scan. This
//! module locates the pieces the overlay needs: detection records, image paths,
//! and the upstream metrics.

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::detect::DetectionSet;
use crate::metrics::ScanMetrics;

/// Keys searched for overlay records, in priority order.
pub const OVERLAY_RECORD_FIELDS: &[&str] = &["overlay_boxes", "detections", "predictions"];
/// Keys counted for the raw detection total, in priority order.
pub const DETECTION_COUNT_FIELDS: &[&str] = &["detections", "predictions"];

pub const SCAN_TYPE_DASHBOARD: &str = "dashboard";
pub const SCAN_TYPE_ESTIMATE_FIELD: &str = "estimate_field";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanType {
    Dashboard,
    EstimateField,
    Other(String),
}

impl ScanType {
    fn from_field(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            None | Some(SCAN_TYPE_DASHBOARD) => ScanType::Dashboard,
            Some(SCAN_TYPE_ESTIMATE_FIELD) => ScanType::EstimateField,
            Some(other) => ScanType::Other(other.to_string()),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ScanType::Dashboard => "Dashboard scan",
            ScanType::EstimateField => "Estimate Field",
            ScanType::Other(name) => name,
        }
    }
}

/// Parsed view of one scan result payload.
#[derive(Clone, Debug)]
pub struct ScanResult {
    pub scan_type: ScanType,
    pub records: Vec<Value>,
    pub detection_count: usize,
    pub annotated_image_url: Option<String>,
    pub original_image_url: Option<String>,
    pub image_url: Option<String>,
    pub metrics: ScanMetrics,
}

impl ScanResult {
    /// Read a scan result. A non-object payload yields an empty result.
    pub fn from_value(value: &Value) -> Self {
        let records = first_array(value, OVERLAY_RECORD_FIELDS)
            .cloned()
            .unwrap_or_default();
        let detection_count = first_array(value, DETECTION_COUNT_FIELDS)
            .map(Vec::len)
            .unwrap_or(0);
        Self {
            scan_type: ScanType::from_field(value.get("scan_type")),
            records,
            detection_count,
            annotated_image_url: string_at(value, "annotated_image_url"),
            original_image_url: string_at(value, "original_image_url"),
            image_url: string_at(value, "image_url"),
            metrics: ScanMetrics::from_result(value),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| anyhow!("parse error: {}", e))?;
        Ok(Self::from_value(&value))
    }

    /// Parse the overlay records into the unfiltered detection set.
    pub fn detection_set(&self) -> DetectionSet {
        DetectionSet::from_records(&self.records)
    }

    /// Image to show: annotated when boxes are on, original otherwise, each
    /// falling back to the other and then to the plain scan image.
    pub fn display_image_path(&self, show_boxes: bool) -> Option<&str> {
        let (first, second) = if show_boxes {
            (&self.annotated_image_url, &self.original_image_url)
        } else {
            (&self.original_image_url, &self.annotated_image_url)
        };
        first
            .as_deref()
            .or(second.as_deref())
            .or(self.image_url.as_deref())
    }
}

fn first_array<'a>(value: &'a Value, fields: &[&str]) -> Option<&'a Vec<Value>> {
    fields
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_array))
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
