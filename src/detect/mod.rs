//! Detection normalization pipeline.
//!
//! Raw inference records are parsed into [`Detection`] values, classified by
//! label, and filtered by a user-adjustable confidence threshold. Every step is
//! a total function: malformed input is excluded from the output, never
//! reported as an error.

mod classify;
mod filter;
mod parse;
mod result;

pub use classify::classify;
pub use filter::{filter_hidden, filter_visible, ConfidenceThreshold, MAX_THRESHOLD};
pub use parse::{
    coerce_f64, parse_record, RejectReason, BOX_FIELDS, CONFIDENCE_FIELDS, LABEL_FIELDS,
    POLYGON_FIELD,
};
pub use result::{Confidence, Detection, DetectionKind, Geometry, Point};

use serde_json::Value;

/// The unfiltered detections of one payload.
///
/// Built once per payload and discarded on the next; threshold changes filter
/// this set again rather than mutating it.
#[derive(Clone, Debug, Default)]
pub struct DetectionSet {
    detections: Vec<Detection>,
    dropped: usize,
}

impl DetectionSet {
    /// Parse every record, dropping the ones that fail validation.
    pub fn from_records(records: &[Value]) -> Self {
        let mut detections = Vec::with_capacity(records.len());
        let mut dropped = 0;
        for (index, raw) in records.iter().enumerate() {
            match parse_record(index + 1, raw) {
                Ok(det) => detections.push(det),
                Err(reason) => {
                    log::debug!("dropping detection record {}: {}", index + 1, reason);
                    dropped += 1;
                }
            }
        }
        Self {
            detections,
            dropped,
        }
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Number of records rejected during parsing.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn visible(&self, threshold: ConfidenceThreshold) -> Vec<&Detection> {
        filter_visible(&self.detections, threshold)
    }
}
