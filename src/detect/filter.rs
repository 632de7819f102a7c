use serde::Serialize;

use super::result::Detection;

/// Maximum threshold, in percent.
pub const MAX_THRESHOLD: u8 = 100;

/// User-adjustable confidence cutoff in whole percent, 0..=100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConfidenceThreshold(u8);

impl ConfidenceThreshold {
    /// Build a threshold, clamping anything above 100.
    pub fn new(percent: u8) -> Self {
        Self(percent.min(MAX_THRESHOLD))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Whether a detection stays visible under this threshold.
    ///
    /// Detections with unknown confidence are always visible.
    pub fn admits(self, detection: &Detection) -> bool {
        match detection.confidence.value() {
            Some(c) => c >= f64::from(self.0) / 100.0,
            None => true,
        }
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(50)
    }
}

/// Visible subset of `detections` at `threshold`, in source order.
///
/// Pure: the input is never modified, so changing the threshold is a plain
/// recomputation over the full set.
pub fn filter_visible(detections: &[Detection], threshold: ConfidenceThreshold) -> Vec<&Detection> {
    detections.iter().filter(|d| threshold.admits(d)).collect()
}

/// Detections hidden at `threshold`, in source order.
pub fn filter_hidden(detections: &[Detection], threshold: ConfidenceThreshold) -> Vec<&Detection> {
    detections.iter().filter(|d| !threshold.admits(d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Confidence, DetectionKind, Geometry};

    fn det(id: usize, confidence: Confidence) -> Detection {
        Detection {
            id,
            label: "blight".to_string(),
            confidence,
            geometry: Geometry::Box {
                x1: 0.1,
                y1: 0.1,
                x2: 0.2,
                y2: 0.2,
            },
            kind: DetectionKind::Disease,
        }
    }

    fn ids(dets: &[&Detection]) -> Vec<usize> {
        dets.iter().map(|d| d.id).collect()
    }

    #[test]
    fn threshold_clamps_to_hundred() {
        assert_eq!(ConfidenceThreshold::new(250).percent(), 100);
        assert_eq!(ConfidenceThreshold::new(0).percent(), 0);
    }

    #[test]
    fn boundary_is_inclusive() {
        let dets = vec![det(1, Confidence::Known(0.5)), det(2, Confidence::Known(0.49))];
        let visible = filter_visible(&dets, ConfidenceThreshold::new(50));
        assert_eq!(ids(&visible), vec![1]);
    }

    #[test]
    fn two_decimal_confidence_visible_at_own_percent() {
        for pct in 0..=100u8 {
            let c: f64 = format!("{:.2}", f64::from(pct) / 100.0).parse().unwrap();
            let dets = vec![det(1, Confidence::Known(c))];
            assert_eq!(
                filter_visible(&dets, ConfidenceThreshold::new(pct)).len(),
                1,
                "confidence {} hidden at threshold {}",
                c,
                pct
            );
            if pct < 100 {
                assert!(filter_visible(&dets, ConfidenceThreshold::new(pct + 1)).is_empty());
            }
        }
    }

    #[test]
    fn unknown_confidence_always_visible() {
        let dets = vec![det(1, Confidence::Unknown)];
        for t in [0, 50, 100] {
            assert_eq!(filter_visible(&dets, ConfidenceThreshold::new(t)).len(), 1);
        }
    }

    #[test]
    fn preserves_order_and_partitions() {
        let dets = vec![
            det(1, Confidence::Known(0.9)),
            det(2, Confidence::Known(0.1)),
            det(3, Confidence::Unknown),
            det(4, Confidence::Known(0.7)),
        ];
        let t = ConfidenceThreshold::new(60);
        assert_eq!(ids(&filter_visible(&dets, t)), vec![1, 3, 4]);
        assert_eq!(ids(&filter_hidden(&dets, t)), vec![2]);
    }

    #[test]
    fn zero_threshold_shows_everything() {
        let dets = vec![det(1, Confidence::Known(0.0)), det(2, Confidence::Known(0.3))];
        assert_eq!(filter_visible(&dets, ConfidenceThreshold::new(0)).len(), 2);
    }
}
