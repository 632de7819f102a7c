use super::result::DetectionKind;

/// Substrings that mark a label as a disease finding.
const DISEASE_KEYWORDS: &[&str] = &[
    "disease", "blight", "rust", "rot", "wilt", "mold", "pest", "infect",
];

/// Map a class label to a detection kind.
///
/// Rules are checked in order and the first match wins:
/// 1. contains "healthy"
/// 2. contains "irregular"
/// 3. contains any disease keyword
/// 4. anything else is treated as disease
///
/// A label carrying both "healthy" and a disease keyword resolves to healthy.
pub fn classify(label: &str) -> DetectionKind {
    let label = label.to_lowercase();
    if label.contains("healthy") {
        return DetectionKind::Healthy;
    }
    if label.contains("irregular") {
        return DetectionKind::Irregular;
    }
    if DISEASE_KEYWORDS.iter().any(|kw| label.contains(kw)) {
        return DetectionKind::Disease;
    }
    // No positive signal is not evidence of safety.
    DetectionKind::Disease
}
