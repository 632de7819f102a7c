//! Agriscan overlay core
//!
//! Client-side layer between crop-scan inference results and their display.
//!
//! # Architecture
//!
//! Raw detection payload → parser → classifier → confidence filter →
//! projector → overlay shapes and summary counts. Independently, protected
//! scan images are fetched with a bearer token into revocable in-memory
//! handles owned by viewer scopes.
//!
//! The pipeline is total: malformed records are dropped, never raised. Only
//! image fetching can fail observably, and it does so with a single
//! human-readable message.
//!
//! # Module Structure
//!
//! - `detect`: parsing, classification, confidence filtering
//! - `overlay`: unit-square projection, render pass, SVG export
//! - `metrics`: visible-set summaries and upstream scan metrics
//! - `scan`: scan-result envelope
//! - `blob`: authenticated image handles, scopes, galleries
//! - `config`: file + environment configuration

pub mod blob;
pub mod config;
pub mod detect;
pub mod metrics;
pub mod overlay;
pub mod scan;

pub use blob::{
    BlobFetcher, BlobGallery, BlobHandle, BlobKey, BlobRef, BlobRegistry, BlobScope, Completion,
    FetchedBlob, HttpBlobFetcher, ScopeState,
};
pub use config::OverlayConfig;
pub use detect::{
    classify, filter_visible, parse_record, Confidence, ConfidenceThreshold, Detection,
    DetectionKind, DetectionSet, Geometry, Point,
};
pub use metrics::{count_matching, summarize, KindCounts, ScanMetrics, Summary};
pub use overlay::{project, OverlayFrame, OverlayShape, ShapePrimitive};
pub use scan::{ScanResult, ScanType};
