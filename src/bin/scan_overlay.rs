//! scan_overlay - run one overlay render pass over a stored scan result.
//!
//! 1. Reads a scan-result JSON document (file or stdin)
//! 2. Parses, classifies and filters its detections at the chosen threshold
//! 3. Prints the summary (text or JSON) and optionally writes an SVG overlay
//! 4. Optionally fetches the protected scan image with a bearer token

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::PathBuf;

use agriscan_overlay::blob::{BlobScope, HttpBlobFetcher};
use agriscan_overlay::overlay::svg::render_svg;
use agriscan_overlay::{
    BlobRegistry, ConfidenceThreshold, DetectionKind, OverlayConfig, OverlayFrame, ScanResult,
};

const DEFAULT_SVG_SIZE: u32 = 1000;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Render detection overlays for a crop scan result")]
struct Args {
    /// Scan result JSON file, or '-' for stdin.
    #[arg(long, default_value = "-")]
    result: String,

    /// Confidence threshold in percent (0-100). Defaults to the configured value.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    threshold: Option<u8>,

    /// Label substring to count among visible detections (repeatable).
    #[arg(long = "count-label")]
    count_labels: Vec<String>,

    /// Summary output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the overlay as SVG to this path.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// API path of the protected image. Defaults to the scan's display image.
    #[arg(long)]
    image: Option<String>,

    /// Bearer token for image requests.
    #[arg(long, env = "AGRISCAN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Write the fetched image to this path.
    #[arg(long)]
    image_out: Option<PathBuf>,

    /// Choose the original image over the annotated one.
    #[arg(long)]
    hide_boxes: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = OverlayConfig::load()?;

    let raw = read_result(&args.result)?;
    let scan = ScanResult::from_slice(&raw)?;
    let threshold = args
        .threshold
        .map(ConfidenceThreshold::new)
        .unwrap_or(config.threshold);
    let count_labels = if args.count_labels.is_empty() {
        vec![config.count_label.clone()]
    } else {
        args.count_labels.clone()
    };

    let set = scan.detection_set();
    let frame = OverlayFrame::build(&set, threshold, &count_labels);
    log::info!(
        "{} record(s): {} visible, {} hidden, {} dropped at {}%",
        scan.records.len(),
        frame.shapes.len(),
        frame.hidden,
        frame.dropped,
        threshold.percent()
    );

    let registry = BlobRegistry::new();
    let mut scope = BlobScope::new("scan_overlay", registry.clone());
    let image_path = args
        .image
        .clone()
        .or_else(|| scan.display_image_path(!args.hide_boxes).map(str::to_string));
    let mut image_size = None;
    match (image_path, args.token.as_deref()) {
        (Some(path), Some(token)) => {
            let fetcher =
                HttpBlobFetcher::new(&config.api_base_url)?.with_max_bytes(config.max_blob_bytes);
            match scope.acquire(&fetcher, &path, token) {
                Ok(handle) => {
                    let bytes = handle
                        .data()
                        .ok_or_else(|| anyhow!("image released before use"))?;
                    log::info!("fetched {} ({} bytes) as {}", path, bytes.len(), handle.url());
                    if let Some(out) = &args.image_out {
                        std::fs::write(out, &bytes[..])
                            .with_context(|| format!("write image to {}", out.display()))?;
                    }
                    image_size = image_dimensions(&bytes);
                }
                Err(err) => log::error!("failed to load image {}: {}", path, err),
            }
        }
        (Some(path), None) if args.image.is_some() || args.image_out.is_some() => {
            log::warn!("no token given; skipping image {}", path);
        }
        _ => {}
    }

    if let Some(svg_path) = &args.svg {
        let (width, height) = image_size.unwrap_or((DEFAULT_SVG_SIZE, DEFAULT_SVG_SIZE));
        std::fs::write(svg_path, render_svg(&frame, width, height))
            .with_context(|| format!("write svg to {}", svg_path.display()))?;
        log::info!("overlay written to {} ({}x{})", svg_path.display(), width, height);
    }

    match args.format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "scan_type": scan.scan_type.display_name(),
                "detection_count": scan.detection_count,
                "frame": frame,
                "metrics": scan.metrics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => print_text(&scan, &frame),
    }

    scope.teardown();
    debug_assert_eq!(registry.live_count(), 0);
    Ok(())
}

fn read_result(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read scan result from stdin")?;
        return Ok(buf);
    }
    std::fs::read(source).with_context(|| format!("read scan result {}", source))
}

fn print_text(scan: &ScanResult, frame: &OverlayFrame) {
    println!("Type: {}", scan.scan_type.display_name());
    println!("Detections: {}", scan.detection_count);
    println!(
        "Visible: {} (threshold {}%, {} hidden, {} dropped)",
        frame.summary.total,
        frame.threshold.percent(),
        frame.hidden,
        frame.dropped
    );
    for kind in [
        DetectionKind::Healthy,
        DetectionKind::Irregular,
        DetectionKind::Disease,
    ] {
        println!("  {}: {}", kind, frame.summary.by_kind.get(kind));
    }
    for (needle, count) in &frame.summary.matches {
        println!("  label contains '{}': {}", needle, count);
    }
    let metrics = &scan.metrics;
    if let Some(health) = metrics.field_health_percent {
        println!("Field health: {}%", health);
    }
    if let Some(index) = metrics.overall_yield_index {
        println!("Yield index: {}%", index);
    }
    if metrics.has_index_bars(scan.detection_count) {
        for (name, value) in [
            ("Kernel development", metrics.kernel_development_score),
            ("Discoloration index", metrics.discoloration_index),
            ("Leaf dryness index", metrics.leaf_dryness_index),
        ] {
            if let Some(value) = value {
                println!("{}: {}%", name, value);
            }
        }
    }
    if let Some(summary) = &metrics.yield_summary {
        println!("{}", summary);
    }
    if let Some(area) = &metrics.field_area {
        if let Some(hectares) = area.area_hectares {
            println!("Field area: {:.2} ha", hectares);
        }
    }
}

#[cfg(feature = "image-size")]
fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    use image::GenericImageView;

    match image::load_from_memory(bytes) {
        Ok(img) => Some(img.dimensions()),
        Err(err) => {
            log::warn!("could not decode image for sizing: {}", err);
            None
        }
    }
}

#[cfg(not(feature = "image-size"))]
fn image_dimensions(_bytes: &[u8]) -> Option<(u32, u32)> {
    None
}
