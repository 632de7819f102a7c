use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use url::Url;

use crate::blob::DEFAULT_MAX_BLOB_BYTES;
use crate::detect::{ConfidenceThreshold, MAX_THRESHOLD};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_THRESHOLD: u8 = 50;
const DEFAULT_COUNT_LABEL: &str = "corn";

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    api: Option<ApiConfigFile>,
    overlay: Option<OverlaySectionFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    base_url: Option<String>,
    max_blob_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlaySectionFile {
    threshold: Option<u32>,
    count_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub api_base_url: String,
    pub max_blob_bytes: usize,
    pub threshold: ConfidenceThreshold,
    pub count_label: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
            threshold: ConfidenceThreshold::new(DEFAULT_THRESHOLD),
            count_label: DEFAULT_COUNT_LABEL.to_string(),
        }
    }
}

impl OverlayConfig {
    /// Load from the JSON file named by `AGRISCAN_CONFIG`, then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("AGRISCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let api_base_url = file
            .api
            .as_ref()
            .and_then(|api| api.base_url.clone())
            .unwrap_or(defaults.api_base_url);
        let max_blob_bytes = file
            .api
            .as_ref()
            .and_then(|api| api.max_blob_bytes)
            .unwrap_or(defaults.max_blob_bytes);
        let threshold = match file.overlay.as_ref().and_then(|o| o.threshold) {
            Some(percent) => parse_threshold(percent)?,
            None => defaults.threshold,
        };
        let count_label = file
            .overlay
            .and_then(|o| o.count_label)
            .unwrap_or(defaults.count_label);
        Ok(Self {
            api_base_url,
            max_blob_bytes,
            threshold,
            count_label,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("AGRISCAN_API_BASE_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(threshold) = std::env::var("AGRISCAN_THRESHOLD") {
            if !threshold.trim().is_empty() {
                let percent: u32 = threshold.trim().parse().map_err(|_| {
                    anyhow!("AGRISCAN_THRESHOLD must be an integer percentage (0-100)")
                })?;
                self.threshold = parse_threshold(percent)?;
            }
        }
        if let Ok(label) = std::env::var("AGRISCAN_COUNT_LABEL") {
            if !label.trim().is_empty() {
                self.count_label = label.trim().to_string();
            }
        }
        if let Ok(bytes) = std::env::var("AGRISCAN_MAX_BLOB_BYTES") {
            if !bytes.trim().is_empty() {
                self.max_blob_bytes = bytes
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("AGRISCAN_MAX_BLOB_BYTES must be an integer byte count"))?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| anyhow!("invalid api base url '{}': {}", self.api_base_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "api base url must be http(s), got '{}'",
                url.scheme()
            ));
        }
        if self.max_blob_bytes == 0 {
            return Err(anyhow!("max blob bytes must be greater than zero"));
        }
        self.count_label = self.count_label.to_lowercase();
        Ok(())
    }
}

fn parse_threshold(percent: u32) -> Result<ConfidenceThreshold> {
    if percent > u32::from(MAX_THRESHOLD) {
        return Err(anyhow!(
            "threshold must be between 0 and {}, got {}",
            MAX_THRESHOLD,
            percent
        ));
    }
    // Bounded by MAX_THRESHOLD above.
    Ok(ConfidenceThreshold::new(percent as u8))
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
