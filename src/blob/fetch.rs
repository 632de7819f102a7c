use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::io::Read;
use std::time::Instant;
use url::Url;

use super::FetchedBlob;

/// Upper bound on a single image body.
pub const DEFAULT_MAX_BLOB_BYTES: usize = 32 * 1024 * 1024;

/// Source of protected image bytes.
///
/// On failure the error's `Display` is the human-readable reason to show.
pub trait BlobFetcher {
    fn fetch(&self, path: &str, token: &str) -> Result<FetchedBlob>;
}

/// Fetches images from the scan API with `Authorization: Bearer <token>`.
pub struct HttpBlobFetcher {
    base_url: String,
    agent: ureq::Agent,
    max_bytes: usize,
}

impl HttpBlobFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).context("parse api base url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported api scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().build(),
            max_bytes: DEFAULT_MAX_BLOB_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Full URL for an API resource path.
    pub fn resource_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl BlobFetcher for HttpBlobFetcher {
    fn fetch(&self, path: &str, token: &str) -> Result<FetchedBlob> {
        let url = self.resource_url(path);
        let started = Instant::now();
        let response = match self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", token))
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let status_text = response.status_text().to_string();
                let body = response.into_string().unwrap_or_default();
                let message = failure_message(&body, &status_text);
                log::warn!("image fetch {} failed with {}: {}", path, status, message);
                return Err(anyhow!(message));
            }
            Err(ureq::Error::Transport(err)) => {
                log::warn!("image fetch {} failed: {}", path, err);
                return Err(anyhow!(err.to_string()));
            }
        };

        let content_type = response.header("Content-Type").map(str::to_string);
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| anyhow!("failed to read image body: {}", e))?;
        if bytes.len() > self.max_bytes {
            return Err(anyhow!("image exceeds {} bytes", self.max_bytes));
        }
        log::debug!(
            "fetched {} ({} bytes) in {:?}",
            path,
            bytes.len(),
            started.elapsed()
        );
        Ok(FetchedBlob {
            bytes,
            content_type,
        })
    }
}

/// Human-readable reason for a failed fetch.
///
/// Prefers the `detail` field of a JSON error body, then the raw body, then
/// the transport status text. A non-string `detail` is rendered as JSON.
pub fn failure_message(body: &str, status_text: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = map.get("detail") {
            return match detail {
                Value::String(s) => s.clone(),
                Value::Null => status_text.to_string(),
                other => other.to_string(),
            };
        }
    }
    if body.is_empty() {
        status_text.to_string()
    } else {
        body.to_string()
    }
}
