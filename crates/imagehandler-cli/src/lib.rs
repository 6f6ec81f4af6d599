//! Local collaborators and helpers for the `imagehandler` binary.
//!
//! Overlays are read from a directory laid out as `<dir>/<bucket>/<key>`, and
//! moderation labels come from a JSON file in the detector's response shape.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use imagehandler_core::{EditSet, ModerationResult};
use imagehandler_processing::{ModerationDetector, OverlaySource};
use std::path::{Component, Path, PathBuf};

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays parseable.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("imagehandler=info,warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().with_target(false).init();
    }
}

/// Read an edit set from a JSON file
pub async fn load_edits(path: &Path) -> anyhow::Result<EditSet> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read edits from {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("Edits in {} are not a JSON object", path.display()))
}

/// Overlay images stored on the local filesystem
pub struct LocalOverlaySource {
    root: PathBuf,
}

impl LocalOverlaySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `bucket/key` below the root; any path escaping it is refused
    fn resolve(&self, bucket: &str, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("Invalid overlay location {}/{}", bucket, key);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl OverlaySource for LocalOverlaySource {
    async fn fetch_overlay(&self, bucket: &str, key: &str) -> Result<Bytes, anyhow::Error> {
        let path = self.resolve(bucket, key)?;
        tracing::debug!(path = %path.display(), "Reading overlay");
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read overlay {}", path.display()))?;
        Ok(Bytes::from(data))
    }
}

/// Replays a recorded moderation response
pub struct StaticModerationDetector {
    result: ModerationResult,
}

impl StaticModerationDetector {
    pub fn new(result: ModerationResult) -> Self {
        Self { result }
    }

    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read moderation labels from {}", path.display()))?;
        let result = serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid moderation labels in {}", path.display()))?;
        Ok(Self::new(result))
    }
}

#[async_trait]
impl ModerationDetector for StaticModerationDetector {
    async fn detect_moderation_labels(
        &self,
        _image: &[u8],
        min_confidence: Option<f32>,
    ) -> Result<ModerationResult, anyhow::Error> {
        let labels = self
            .result
            .moderation_labels
            .iter()
            .filter(|label| min_confidence.map_or(true, |min| label.confidence >= min))
            .cloned()
            .collect();
        Ok(ModerationResult::new(labels))
    }
}
