//! Collaborator traits
//!
//! The pipeline never talks to object storage or a moderation service itself.
//! Callers inject implementations of these traits into [`ImagePipeline`](crate::ImagePipeline).

use async_trait::async_trait;
use bytes::Bytes;
use imagehandler_core::ModerationResult;

/// Content-moderation detection service
#[async_trait]
pub trait ModerationDetector: Send + Sync {
    /// Classify an encoded image. Labels below `min_confidence` (percent) are
    /// expected to be filtered out by the implementation.
    async fn detect_moderation_labels(
        &self,
        image: &[u8],
        min_confidence: Option<f32>,
    ) -> Result<ModerationResult, anyhow::Error>;
}

/// Source of overlay images, addressed the way object storage addresses them
#[async_trait]
pub trait OverlaySource: Send + Sync {
    async fn fetch_overlay(&self, bucket: &str, key: &str) -> Result<Bytes, anyhow::Error>;
}
