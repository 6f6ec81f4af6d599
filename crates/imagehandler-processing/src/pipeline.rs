//! End-to-end image pipeline
//!
//! decode -> (animation check) -> edits -> encode -> base64 -> payload ceiling

use crate::compression::ImageCompressor;
use crate::dispatcher::EditDispatcher;
use crate::image::{DecodeOptions, Image};
use crate::output::OutputFormatter;
use crate::traits::{ModerationDetector, OverlaySource};
use base64::{engine::general_purpose, Engine as _};
use imagehandler_core::error::INTERNAL_SERVER_ERROR;
use imagehandler_core::{
    ErrorMetadata, ImageHandlerError, ImageRequest, LogLevel, PipelineConfig, ProcessedImage,
};
use std::sync::Arc;

/// Run CPU-bound image work off the async pool
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ImageHandlerError>
where
    F: FnOnce() -> Result<T, ImageHandlerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        ImageHandlerError::internal_with_source(
            INTERNAL_SERVER_ERROR,
            "Image processing task failed",
            e.into(),
        )
    })?
}

/// Fail when the base64 body is larger than the transport allows.
/// A body of exactly `limit` bytes is accepted.
pub fn enforce_payload_ceiling(size: usize, limit: usize) -> Result<(), ImageHandlerError> {
    if size > limit {
        return Err(ImageHandlerError::too_large(size, limit));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ImagePipeline {
    config: PipelineConfig,
    moderation: Option<Arc<dyn ModerationDetector>>,
    overlays: Option<Arc<dyn OverlaySource>>,
}

impl ImagePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            moderation: None,
            overlays: None,
        }
    }

    pub fn with_moderation_detector(mut self, detector: Arc<dyn ModerationDetector>) -> Self {
        self.moderation = Some(detector);
        self
    }

    pub fn with_overlay_source(mut self, source: Arc<dyn OverlaySource>) -> Self {
        self.overlays = Some(source);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one request. Every failure is logged once here, at the level
    /// its class calls for.
    pub async fn process(&self, request: &ImageRequest) -> Result<ProcessedImage, ImageHandlerError> {
        let result = self.run(request).await;

        if let Err(err) = &result {
            let details = err.detailed_message();
            match err.log_level() {
                LogLevel::Debug => tracing::debug!(code = err.error_code(), "{}", details),
                LogLevel::Warn => tracing::warn!(code = err.error_code(), "{}", details),
                LogLevel::Error => tracing::error!(code = err.error_code(), "{}", details),
            }
        }

        result
    }

    async fn run(&self, request: &ImageRequest) -> Result<ProcessedImage, ImageHandlerError> {
        let content_type = request.content_type;
        let options = DecodeOptions::for_content_type(content_type);

        let params = OutputFormatter::select(&request.output, &self.config);
        OutputFormatter::validate(&params)?;

        tracing::debug!(
            content_type = %content_type,
            format = %params.format,
            bytes = request.original_image.len(),
            "Processing image"
        );

        let original = request.original_image.clone();
        let image = run_blocking(move || {
            Image::decode(&original, content_type, options).map_err(ImageHandlerError::decode)
        })
        .await?;

        let image = match request.edits.as_ref().filter(|edits| !edits.is_empty()) {
            Some(edits) => {
                let original = request.original_image.clone();
                let (image, _) = run_blocking(move || {
                    OutputFormatter::resolve_animation(image, &original, content_type, options)
                        .map_err(ImageHandlerError::decode)
                })
                .await?;

                self.dispatcher().apply(image, edits).await?
            }
            None => image,
        };

        let encoded = run_blocking(move || {
            ImageCompressor::encode(&image, &params).map_err(ImageHandlerError::encode)
        })
        .await?;

        let body = general_purpose::STANDARD.encode(&encoded);
        enforce_payload_ceiling(body.len(), self.config.payload_limit_bytes)?;

        tracing::info!(
            format = %params.format,
            size = encoded.len(),
            "Image processed"
        );

        Ok(ProcessedImage {
            body,
            content_type: params.format.mime_type().to_string(),
            size: encoded.len(),
        })
    }

    fn dispatcher(&self) -> EditDispatcher<'_> {
        let mut dispatcher = EditDispatcher::new().with_limits(self.config.limits);
        if let Some(detector) = self.moderation.as_deref() {
            dispatcher = dispatcher.with_moderation_detector(detector);
        }
        if let Some(source) = self.overlays.as_deref() {
            dispatcher = dispatcher.with_overlay_source(source);
        }
        dispatcher
    }
}
