//! Edit dispatch
//!
//! `resize` always runs first. Every other key is then applied in the order it
//! appears in the edit set; unknown keys are skipped.

use crate::image::{
    CropOperator, GeometryNormalizer, Image, ImageResize, ModerationBlurPolicy, NativeOperation,
    Overlay, RoundCropOperator,
};
use crate::pipeline::run_blocking;
use crate::traits::{ModerationDetector, OverlaySource};
use imagehandler_core::error::{
    CONTENT_MODERATION_UNAVAILABLE, INTERNAL_SERVER_ERROR, OVERLAY_UNAVAILABLE,
};
use imagehandler_core::{
    keys, ContentModerationSpec, CropSpec, DimensionLimits, EditSet, ImageHandlerError,
    OverlaySpec, RoundCropSpec,
};
use serde::Deserialize;
use serde_json::Value;

/// Applies an edit set to a decoded image
#[derive(Clone, Copy, Default)]
pub struct EditDispatcher<'a> {
    moderation: Option<&'a dyn ModerationDetector>,
    overlays: Option<&'a dyn OverlaySource>,
    limits: DimensionLimits,
}

impl<'a> EditDispatcher<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_moderation_detector(mut self, detector: &'a dyn ModerationDetector) -> Self {
        self.moderation = Some(detector);
        self
    }

    pub fn with_overlay_source(mut self, source: &'a dyn OverlaySource) -> Self {
        self.overlays = Some(source);
        self
    }

    pub fn with_limits(mut self, limits: DimensionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Apply every edit. The first failing edit aborts the whole set.
    pub async fn apply(&self, image: Image, edits: &EditSet) -> Result<Image, ImageHandlerError> {
        let requested = edits
            .resize_spec()
            .map_err(|e| ImageHandlerError::invalid_parameter(keys::RESIZE, e))?;

        let limits = self.limits;
        let mut image = run_blocking(move || {
            let resize = GeometryNormalizer::normalize(requested.as_ref(), image.dimensions());
            ImageResize::apply_within(image, &resize, &limits)
                .map_err(|e| ImageHandlerError::invalid_parameter(keys::RESIZE, e))
        })
        .await?;

        for (key, value) in edits.iter() {
            image = match key {
                keys::RESIZE => image,
                keys::CONTENT_MODERATION => self.moderate(image, value).await?,
                keys::OVERLAY_WITH => self.overlay(image, value).await?,
                _ => {
                    let (key, value) = (key.to_string(), value.clone());
                    run_blocking(move || Self::apply_local(image, &key, &value, &limits)).await?
                }
            };
        }

        Ok(image)
    }

    /// Edits that need no collaborator
    fn apply_local(
        image: Image,
        key: &str,
        value: &Value,
        limits: &DimensionLimits,
    ) -> Result<Image, ImageHandlerError> {
        match key {
            keys::ROUND_CROP => match RoundCropSpec::from_value(value) {
                Some(spec) => RoundCropOperator::apply(image, &spec).map_err(|e| {
                    ImageHandlerError::internal_with_source(
                        INTERNAL_SERVER_ERROR,
                        "Failed to apply the round crop",
                        e,
                    )
                }),
                None => Ok(image),
            },
            keys::CROP => {
                // Any malformed crop is reported like an out-of-bounds one
                let spec = CropSpec::deserialize(value)
                    .map_err(|_| ImageHandlerError::crop_out_of_bounds())?;
                CropOperator::apply(image, &spec)
            }
            name => match NativeOperation::parse(name, value)? {
                Some(operation) => {
                    if let Some(canvas) = operation.canvas_dimensions(image.dimensions()) {
                        limits
                            .check(canvas.width, canvas.height)
                            .map_err(|e| ImageHandlerError::invalid_parameter(name, e))?;
                    }
                    Ok(operation.apply(image))
                }
                None => {
                    if !NativeOperation::is_supported(name) {
                        tracing::debug!(edit = name, "Ignoring unsupported edit");
                    }
                    Ok(image)
                }
            },
        }
    }

    async fn moderate(&self, image: Image, value: &Value) -> Result<Image, ImageHandlerError> {
        let spec = match value {
            Value::Bool(false) => return Ok(image),
            Value::Null | Value::Bool(true) => ContentModerationSpec::default(),
            other => ContentModerationSpec::deserialize(other).map_err(|e| {
                ImageHandlerError::invalid_parameter(keys::CONTENT_MODERATION, e)
            })?,
        };

        let detector = self.moderation.ok_or_else(|| {
            ImageHandlerError::internal(
                CONTENT_MODERATION_UNAVAILABLE,
                "Content moderation is not configured",
            )
        })?;

        let (image, encoded) = run_blocking(move || {
            let encoded = image.to_png().map_err(ImageHandlerError::encode)?;
            Ok((image, encoded))
        })
        .await?;

        let found = detector
            .detect_moderation_labels(&encoded, spec.min_confidence)
            .await
            .map_err(|e| {
                ImageHandlerError::internal_with_source(
                    INTERNAL_SERVER_ERROR,
                    "Content moderation failed",
                    e,
                )
            })?;

        tracing::debug!(
            labels = ?found.label_names().collect::<Vec<_>>(),
            "Moderation labels detected"
        );

        run_blocking(move || {
            Ok(ModerationBlurPolicy::apply(
                image,
                spec.blur,
                spec.moderation_labels.as_deref(),
                &found,
            ))
        })
        .await
    }

    async fn overlay(&self, image: Image, value: &Value) -> Result<Image, ImageHandlerError> {
        let spec = OverlaySpec::deserialize(value)
            .map_err(|e| ImageHandlerError::invalid_parameter(keys::OVERLAY_WITH, e))?;

        let source = self.overlays.ok_or_else(|| {
            ImageHandlerError::internal(OVERLAY_UNAVAILABLE, "No overlay source is configured")
        })?;

        let overlay = source
            .fetch_overlay(&spec.bucket, &spec.key)
            .await
            .map_err(|e| {
                ImageHandlerError::internal_with_source(
                    OVERLAY_UNAVAILABLE,
                    "Failed to fetch the overlay image",
                    e,
                )
            })?;

        let limits = self.limits;
        run_blocking(move || Overlay::apply(image, &overlay, &spec, &limits)).await
    }
}
