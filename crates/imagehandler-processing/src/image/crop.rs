use super::handle::{Dimensions, Image};
use imagehandler_core::{CropSpec, ImageHandlerError};

/// Rectangular extraction
pub struct CropOperator;

impl CropOperator {
    /// Check that the rectangle is non-empty and lies within the image
    pub fn validate(spec: &CropSpec, dimensions: Dimensions) -> Result<(), ImageHandlerError> {
        let within = spec.left >= 0
            && spec.top >= 0
            && spec.width > 0
            && spec.height > 0
            && spec.left.saturating_add(spec.width) <= dimensions.width as i64
            && spec.top.saturating_add(spec.height) <= dimensions.height as i64;

        if within {
            Ok(())
        } else {
            Err(ImageHandlerError::crop_out_of_bounds())
        }
    }

    /// Extract the rectangle from every frame
    pub fn apply(image: Image, spec: &CropSpec) -> Result<Image, ImageHandlerError> {
        Self::validate(spec, image.dimensions())?;

        tracing::debug!(
            left = spec.left,
            top = spec.top,
            width = spec.width,
            height = spec.height,
            "Applying crop"
        );

        let (left, top) = (spec.left as u32, spec.top as u32);
        let (width, height) = (spec.width as u32, spec.height as u32);
        Ok(image.map_frames(|frame| frame.crop_imm(left, top, width, height)))
    }
}
