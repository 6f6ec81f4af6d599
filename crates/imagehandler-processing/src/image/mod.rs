//! Image module
//!
//! This module provides the decoded image handle and every edit operator:
//! - Decoding (handle, svg) and EXIF orientation
//! - Geometry (resize, crop, round_crop)
//! - Content operators (moderation, overlay, operations)

pub mod crop;
pub mod handle;
pub mod moderation;
pub mod operations;
pub mod orientation;
pub mod overlay;
pub mod resize;
pub mod round_crop;
pub mod svg;

pub use handle::{DecodeOptions, Dimensions, Frame, Image};

// Re-export commonly used types
pub use crop::CropOperator;
pub use moderation::ModerationBlurPolicy;
pub use operations::NativeOperation;
pub use orientation::ImageOrientation;
pub use overlay::{Overlay, OverlayOffsetCalculator};
pub use resize::{GeometryNormalizer, ImageResize, ResizePlan};
pub use round_crop::{EllipseGeometry, RoundCropOperator};
