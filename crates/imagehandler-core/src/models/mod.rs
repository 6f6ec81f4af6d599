//! Request and edit data model shared by the processing crate and its callers.

pub mod edits;
pub mod moderation;
pub mod request;

pub use edits::{
    keys, loose_number, Color, ContentModerationSpec, CropSpec, EditSet, Fit, OverlayPlacement,
    OverlaySpec, Position, ResizeSpec, RoundCropGeometry, RoundCropSpec,
};
pub use moderation::{ModerationLabel, ModerationResult};
pub use request::{ContentType, ImageFormatType, ImageRequest, OutputSelection, ProcessedImage};
