//! Imagehandler processing
//!
//! This crate turns an [`ImageRequest`](imagehandler_core::ImageRequest) into an
//! encoded image:
//! - Image handle and decoding (image, svg, orientation)
//! - Edit operators (resize, crop, round crop, moderation blur, overlay, native operations)
//! - Edit dispatch, output format selection and encoding
//! - The end-to-end [`ImagePipeline`]

pub mod compression;
pub mod dispatcher;
pub mod image;
pub mod output;
pub mod pipeline;
pub mod traits;

pub use compression::{EncodeParams, ImageCompressor};
pub use dispatcher::EditDispatcher;
pub use crate::image::{DecodeOptions, Dimensions, Image};
pub use output::OutputFormatter;
pub use pipeline::{enforce_payload_ceiling, ImagePipeline};
pub use traits::{ModerationDetector, OverlaySource};
