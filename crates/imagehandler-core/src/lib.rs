//! Imagehandler core
//!
//! Data model, error taxonomy and configuration for the image-transformation
//! pipeline. This crate contains no pixel code; see `imagehandler-processing`.

pub mod config;
pub mod error;
pub mod models;

pub use config::{DimensionLimits, PipelineConfig};
pub use error::{ErrorMetadata, ErrorResponse, ImageHandlerError, LogLevel, StatusCode};
pub use models::*;
