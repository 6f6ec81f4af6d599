//! Error types module
//!
//! Every failure of an image request is reported as a single `ImageHandlerError`.
//! Variants fall into three classes: client errors (`BadRequest`), the transport
//! payload ceiling (`TooLargeImage`) and unexpected codec failures
//! (`InternalServerError` / `InternalWithSource`). The `ErrorMetadata` trait tells
//! the transport layer how to present each of them.

use serde::Serialize;

/// Status codes surfaced to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    RequestTooLong = 413,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like invalid edits
    Debug,
    /// Warning level - for limits the caller can work around
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// Status class of the error
    fn status_code(&self) -> StatusCode;

    /// Numeric HTTP status code
    fn http_status_code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// Machine-readable error code (e.g., "Crop::AreaOutOfBounds")
    fn error_code(&self) -> &str;

    /// Whether resubmitting the identical request could succeed
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (never includes the underlying source chain)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

pub const CROP_OUT_OF_BOUNDS: &str = "Crop::AreaOutOfBounds";
pub const TOO_LARGE_IMAGE: &str = "TooLargeImageException";
pub const OUTPUT_FORMAT_UNSUPPORTED: &str = "OutputFormat::Unsupported";
pub const CONTENT_MODERATION_UNAVAILABLE: &str = "ContentModeration::Unavailable";
pub const OVERLAY_UNAVAILABLE: &str = "Overlay::Unavailable";
pub const IMAGE_DECODE_FAILED: &str = "ImageDecode::Failed";
pub const IMAGE_ENCODE_FAILED: &str = "ImageEncode::Failed";
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";

#[derive(Debug, thiserror::Error)]
pub enum ImageHandlerError {
    #[error("{code}: {message}")]
    BadRequest { code: String, message: String },

    #[error("Encoded image payload of {size} bytes exceeds the {limit} byte limit")]
    TooLargeImage { size: usize, limit: usize },

    #[error("{code}: {message}")]
    InternalServerError { code: String, message: String },

    #[error("{code}: {message}")]
    InternalWithSource {
        code: String,
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ImageHandlerError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        ImageHandlerError::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn crop_out_of_bounds() -> Self {
        Self::bad_request(
            CROP_OUT_OF_BOUNDS,
            "The cropping area you provided exceeds the boundaries of the original image. \
             Please try choosing a correct cropping value.",
        )
    }

    /// Malformed parameters for a recognised operation, e.g. `Blur::InvalidParameter`.
    pub fn invalid_parameter(operation: &str, detail: impl std::fmt::Display) -> Self {
        Self::bad_request(
            format!("{}::InvalidParameter", operation_title(operation)),
            format!("Invalid parameters for the {} edit: {}", operation, detail),
        )
    }

    pub fn too_large(size: usize, limit: usize) -> Self {
        ImageHandlerError::TooLargeImage { size, limit }
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        ImageHandlerError::InternalServerError {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal_with_source(
        code: impl Into<String>,
        message: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        ImageHandlerError::InternalWithSource {
            code: code.into(),
            message: message.into(),
            source,
        }
    }

    pub fn decode(source: anyhow::Error) -> Self {
        Self::internal_with_source(IMAGE_DECODE_FAILED, "Failed to decode the image", source)
    }

    pub fn encode(source: anyhow::Error) -> Self {
        Self::internal_with_source(IMAGE_ENCODE_FAILED, "Failed to encode the image", source)
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

/// `roundCrop` -> `RoundCrop`
fn operation_title(operation: &str) -> String {
    let mut chars = operation.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ErrorMetadata for ImageHandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ImageHandlerError::BadRequest { .. } => StatusCode::BadRequest,
            ImageHandlerError::TooLargeImage { .. } => StatusCode::RequestTooLong,
            ImageHandlerError::InternalServerError { .. }
            | ImageHandlerError::InternalWithSource { .. } => StatusCode::InternalServerError,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            ImageHandlerError::BadRequest { code, .. } => code,
            ImageHandlerError::TooLargeImage { .. } => TOO_LARGE_IMAGE,
            ImageHandlerError::InternalServerError { code, .. } => code,
            ImageHandlerError::InternalWithSource { code, .. } => code,
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn client_message(&self) -> String {
        match self {
            ImageHandlerError::BadRequest { message, .. } => message.clone(),
            ImageHandlerError::TooLargeImage { .. } => {
                "The converted image is too large to return.".to_string()
            }
            ImageHandlerError::InternalServerError { message, .. } => message.clone(),
            ImageHandlerError::InternalWithSource { message, .. } => message.clone(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ImageHandlerError::BadRequest { .. } => LogLevel::Debug,
            ImageHandlerError::TooLargeImage { .. } => LogLevel::Warn,
            ImageHandlerError::InternalServerError { .. }
            | ImageHandlerError::InternalWithSource { .. } => LogLevel::Error,
        }
    }
}

/// Wire shape of a failed request: `{statusCode, code, message}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub code: String,
    pub message: String,
}

impl From<&ImageHandlerError> for ErrorResponse {
    fn from(err: &ImageHandlerError) -> Self {
        ErrorResponse {
            status_code: err.http_status_code(),
            code: err.error_code().to_string(),
            message: err.client_message(),
        }
    }
}
