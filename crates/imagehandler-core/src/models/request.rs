use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::edits::EditSet;

/// Declared content type of the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "image/tiff")]
    Tiff,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/svg+xml")]
    Svg,
}

impl ContentType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(ContentType::Png),
            "image/jpeg" | "image/jpg" => Some(ContentType::Jpeg),
            "image/webp" => Some(ContentType::Webp),
            "image/tiff" => Some(ContentType::Tiff),
            "image/gif" => Some(ContentType::Gif),
            "image/svg+xml" => Some(ContentType::Svg),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Webp => "image/webp",
            ContentType::Tiff => "image/tiff",
            ContentType::Gif => "image/gif",
            ContentType::Svg => "image/svg+xml",
        }
    }

    /// Content types decoded as a multi-frame sequence
    pub fn is_animated_format(self) -> bool {
        matches!(self, ContentType::Gif)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Requested output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormatType {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Tiff,
    Heif,
    Heic,
    Raw,
    Gif,
    Avif,
}

impl ImageFormatType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormatType::Jpg => "jpg",
            ImageFormatType::Jpeg => "jpeg",
            ImageFormatType::Png => "png",
            ImageFormatType::Webp => "webp",
            ImageFormatType::Tiff => "tiff",
            ImageFormatType::Heif => "heif",
            ImageFormatType::Heic => "heic",
            ImageFormatType::Raw => "raw",
            ImageFormatType::Gif => "gif",
            ImageFormatType::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormatType::Jpg | ImageFormatType::Jpeg => "image/jpeg",
            ImageFormatType::Png => "image/png",
            ImageFormatType::Webp => "image/webp",
            ImageFormatType::Tiff => "image/tiff",
            ImageFormatType::Heif => "image/heif",
            ImageFormatType::Heic => "image/heic",
            ImageFormatType::Raw => "application/octet-stream",
            ImageFormatType::Gif => "image/gif",
            ImageFormatType::Avif => "image/avif",
        }
    }
}

impl FromStr for ImageFormatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpg" => Ok(ImageFormatType::Jpg),
            "jpeg" => Ok(ImageFormatType::Jpeg),
            "png" => Ok(ImageFormatType::Png),
            "webp" => Ok(ImageFormatType::Webp),
            "tiff" => Ok(ImageFormatType::Tiff),
            "heif" => Ok(ImageFormatType::Heif),
            "heic" => Ok(ImageFormatType::Heic),
            "raw" => Ok(ImageFormatType::Raw),
            "gif" => Ok(ImageFormatType::Gif),
            "avif" => Ok(ImageFormatType::Avif),
            other => Err(format!("Invalid output format: {}", other)),
        }
    }
}

impl fmt::Display for ImageFormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller's output selection. All fields optional; see `OutputFormatter` for defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormatType>,
    /// WEBP only, 0-6
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

/// A fully-fetched image request handed over by the request-mapping layer
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub original_image: Bytes,
    pub content_type: ContentType,
    pub edits: Option<EditSet>,
    pub output: OutputSelection,
}

impl ImageRequest {
    pub fn new(original_image: impl Into<Bytes>, content_type: ContentType) -> Self {
        Self {
            original_image: original_image.into(),
            content_type,
            edits: None,
            output: OutputSelection::default(),
        }
    }

    pub fn with_edits(mut self, edits: EditSet) -> Self {
        self.edits = Some(edits);
        self
    }

    pub fn with_output(mut self, output: OutputSelection) -> Self {
        self.output = output;
        self
    }
}

/// Successful pipeline output: base64 body plus its resolved content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub body: String,
    pub content_type: String,
    /// Size of the encoded image before base64
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_mime() {
        assert_eq!(ContentType::from_mime("image/gif"), Some(ContentType::Gif));
        assert_eq!(ContentType::from_mime("IMAGE/JPG"), Some(ContentType::Jpeg));
        assert_eq!(
            ContentType::from_mime("image/svg+xml"),
            Some(ContentType::Svg)
        );
        assert_eq!(ContentType::from_mime("video/mp4"), None);
    }

    #[test]
    fn test_only_gif_is_animated_format() {
        assert!(ContentType::Gif.is_animated_format());
        assert!(!ContentType::Png.is_animated_format());
        assert!(!ContentType::Webp.is_animated_format());
    }

    #[test]
    fn test_image_format_parse() {
        assert_eq!("webp".parse::<ImageFormatType>(), Ok(ImageFormatType::Webp));
        assert_eq!("JPG".parse::<ImageFormatType>(), Ok(ImageFormatType::Jpg));
        assert!("bmp".parse::<ImageFormatType>().is_err());
    }

    #[test]
    fn test_output_selection_deserialize() {
        let selection: OutputSelection =
            serde_json::from_str(r#"{"format":"webp","effort":6}"#).unwrap();
        assert_eq!(selection.format, Some(ImageFormatType::Webp));
        assert_eq!(selection.effort, Some(6));
        assert_eq!(selection.quality, None);
    }

    #[test]
    fn test_jpg_and_jpeg_share_mime_type() {
        assert_eq!(ImageFormatType::Jpg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormatType::Jpeg.mime_type(), "image/jpeg");
    }
}
