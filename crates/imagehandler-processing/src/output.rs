//! Output format selection and animated-sequence handling

use crate::compression::{EncodeParams, ImageCompressor};
use crate::image::{DecodeOptions, Image};
use imagehandler_core::error::OUTPUT_FORMAT_UNSUPPORTED;
use imagehandler_core::{ContentType, ImageFormatType, ImageHandlerError, OutputSelection, PipelineConfig};

const MAX_WEBP_EFFORT: u8 = 6;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Decide the encoder parameters for a request.
    ///
    /// - no format: the configured default (WEBP, effort 4, quality 80)
    /// - WEBP with an effort: that effort only, no quality is injected
    /// - any other explicit format: that format with the requested quality, if any
    pub fn select(selection: &OutputSelection, config: &PipelineConfig) -> EncodeParams {
        match (selection.format, selection.effort) {
            (None, _) => EncodeParams {
                format: config.default_output_format,
                quality: Some(config.default_webp_quality),
                effort: Some(config.default_webp_effort),
            },
            (Some(ImageFormatType::Webp), Some(effort)) => EncodeParams {
                format: ImageFormatType::Webp,
                quality: None,
                effort: Some(effort),
            },
            (Some(format), _) => EncodeParams {
                format,
                quality: selection.quality,
                effort: None,
            },
        }
    }

    /// Reject parameters no encoder can honour
    pub fn validate(params: &EncodeParams) -> Result<(), ImageHandlerError> {
        if !ImageCompressor::supports(params.format) {
            return Err(ImageHandlerError::bad_request(
                OUTPUT_FORMAT_UNSUPPORTED,
                format!("The output format '{}' is not supported.", params.format),
            ));
        }
        if let Some(effort) = params.effort.filter(|e| *e > MAX_WEBP_EFFORT) {
            return Err(ImageHandlerError::invalid_parameter(
                "effort",
                format!("expected 0-{}, got {}", MAX_WEBP_EFFORT, effort),
            ));
        }
        if let Some(quality) = params.quality.filter(|q| !(1..=100).contains(q)) {
            return Err(ImageHandlerError::invalid_parameter(
                "quality",
                format!("expected 1-100, got {}", quality),
            ));
        }
        Ok(())
    }

    /// A source decoded in animated mode with at most one page is decoded again
    /// in static mode. Returns the handle to continue with and the options it
    /// was decoded with.
    pub fn resolve_animation(
        image: Image,
        original: &[u8],
        content_type: ContentType,
        options: DecodeOptions,
    ) -> Result<(Image, DecodeOptions), anyhow::Error> {
        if !options.animated || image.pages() > 1 {
            return Ok((image, options));
        }

        tracing::debug!(
            pages = image.pages(),
            "Single-page animation, decoding again as a still image"
        );

        let options = options.with_animated(false);
        let image = Image::decode(original, content_type, options)?;
        Ok((image, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};
    use imagehandler_core::ErrorMetadata;

    fn gif_bytes(frames: usize) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buffer);
            for i in 0..frames {
                let shade = (i * 80) as u8;
                encoder
                    .encode_frame(Frame::from_parts(
                        RgbaImage::from_pixel(6, 4, Rgba([shade, 0, 0, 255])),
                        0,
                        0,
                        Delay::from_numer_denom_ms(100, 1),
                    ))
                    .unwrap();
            }
        }
        buffer
    }

    fn selection(
        format: Option<ImageFormatType>,
        effort: Option<u8>,
        quality: Option<u8>,
    ) -> OutputSelection {
        OutputSelection {
            format,
            effort,
            quality,
        }
    }

    #[test]
    fn test_default_output_is_webp() {
        let params = OutputFormatter::select(&OutputSelection::default(), &PipelineConfig::default());
        assert_eq!(
            params,
            EncodeParams {
                format: ImageFormatType::Webp,
                quality: Some(80),
                effort: Some(4),
            }
        );
    }

    #[test]
    fn test_default_follows_config() {
        let config = PipelineConfig {
            default_webp_effort: 6,
            default_webp_quality: 60,
            ..PipelineConfig::default()
        };
        let params = OutputFormatter::select(&OutputSelection::default(), &config);
        assert_eq!(params.effort, Some(6));
        assert_eq!(params.quality, Some(60));
    }

    #[test]
    fn test_webp_effort_injects_no_quality() {
        let params = OutputFormatter::select(
            &selection(Some(ImageFormatType::Webp), Some(2), Some(90)),
            &PipelineConfig::default(),
        );
        assert_eq!(params.format, ImageFormatType::Webp);
        assert_eq!(params.effort, Some(2));
        assert_eq!(params.quality, None);
    }

    #[test]
    fn test_explicit_format_passes_quality() {
        let params = OutputFormatter::select(
            &selection(Some(ImageFormatType::Jpeg), Some(3), Some(70)),
            &PipelineConfig::default(),
        );
        assert_eq!(
            params,
            EncodeParams {
                format: ImageFormatType::Jpeg,
                quality: Some(70),
                effort: None,
            }
        );

        let params = OutputFormatter::select(
            &selection(Some(ImageFormatType::Png), None, None),
            &PipelineConfig::default(),
        );
        assert_eq!(params, EncodeParams::new(ImageFormatType::Png));
    }

    #[test]
    fn test_validate() {
        let err = OutputFormatter::validate(&EncodeParams::new(ImageFormatType::Heif)).unwrap_err();
        assert_eq!(err.error_code(), OUTPUT_FORMAT_UNSUPPORTED);
        assert_eq!(err.http_status_code(), 400);

        let mut params = EncodeParams::new(ImageFormatType::Webp);
        params.effort = Some(7);
        assert!(OutputFormatter::validate(&params).is_err());

        params.effort = Some(6);
        params.quality = Some(0);
        assert!(OutputFormatter::validate(&params).is_err());

        params.quality = Some(100);
        assert!(OutputFormatter::validate(&params).is_ok());
    }

    #[test]
    fn test_single_frame_gif_falls_back_to_still_decode() {
        let data = gif_bytes(1);
        let options = DecodeOptions::for_content_type(ContentType::Gif);
        let decoded = Image::decode(&data, ContentType::Gif, options).unwrap();
        assert!(decoded.is_animated());
        assert_eq!(decoded.pages(), 1);

        let (image, options) =
            OutputFormatter::resolve_animation(decoded, &data, ContentType::Gif, options).unwrap();
        assert!(!options.animated);
        assert!(!options.fail_on_error);
        assert!(!image.is_animated());
        assert_eq!(image.pages(), 1);
    }

    #[test]
    fn test_multi_frame_gif_stays_animated() {
        let data = gif_bytes(3);
        let options = DecodeOptions::for_content_type(ContentType::Gif);
        let decoded = Image::decode(&data, ContentType::Gif, options).unwrap();

        let (image, resolved) =
            OutputFormatter::resolve_animation(decoded, &data, ContentType::Gif, options).unwrap();
        assert_eq!(resolved, options);
        assert!(resolved.animated);
        assert!(image.is_animated());
        assert_eq!(image.pages(), 3);
    }

    #[test]
    fn test_still_source_keeps_options() {
        let data = gif_bytes(1);
        let options = DecodeOptions::for_content_type(ContentType::Gif).with_animated(false);
        let decoded = Image::decode(&data, ContentType::Gif, options).unwrap();

        let (image, resolved) =
            OutputFormatter::resolve_animation(decoded, &data, ContentType::Gif, options).unwrap();
        assert_eq!(resolved, options);
        assert!(!image.is_animated());
    }
}
