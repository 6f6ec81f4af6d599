mod helpers;

use helpers::*;
use image::{GenericImageView, ImageFormat};
use imagehandler_core::{
    ContentType, DimensionLimits, EditSet, ErrorMetadata, ImageFormatType, ImageRequest, OutputSelection,
    PipelineConfig,
};
use imagehandler_processing::ImagePipeline;
use serde_json::json;
use std::sync::Arc;

fn edits(value: serde_json::Value) -> EditSet {
    serde_json::from_value(value).unwrap()
}

fn output(format: ImageFormatType) -> OutputSelection {
    OutputSelection {
        format: Some(format),
        ..OutputSelection::default()
    }
}

fn pipeline() -> ImagePipeline {
    ImagePipeline::new(PipelineConfig::default())
}

#[tokio::test]
async fn test_png_without_selection_becomes_webp() {
    let request = ImageRequest::new(create_test_png(32, 16), ContentType::Png);
    let processed = pipeline().process(&request).await.unwrap();

    assert_eq!(processed.content_type, "image/webp");
    let body = decode_body(&processed);
    assert_eq!(image::guess_format(&body).unwrap(), ImageFormat::WebP);
    assert_eq!(decode_image(&processed).dimensions(), (32, 16));
}

#[tokio::test]
async fn test_jpeg_resize_by_width_keeps_aspect() {
    let request = ImageRequest::new(create_test_jpeg(200, 100), ContentType::Jpeg)
        .with_edits(edits(json!({"resize": {"width": 50}})))
        .with_output(output(ImageFormatType::Jpeg));
    let processed = pipeline().process(&request).await.unwrap();

    assert_eq!(processed.content_type, "image/jpeg");
    assert_eq!(decode_image(&processed).dimensions(), (50, 25));
}

#[tokio::test]
async fn test_resize_ratio_halves_both_sides() {
    let request = ImageRequest::new(create_test_png(200, 100), ContentType::Png)
        .with_edits(edits(json!({"resize": {"ratio": 0.5}})))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline().process(&request).await.unwrap();
    assert_eq!(decode_image(&processed).dimensions(), (100, 50));
}

#[tokio::test]
async fn test_oversized_resize_is_bad_request() {
    let request = ImageRequest::new(create_test_png(1, 1), ContentType::Png).with_edits(edits(
        json!({"resize": {"width": 40000, "height": 40000, "fit": "fill"}}),
    ));
    let err = pipeline().process(&request).await.unwrap_err();

    assert_eq!(err.http_status_code(), 400);
    assert_eq!(err.error_code(), "Resize::InvalidParameter");
}

#[tokio::test]
async fn test_configured_dimension_limits_apply() {
    let config = PipelineConfig::default().with_limits(DimensionLimits {
        max_dimension: 32,
        max_pixels: 32 * 32,
    });
    let pipeline = ImagePipeline::new(config);

    let too_big = ImageRequest::new(create_test_png(8, 8), ContentType::Png)
        .with_edits(edits(json!({"resize": {"width": 33}})));
    let err = pipeline.process(&too_big).await.unwrap_err();
    assert_eq!(err.error_code(), "Resize::InvalidParameter");

    let fits = ImageRequest::new(create_test_png(8, 8), ContentType::Png)
        .with_edits(edits(json!({"resize": {"width": 32}})))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline.process(&fits).await.unwrap();
    assert_eq!(decode_image(&processed).dimensions(), (32, 32));
}

#[tokio::test]
async fn test_crop_outside_image_is_bad_request() {
    let request = ImageRequest::new(create_test_png(100, 100), ContentType::Png).with_edits(edits(
        json!({"crop": {"left": 50, "top": 50, "width": 80, "height": 80}}),
    ));
    let err = pipeline().process(&request).await.unwrap_err();

    assert_eq!(err.http_status_code(), 400);
    assert_eq!(err.error_code(), "Crop::AreaOutOfBounds");
}

#[tokio::test]
async fn test_full_crop_succeeds() {
    let request = ImageRequest::new(create_test_png(100, 100), ContentType::Png)
        .with_edits(edits(
            json!({"crop": {"left": 0, "top": 0, "width": 100, "height": 100}}),
        ))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline().process(&request).await.unwrap();
    assert_eq!(decode_image(&processed).dimensions(), (100, 100));
}

#[tokio::test]
async fn test_round_crop_applies_after_resize() {
    // roundCrop listed first; resize still runs before it
    let request = ImageRequest::new(create_test_png(40, 40), ContentType::Png)
        .with_edits(edits(json!({"roundCrop": true, "resize": {"width": 20}})))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline().process(&request).await.unwrap();

    let img = decode_image(&processed).to_rgba8();
    assert_eq!(img.dimensions(), (20, 20));
    assert_eq!(img.get_pixel(0, 0)[3], 0);
    assert_eq!(img.get_pixel(10, 10)[3], 255);
}

#[tokio::test]
async fn test_unknown_edits_are_ignored() {
    let request = ImageRequest::new(create_test_png(24, 24), ContentType::Png)
        .with_edits(edits(json!({"sparkle": {"amount": 11}, "grayscale": true})))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline().process(&request).await.unwrap();
    assert_eq!(decode_image(&processed).dimensions(), (24, 24));
}

#[tokio::test]
async fn test_encoded_body_over_limit_is_too_large() {
    let pipeline = ImagePipeline::new(PipelineConfig::default().with_payload_limit(64));
    let request = ImageRequest::new(create_test_png(64, 64), ContentType::Png)
        .with_output(output(ImageFormatType::Tiff));
    let err = pipeline.process(&request).await.unwrap_err();

    assert_eq!(err.http_status_code(), 413);
    assert_eq!(err.error_code(), "TooLargeImageException");
    assert_eq!(err.client_message(), "The converted image is too large to return.");
}

#[tokio::test]
async fn test_heif_output_is_rejected() {
    let request = ImageRequest::new(create_test_png(8, 8), ContentType::Png)
        .with_output(output(ImageFormatType::Heic));
    let err = pipeline().process(&request).await.unwrap_err();
    assert_eq!(err.http_status_code(), 400);
    assert_eq!(err.error_code(), "OutputFormat::Unsupported");
}

#[tokio::test]
async fn test_webp_effort_out_of_range_is_rejected() {
    let request = ImageRequest::new(create_test_png(8, 8), ContentType::Png).with_output(
        OutputSelection {
            format: Some(ImageFormatType::Webp),
            effort: Some(9),
            quality: None,
        },
    );
    let err = pipeline().process(&request).await.unwrap_err();
    assert_eq!(err.error_code(), "Effort::InvalidParameter");
}

#[tokio::test]
async fn test_webp_with_effort_encodes() {
    let request = ImageRequest::new(create_test_png(8, 8), ContentType::Png).with_output(
        OutputSelection {
            format: Some(ImageFormatType::Webp),
            effort: Some(6),
            quality: Some(10),
        },
    );
    let processed = pipeline().process(&request).await.unwrap();
    assert_eq!(processed.content_type, "image/webp");
}

#[tokio::test]
async fn test_single_frame_gif_with_edits_is_processed_as_still() {
    let request = ImageRequest::new(create_test_gif(16, 16, 1), ContentType::Gif)
        .with_edits(edits(json!({"flop": true})))
        .with_output(output(ImageFormatType::Gif));
    let processed = pipeline().process(&request).await.unwrap();

    assert_eq!(processed.content_type, "image/gif");
    assert_eq!(gif_frame_count(&decode_body(&processed)), 1);
}

#[tokio::test]
async fn test_animated_gif_keeps_frames_through_edits() {
    let request = ImageRequest::new(create_test_gif(16, 16, 3), ContentType::Gif)
        .with_edits(edits(json!({"resize": {"width": 8}, "flip": true})))
        .with_output(output(ImageFormatType::Gif));
    let processed = pipeline().process(&request).await.unwrap();

    let body = decode_body(&processed);
    assert_eq!(gif_frame_count(&body), 3);
    assert_eq!(image::load_from_memory(&body).unwrap().dimensions(), (8, 8));
}

#[tokio::test]
async fn test_animated_gif_without_edits_keeps_frames() {
    let request = ImageRequest::new(create_test_gif(8, 8, 2), ContentType::Gif)
        .with_output(output(ImageFormatType::Gif));
    let processed = pipeline().process(&request).await.unwrap();
    assert_eq!(gif_frame_count(&decode_body(&processed)), 2);
}

#[tokio::test]
async fn test_animated_gif_to_png_uses_first_frame() {
    let request = ImageRequest::new(create_test_gif(8, 8, 2), ContentType::Gif)
        .with_edits(edits(json!({"grayscale": false})))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline().process(&request).await.unwrap();
    assert_eq!(decode_image(&processed).dimensions(), (8, 8));
}

#[tokio::test]
async fn test_svg_source_is_rasterised() {
    let request = ImageRequest::new(create_test_svg(10, 6), ContentType::Svg)
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline().process(&request).await.unwrap();

    let img = decode_image(&processed).to_rgba8();
    assert_eq!(img.dimensions(), (10, 6));
    assert_eq!(img.get_pixel(5, 3).0, [255, 0, 0, 255]);
}

#[tokio::test]
async fn test_moderation_blurs_listed_label() {
    let detector = Arc::new(MockModerationDetector::new(&["Violence"]));
    let pipeline = pipeline().with_moderation_detector(detector.clone());

    let original = image::load_from_memory(&create_test_png(21, 21)).unwrap().to_rgba8();
    let request = ImageRequest::new(create_test_png(21, 21), ContentType::Png)
        .with_edits(edits(
            json!({"contentModeration": {"blur": 4, "moderationLabels": ["Violence"]}}),
        ))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline.process(&request).await.unwrap();

    assert_eq!(detector.calls(), 1);
    assert_ne!(decode_image(&processed).to_rgba8(), original);
}

#[tokio::test]
async fn test_moderation_ignores_unlisted_label() {
    let detector = Arc::new(MockModerationDetector::new(&["Violence"]));
    let pipeline = pipeline().with_moderation_detector(detector.clone());

    let original = image::load_from_memory(&create_test_png(21, 21)).unwrap().to_rgba8();
    let request = ImageRequest::new(create_test_png(21, 21), ContentType::Png)
        .with_edits(edits(
            json!({"contentModeration": {"blur": 4, "moderationLabels": ["Nudity"]}}),
        ))
        .with_output(output(ImageFormatType::Png));
    let processed = pipeline.process(&request).await.unwrap();

    assert_eq!(detector.calls(), 1);
    assert_eq!(decode_image(&processed).to_rgba8(), original);
}

#[tokio::test]
async fn test_moderation_disabled_skips_detector() {
    let detector = Arc::new(MockModerationDetector::new(&["Violence"]));
    let pipeline = pipeline().with_moderation_detector(detector.clone());

    let request = ImageRequest::new(create_test_png(8, 8), ContentType::Png)
        .with_edits(edits(json!({"contentModeration": false})));
    pipeline.process(&request).await.unwrap();

    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_overlay_at_origin() {
    let source = Arc::new(MockOverlaySource::solid("assets", "logo.png", 10, 10, [255, 0, 0, 255]));
    let pipeline = pipeline().with_overlay_source(source);

    let request = ImageRequest::new(create_test_png(40, 40), ContentType::Png)
        .with_edits(edits(json!({"overlayWith": {
            "bucket": "assets",
            "key": "logo.png",
            "options": {"left": "0", "top": "0"}
        }})))
        .with_output(output(ImageFormatType::Png));
    let img = decode_image(&pipeline.process(&request).await.unwrap()).to_rgba8();

    assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(39, 39).0, [0, 0, 0, 255]);
}

#[tokio::test]
async fn test_overlay_scaled_and_centred() {
    let source = Arc::new(MockOverlaySource::solid("assets", "logo.png", 10, 10, [255, 0, 0, 255]));
    let pipeline = pipeline().with_overlay_source(source);

    let request = ImageRequest::new(create_test_png(40, 40), ContentType::Png)
        .with_edits(edits(json!({"overlayWith": {
            "bucket": "assets",
            "key": "logo.png",
            "wRatio": 50,
            "hRatio": 50
        }})))
        .with_output(output(ImageFormatType::Png));
    let img = decode_image(&pipeline.process(&request).await.unwrap()).to_rgba8();

    // 20x20 overlay centred at (10, 10)
    assert!(img.get_pixel(15, 15)[0] > 200);
    assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0, 255]);
}

#[tokio::test]
async fn test_missing_overlay_is_internal_error() {
    let source = Arc::new(MockOverlaySource::solid("assets", "logo.png", 10, 10, [255, 0, 0, 255]));
    let pipeline = pipeline().with_overlay_source(source);

    let request = ImageRequest::new(create_test_png(40, 40), ContentType::Png).with_edits(edits(
        json!({"overlayWith": {"bucket": "assets", "key": "missing.png"}}),
    ));
    let err = pipeline.process(&request).await.unwrap_err();

    assert_eq!(err.http_status_code(), 500);
    assert_eq!(err.error_code(), "Overlay::Unavailable");
}
