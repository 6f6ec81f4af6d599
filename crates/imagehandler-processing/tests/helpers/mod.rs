//! Shared fixtures and collaborator doubles for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use image::codecs::gif::GifEncoder;
use image::{AnimationDecoder, Delay, DynamicImage, Frame, ImageFormat, Rgba, RgbaImage};
use imagehandler_core::{ModerationLabel, ModerationResult, ProcessedImage};
use imagehandler_processing::{ModerationDetector, OverlaySource};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

fn encode(img: RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .expect("encode fixture");
    buffer
}

/// Solid PNG with a single white pixel in the middle
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    img.put_pixel(width / 2, height / 2, Rgba([255, 255, 255, 255]));
    encode(img, ImageFormat::Png)
}

pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(
        RgbaImage::from_pixel(width, height, Rgba([120, 60, 30, 255])),
        ImageFormat::Jpeg,
    )
}

/// GIF with `frames` frames, each a different solid colour
pub fn create_test_gif(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        let frames = (0..frames).map(|i| {
            let shade = (i * 60 % 256) as u8;
            Frame::from_parts(
                RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            )
        });
        encoder.encode_frames(frames).expect("encode gif fixture");
    }
    buffer
}

pub fn create_test_svg(width: u32, height: u32) -> Vec<u8> {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}"><rect width="{w}" height="{h}" fill="red"/></svg>"#,
        w = width,
        h = height
    )
    .into_bytes()
}

/// Decode the base64 body of a pipeline result
pub fn decode_body(processed: &ProcessedImage) -> Vec<u8> {
    general_purpose::STANDARD
        .decode(&processed.body)
        .expect("body is base64")
}

pub fn decode_image(processed: &ProcessedImage) -> DynamicImage {
    image::load_from_memory(&decode_body(processed)).expect("body is an image")
}

pub fn gif_frame_count(data: &[u8]) -> usize {
    image::codecs::gif::GifDecoder::new(Cursor::new(data))
        .expect("gif decoder")
        .into_frames()
        .count()
}

/// Returns a fixed set of labels and counts calls
pub struct MockModerationDetector {
    labels: Vec<String>,
    calls: AtomicUsize,
}

impl MockModerationDetector {
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModerationDetector for MockModerationDetector {
    async fn detect_moderation_labels(
        &self,
        _image: &[u8],
        _min_confidence: Option<f32>,
    ) -> Result<ModerationResult, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModerationResult::new(
            self.labels
                .iter()
                .map(|name| ModerationLabel::new(name.clone(), 97.5))
                .collect(),
        ))
    }
}

/// Serves a solid-colour PNG for `bucket/key`, fails for anything else
pub struct MockOverlaySource {
    pub bucket: String,
    pub key: String,
    pub overlay: Vec<u8>,
}

impl MockOverlaySource {
    pub fn solid(bucket: &str, key: &str, width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            overlay: encode(
                RgbaImage::from_pixel(width, height, Rgba(color)),
                ImageFormat::Png,
            ),
        }
    }
}

#[async_trait]
impl OverlaySource for MockOverlaySource {
    async fn fetch_overlay(&self, bucket: &str, key: &str) -> Result<Bytes, anyhow::Error> {
        if bucket == self.bucket && key == self.key {
            Ok(Bytes::from(self.overlay.clone()))
        } else {
            anyhow::bail!("NoSuchKey: {}/{}", bucket, key)
        }
    }
}
