use crate::image::Image;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{DynamicImage, GenericImageView, ImageFormat};
use imagehandler_core::ImageFormatType;
use std::io::Cursor;

/// Quality used when a lossy format is selected without one
const DEFAULT_WEBP_QUALITY: u8 = 80;
const DEFAULT_WEBP_METHOD: u8 = 4;
const DEFAULT_JPEG_QUALITY: u8 = 80;
const DEFAULT_AVIF_QUALITY: u8 = 50;
const AVIF_SPEED: u8 = 6;

/// Resolved encoder parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: ImageFormatType,
    /// 1-100; `None` leaves the encoder default
    pub quality: Option<u8>,
    /// WEBP method 0-6
    pub effort: Option<u8>,
}

impl EncodeParams {
    pub fn new(format: ImageFormatType) -> Self {
        Self {
            format,
            quality: None,
            effort: None,
        }
    }
}

/// Main compression service
pub struct ImageCompressor;

impl ImageCompressor {
    /// Whether the format has an encoder
    pub fn supports(format: ImageFormatType) -> bool {
        !matches!(format, ImageFormatType::Heif | ImageFormatType::Heic)
    }

    /// Encode an image handle. Only GIF keeps every frame of an animation;
    /// other formats encode the first frame.
    pub fn encode(image: &Image, params: &EncodeParams) -> Result<Bytes> {
        let first = image.first_frame();

        tracing::debug!(
            format = %params.format,
            quality = ?params.quality,
            effort = ?params.effort,
            pages = image.pages(),
            "Encoding image"
        );

        match params.format {
            ImageFormatType::Webp => Self::compress_webp(first, params),
            ImageFormatType::Jpg | ImageFormatType::Jpeg => {
                Self::compress_jpeg(first, params.quality.unwrap_or(DEFAULT_JPEG_QUALITY))
            }
            ImageFormatType::Png => Self::write_with(first, ImageFormat::Png),
            ImageFormatType::Tiff => Self::write_with(first, ImageFormat::Tiff),
            ImageFormatType::Gif => Self::compress_gif(image),
            ImageFormatType::Avif => {
                Self::compress_avif(first, params.quality.unwrap_or(DEFAULT_AVIF_QUALITY))
            }
            ImageFormatType::Raw => Ok(Bytes::from(first.to_rgba8().into_raw())),
            ImageFormatType::Heif | ImageFormatType::Heic => {
                Err(anyhow!("No encoder available for {}", params.format))
            }
        }
    }

    fn write_with(img: &DynamicImage, format: ImageFormat) -> Result<Bytes> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        img.write_to(&mut cursor, format)?;
        Ok(Bytes::from(buffer))
    }

    /// Compress to WebP with explicit quality and method
    fn compress_webp(img: &DynamicImage, params: &EncodeParams) -> Result<Bytes> {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let mut config =
            webp::WebPConfig::new().map_err(|_| anyhow!("Failed to initialise WebP config"))?;
        config.quality = params.quality.unwrap_or(DEFAULT_WEBP_QUALITY) as f32;
        config.method = params.effort.unwrap_or(DEFAULT_WEBP_METHOD) as i32;

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_advanced(&config)
            .map_err(|e| anyhow!("WebP encoding failed: {:?}", e))?;

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    /// Compress to JPEG using mozjpeg
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        let jpeg_data = comp.finish()?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Compress to GIF, one GIF frame per handle frame
    fn compress_gif(image: &Image) -> Result<Bytes> {
        let mut buffer = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buffer);
            if image.pages() > 1 {
                encoder.set_repeat(Repeat::Infinite)?;
            }
            let frames = image.frames().iter().map(|frame| {
                image::Frame::from_parts(frame.image.to_rgba8(), 0, 0, frame.delay)
            });
            encoder.encode_frames(frames)?;
        }
        Ok(Bytes::from(buffer))
    }

    /// Compress to AVIF
    fn compress_avif(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let (width, height) = img.dimensions();

        let rgba_img = img.to_rgba8();
        let rgba_data: Vec<rgb::RGBA8> = rgba_img
            .as_raw()
            .chunks_exact(4)
            .map(|chunk| rgb::RGBA8::new(chunk[0], chunk[1], chunk[2], chunk[3]))
            .collect();

        let img_buf = ravif::Img::new(rgba_data.as_slice(), width as usize, height as usize);

        let encoder = ravif::Encoder::new()
            .with_quality(quality as f32)
            .with_speed(AVIF_SPEED);

        let avif_data = encoder.encode_rgba(img_buf)?;

        Ok(Bytes::copy_from_slice(&avif_data.avif_file))
    }
}
