//! Native pass-through operations
//!
//! Edit keys other than the ones with dedicated operators map onto this closed
//! set. Names outside it are not errors; the dispatcher skips them.

use super::handle::{Dimensions, Image};
use super::orientation::ImageOrientation;
use image::{imageops, DynamicImage, GenericImageView, LumaA, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imagehandler_core::{loose_number, Color, ImageHandlerError};
use serde_json::Value;

const MIN_BLUR_SIGMA: f64 = 0.3;
const MAX_BLUR_SIGMA: f64 = 1000.0;
const MAX_SHARPEN_SIGMA: f64 = 10.0;
const DEFAULT_SHARPEN_SIGMA: f32 = 0.5;
const DEFAULT_THRESHOLD: u8 = 128;
const DEFAULT_MEDIAN_SIZE: u32 = 3;
const MAX_MEDIAN_SIZE: u32 = 1000;
/// Above this sigma the box-blur approximation is used
const FAST_BLUR_SIGMA: f32 = 10.0;

/// Names accepted as native operations (aliases included)
pub const SUPPORTED_OPERATIONS: &[&str] = &[
    "rotate",
    "flip",
    "flop",
    "sharpen",
    "blur",
    "grayscale",
    "greyscale",
    "negate",
    "normalise",
    "normalize",
    "tint",
    "flatten",
    "threshold",
    "median",
];

#[derive(Debug, Clone, PartialEq)]
pub enum NativeOperation {
    /// Degrees clockwise; `None` applies the EXIF orientation
    Rotate(Option<f64>),
    /// Mirror about the horizontal axis (upside down)
    Flip,
    /// Mirror about the vertical axis
    Flop,
    Sharpen { sigma: f32 },
    /// Gaussian sigma; `None` is a mild 3x3 box blur
    Blur(Option<f32>),
    Grayscale,
    Negate,
    Normalise,
    Tint(Color),
    Flatten(Color),
    Threshold(u8),
    Median(u32),
}

impl NativeOperation {
    pub fn is_supported(name: &str) -> bool {
        SUPPORTED_OPERATIONS.contains(&name)
    }

    /// Parse the parameters of a supported operation.
    ///
    /// `Ok(None)` means the operation is disabled (`false`) or `name` is unknown.
    pub fn parse(name: &str, value: &Value) -> Result<Option<Self>, ImageHandlerError> {
        if !Self::is_supported(name) || matches!(value, Value::Bool(false)) {
            return Ok(None);
        }

        let invalid = |detail: &str| ImageHandlerError::invalid_parameter(name, detail);

        let operation = match name {
            "rotate" => match value {
                Value::Null | Value::Bool(true) => NativeOperation::Rotate(None),
                other => {
                    let angle = loose_number(other)
                        .filter(|a| a.is_finite())
                        .ok_or_else(|| invalid("expected an angle in degrees"))?;
                    NativeOperation::Rotate(Some(angle))
                }
            },
            "flip" => NativeOperation::Flip,
            "flop" => NativeOperation::Flop,
            "grayscale" | "greyscale" => NativeOperation::Grayscale,
            "negate" => NativeOperation::Negate,
            "normalise" | "normalize" => NativeOperation::Normalise,
            "sharpen" => {
                let sigma = match value {
                    Value::Null | Value::Bool(true) => None,
                    Value::Object(fields) => fields.get("sigma").and_then(loose_number),
                    other => Some(
                        loose_number(other).ok_or_else(|| invalid("expected a sigma"))?,
                    ),
                };
                match sigma {
                    None => NativeOperation::Sharpen {
                        sigma: DEFAULT_SHARPEN_SIGMA,
                    },
                    Some(s) if s > 0.0 && s <= MAX_SHARPEN_SIGMA => {
                        NativeOperation::Sharpen { sigma: s as f32 }
                    }
                    Some(_) => return Err(invalid("sigma must be between 0 and 10")),
                }
            }
            "blur" => match value {
                Value::Null | Value::Bool(true) => NativeOperation::Blur(None),
                other => {
                    let sigma = loose_number(other)
                        .filter(|s| (MIN_BLUR_SIGMA..=MAX_BLUR_SIGMA).contains(s))
                        .ok_or_else(|| invalid("sigma must be between 0.3 and 1000"))?;
                    NativeOperation::Blur(Some(sigma as f32))
                }
            },
            "tint" => NativeOperation::Tint(
                parse_color(value).ok_or_else(|| invalid("expected a colour"))?,
            ),
            "flatten" => {
                let background = match value {
                    Value::Null | Value::Bool(true) => Some(Color::BLACK),
                    Value::Object(fields) => match fields.get("background") {
                        None => Some(Color::BLACK),
                        Some(background) => parse_color(background),
                    },
                    _ => None,
                };
                NativeOperation::Flatten(
                    background.ok_or_else(|| invalid("expected a background colour"))?,
                )
            }
            "threshold" => match value {
                Value::Null | Value::Bool(true) => NativeOperation::Threshold(DEFAULT_THRESHOLD),
                other => {
                    let level = loose_number(other)
                        .filter(|l| (0.0..=255.0).contains(l))
                        .ok_or_else(|| invalid("threshold must be between 0 and 255"))?;
                    NativeOperation::Threshold(level as u8)
                }
            },
            "median" => match value {
                Value::Null | Value::Bool(true) => NativeOperation::Median(DEFAULT_MEDIAN_SIZE),
                other => {
                    let size = loose_number(other)
                        .filter(|s| *s >= 1.0 && *s <= MAX_MEDIAN_SIZE as f64)
                        .ok_or_else(|| invalid("size must be between 1 and 1000"))?;
                    NativeOperation::Median(size as u32)
                }
            },
            _ => return Ok(None),
        };

        Ok(Some(operation))
    }

    /// Canvas allocated for a `source`-sized frame by operations that change
    /// the frame size; `None` for the rest
    pub fn canvas_dimensions(&self, source: Dimensions) -> Option<Dimensions> {
        match *self {
            NativeOperation::Rotate(Some(angle)) => {
                let (width, height) = rotated_canvas(source.width, source.height, angle);
                Some(Dimensions::new(width, height))
            }
            _ => None,
        }
    }

    pub fn apply(self, image: Image) -> Image {
        tracing::debug!(operation = ?self, "Applying native operation");

        match self {
            NativeOperation::Rotate(None) => {
                let orientation = image.orientation();
                let mut rotated = image.map_frames(|frame| {
                    ImageOrientation::apply_exif_orientation(frame, orientation)
                });
                rotated.set_orientation(1);
                rotated
            }
            NativeOperation::Rotate(Some(angle)) => {
                image.map_frames(|frame| rotate_by_degrees(frame, angle))
            }
            NativeOperation::Flip => image.map_frames(|frame| frame.flipv()),
            NativeOperation::Flop => image.map_frames(|frame| frame.fliph()),
            NativeOperation::Sharpen { sigma } => {
                image.map_frames(|frame| frame.unsharpen(sigma, 0))
            }
            NativeOperation::Blur(None) => {
                image.map_frames(|frame| frame.filter3x3(&[1.0 / 9.0; 9]))
            }
            NativeOperation::Blur(Some(sigma)) => {
                image.map_frames(|frame| gaussian_blur(&frame, sigma))
            }
            NativeOperation::Grayscale => image.map_frames(|frame| frame.grayscale()),
            NativeOperation::Negate => image.map_frames(|mut frame| {
                frame.invert();
                frame
            }),
            NativeOperation::Normalise => image.map_frames(normalise),
            NativeOperation::Tint(color) => image.map_frames(|frame| tint(frame, color)),
            NativeOperation::Flatten(background) => {
                image.map_frames(|frame| flatten(frame, background))
            }
            NativeOperation::Threshold(level) => {
                image.map_frames(|frame| threshold(frame, level))
            }
            NativeOperation::Median(size) => image.map_frames(|frame| {
                let radius = size / 2;
                let filtered = imageproc::filter::median_filter(&frame.to_rgba8(), radius, radius);
                DynamicImage::ImageRgba8(filtered)
            }),
        }
    }
}

/// Gaussian blur; large sigmas fall back to the box-blur approximation
pub fn gaussian_blur(img: &DynamicImage, sigma: f32) -> DynamicImage {
    if sigma > FAST_BLUR_SIGMA {
        img.fast_blur(sigma)
    } else {
        img.blur(sigma)
    }
}

/// Bounding box of a `width`x`height` frame rotated by `angle` degrees
fn rotated_canvas(width: u32, height: u32, angle: f64) -> (u32, u32) {
    let normalized = angle.rem_euclid(360.0);
    if normalized % 180.0 == 0.0 {
        return (width, height);
    }
    if normalized % 90.0 == 0.0 {
        return (height, width);
    }
    let theta = normalized.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    (
        (width as f64 * cos + height as f64 * sin).ceil() as u32,
        (width as f64 * sin + height as f64 * cos).ceil() as u32,
    )
}

/// Rotate clockwise by any angle. Right angles are exact; other angles expand
/// the canvas to fit and fill the corners with black.
fn rotate_by_degrees(img: DynamicImage, angle: f64) -> DynamicImage {
    let normalized = angle.rem_euclid(360.0);
    if normalized == 0.0 {
        return img;
    }
    if normalized % 90.0 == 0.0 {
        return ImageOrientation::rotate_by_angle(img, normalized as u16);
    }

    let (width, height) = img.dimensions();
    let theta = normalized.to_radians();
    let (canvas_width, canvas_height) = rotated_canvas(width, height, normalized);

    let background = Rgba([0, 0, 0, 255]);
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, background);
    imageops::replace(
        &mut canvas,
        &img.to_rgba8(),
        (canvas_width as i64 - width as i64) / 2,
        (canvas_height as i64 - height as i64) / 2,
    );

    DynamicImage::ImageRgba8(rotate_about_center(
        &canvas,
        theta as f32,
        Interpolation::Bilinear,
        background,
    ))
}

/// Stretch luminance-independent channel values to the full 0-255 range
fn normalise(img: DynamicImage) -> DynamicImage {
    let mut rgba = img.to_rgba8();
    let (mut min, mut max) = (u8::MAX, u8::MIN);
    for pixel in rgba.pixels() {
        for &channel in &pixel.0[..3] {
            min = min.min(channel);
            max = max.max(channel);
        }
    }
    if max <= min {
        return DynamicImage::ImageRgba8(rgba);
    }

    let range = (max - min) as f32;
    for pixel in rgba.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = ((*channel - min) as f32 * 255.0 / range).round() as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Keep each pixel's luma and take the chroma of `color` (YCbCr)
fn tint(img: DynamicImage, color: Color) -> DynamicImage {
    let (tr, tg, tb) = (color.r as f32, color.g as f32, color.b as f32);
    let cb = -0.168_736 * tr - 0.331_264 * tg + 0.5 * tb;
    let cr = 0.5 * tr - 0.418_688 * tg - 0.081_312 * tb;

    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        pixel[0] = (y + 1.402 * cr).round().clamp(0.0, 255.0) as u8;
        pixel[1] = (y - 0.344_136 * cb - 0.714_136 * cr).round().clamp(0.0, 255.0) as u8;
        pixel[2] = (y + 1.772 * cb).round().clamp(0.0, 255.0) as u8;
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Merge the alpha channel onto a solid background
fn flatten(img: DynamicImage, background: Color) -> DynamicImage {
    let [br, bg, bb, _] = background.to_rgba();
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let flattened = RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let mix = |fg: u8, bg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;
        Rgb([mix(r, br), mix(g, bg), mix(b, bb)])
    });
    DynamicImage::ImageRgb8(flattened)
}

/// Luma at or above `level` becomes white, everything else black; alpha is kept
fn threshold(img: DynamicImage, level: u8) -> DynamicImage {
    let mut luma = img.to_luma_alpha8();
    for pixel in luma.pixels_mut() {
        let LumaA([value, alpha]) = *pixel;
        *pixel = LumaA([if value >= level { 255 } else { 0 }, alpha]);
    }
    DynamicImage::ImageLumaA8(luma)
}

/// `{r,g,b}` objects or `#rrggbb` / `#rgb` strings
fn parse_color(value: &Value) -> Option<Color> {
    match value {
        Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        Value::String(text) => {
            let hex = text.trim().strip_prefix('#')?;
            let expanded: String = match hex.len() {
                3 => hex.chars().flat_map(|c| [c, c]).collect(),
                6 => hex.to_string(),
                _ => return None,
            };
            let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
            Some(Color {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                alpha: 1.0,
            })
        }
        _ => None,
    }
}
