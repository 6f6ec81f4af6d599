//! Overlay placement and compositing

use super::handle::Image;
use super::resize::ImageResize;
use image::{imageops, DynamicImage, GenericImageView, ImageReader};
use imagehandler_core::{keys, DimensionLimits, Fit, ImageHandlerError, OverlaySpec, ResizeSpec};
use std::io::Cursor;

/// Resolves one axis of an overlay offset
pub struct OverlayOffsetCalculator;

impl OverlayOffsetCalculator {
    /// Resolve a textual offset along one axis.
    ///
    /// `"25p"` is a percentage of `image_size`, `"-25p"` the same measured from the
    /// far edge and inset by the overlay. Plain integers are pixels, negative ones
    /// anchored at the far edge. Returns `None` when the offset is absent or does
    /// not start with an integer; callers then use their default placement.
    pub fn calculate(spec: Option<&str>, image_size: u32, overlay_size: u32) -> Option<i64> {
        let spec = spec?;
        let image_size = image_size as f64;
        let overlay_size = overlay_size as f64;

        if spec.ends_with('p') {
            let percent = parse_leading_int(&spec.replacen('p', "", 1))? as f64;
            let offset = if percent < 0.0 {
                image_size + (image_size * percent) / 100.0 - overlay_size
            } else {
                (image_size * percent) / 100.0
            };
            Some(offset.floor() as i64)
        } else {
            let literal = parse_leading_int(spec)?;
            if literal < 0 {
                Some(
                    (image_size as i64)
                        .saturating_add(literal)
                        .saturating_sub(overlay_size as i64),
                )
            } else {
                Some(literal)
            }
        }
    }
}

/// Integer prefix of a string: optional whitespace, optional sign, digits.
/// Trailing characters are ignored.
fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Composites a secondary image onto every frame
pub struct Overlay;

impl Overlay {
    /// Overlay size on one axis: `floor(base * ratio / 100)` for ratios in 0..=100
    fn scaled_size(base: u32, ratio: Option<f64>) -> Option<f64> {
        ratio
            .filter(|r| (0.0..=100.0).contains(r))
            .map(|r| (base as f64 * r / 100.0).floor())
            .filter(|size| *size >= 1.0)
    }

    /// Transparency percentage in 0..=100, anything else is 0
    fn opacity(alpha: Option<f64>) -> f32 {
        let transparency = alpha.filter(|a| (0.0..=100.0).contains(a)).unwrap_or(0.0);
        (1.0 - transparency / 100.0) as f32
    }

    /// Composite the overlay onto every frame. A scaled overlay larger than
    /// `limits` is a client error; undecodable overlay bytes are not.
    pub fn apply(
        image: Image,
        overlay_data: &[u8],
        spec: &OverlaySpec,
        limits: &DimensionLimits,
    ) -> Result<Image, ImageHandlerError> {
        let base = image.dimensions();

        let decoded = ImageReader::new(Cursor::new(overlay_data))
            .with_guessed_format()
            .map_err(|e| ImageHandlerError::decode(e.into()))?
            .decode()
            .map_err(|e| ImageHandlerError::decode(e.into()))?;

        let target = ResizeSpec {
            width: Self::scaled_size(base.width, spec.w_ratio),
            height: Self::scaled_size(base.height, spec.h_ratio),
            fit: Some(Fit::Inside),
            ..ResizeSpec::default()
        };
        let mut overlay = ImageResize::apply_within(Image::from_dynamic(decoded), &target, limits)
            .map_err(|e| ImageHandlerError::invalid_parameter(keys::OVERLAY_WITH, e))?
            .into_first_frame()
            .to_rgba8();

        let opacity = Self::opacity(spec.alpha);
        if opacity < 1.0 {
            for pixel in overlay.pixels_mut() {
                pixel[3] = (pixel[3] as f32 * opacity) as u8;
            }
        }

        let (overlay_width, overlay_height) = overlay.dimensions();
        let left = OverlayOffsetCalculator::calculate(
            spec.options.left.as_deref(),
            base.width,
            overlay_width,
        )
        .unwrap_or((base.width as i64 - overlay_width as i64) / 2);
        let top = OverlayOffsetCalculator::calculate(
            spec.options.top.as_deref(),
            base.height,
            overlay_height,
        )
        .unwrap_or((base.height as i64 - overlay_height as i64) / 2);

        tracing::debug!(
            bucket = %spec.bucket,
            key = %spec.key,
            left = left,
            top = top,
            width = overlay_width,
            height = overlay_height,
            opacity = opacity,
            "Applying overlay"
        );

        Ok(image.map_frames(|frame| {
            let mut rgba = frame.to_rgba8();
            imageops::overlay(&mut rgba, &overlay, left, top);
            DynamicImage::ImageRgba8(rgba)
        }))
    }
}
