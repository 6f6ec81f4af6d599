//! Resize normalization and the resize primitive
//!
//! [`GeometryNormalizer`] resolves a requested [`ResizeSpec`] into absolute pixel
//! values; [`ImageResize`] turns the resolved spec into a [`ResizePlan`] and
//! applies it to every frame.

use super::handle::{Dimensions, Image};
use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use imagehandler_core::{Color, DimensionLimits, Fit, Position, ResizeSpec};

/// JavaScript-style `Math.round`: halves round towards positive infinity
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Present, finite and non-zero
fn provided(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

pub struct GeometryNormalizer;

impl GeometryNormalizer {
    /// Resolve a requested resize against the source's natural size.
    ///
    /// Never fails; the result never carries a `ratio`.
    pub fn normalize(spec: Option<&ResizeSpec>, source: Dimensions) -> ResizeSpec {
        let Some(spec) = spec else {
            return ResizeSpec {
                fit: Some(Fit::Inside),
                ..ResizeSpec::default()
            };
        };

        let mut resolved = spec.clone();
        if let Some(width) = provided(resolved.width) {
            resolved.width = Some(round_half_up(width));
        }
        if let Some(height) = provided(resolved.height) {
            resolved.height = Some(round_half_up(height));
        }

        if let Some(ratio) = provided(resolved.ratio.take()) {
            let (base_width, base_height) =
                match (provided(resolved.width), provided(resolved.height)) {
                    (Some(width), Some(height)) => (width, height),
                    _ => (source.width as f64, source.height as f64),
                };
            resolved.width = Some(round_half_up(base_width * ratio));
            resolved.height = Some(round_half_up(base_height * ratio));
            if resolved.fit.is_none() {
                resolved.fit = Some(Fit::Inside);
            }
        }

        if resolved.position.is_none() && resolved.fit.is_some_and(Fit::uses_position) {
            resolved.position = Some(Position::Centre);
        }

        resolved
    }
}

/// Geometry of one resize, computed once and applied to every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    Unchanged,
    Scale {
        width: u32,
        height: u32,
    },
    /// Scale, then extract `crop_width`x`crop_height` at (`left`, `top`)
    ScaleAndCrop {
        width: u32,
        height: u32,
        crop_width: u32,
        crop_height: u32,
        left: u32,
        top: u32,
    },
    /// Scale, then place on a `canvas_width`x`canvas_height` background at (`left`, `top`)
    ScaleAndEmbed {
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
        left: u32,
        top: u32,
    },
}

impl ResizePlan {
    /// Largest buffer the plan allocates, `None` when it allocates nothing
    pub fn working_dimensions(&self) -> Option<Dimensions> {
        match *self {
            ResizePlan::Unchanged => None,
            ResizePlan::Scale { width, height } | ResizePlan::ScaleAndCrop { width, height, .. } => {
                Some(Dimensions::new(width, height))
            }
            ResizePlan::ScaleAndEmbed {
                canvas_width,
                canvas_height,
                ..
            } => Some(Dimensions::new(canvas_width, canvas_height)),
        }
    }
}

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Work out the resize geometry for a normalized spec.
    ///
    /// Non-positive width/height count as absent; an absent `fit` behaves as cover.
    pub fn plan(source: Dimensions, spec: &ResizeSpec) -> ResizePlan {
        if source.width == 0 || source.height == 0 {
            return ResizePlan::Unchanged;
        }

        let width = spec.width.filter(|w| *w >= 1.0).map(round_half_up);
        let height = spec.height.filter(|h| *h >= 1.0).map(round_half_up);
        let fit = spec.fit.unwrap_or(Fit::Cover);
        let (orig_width, orig_height) = (source.width as f64, source.height as f64);

        let (scale_x, scale_y) = match (width, height) {
            (None, None) => return ResizePlan::Unchanged,
            (Some(w), None) => (w / orig_width, w / orig_width),
            (None, Some(h)) => (h / orig_height, h / orig_height),
            (Some(w), Some(h)) => {
                let (rx, ry) = (w / orig_width, h / orig_height);
                match fit {
                    Fit::Fill => (rx, ry),
                    Fit::Inside | Fit::Contain => (rx.min(ry), rx.min(ry)),
                    Fit::Outside | Fit::Cover => (rx.max(ry), rx.max(ry)),
                }
            }
        };

        let (scale_x, clamped_x) = Self::guard_scale(scale_x, spec);
        let (scale_y, clamped_y) = Self::guard_scale(scale_y, spec);
        let clamped = clamped_x || clamped_y;

        let scaled_width = round_half_up(orig_width * scale_x).max(1.0) as u32;
        let scaled_height = round_half_up(orig_height * scale_y).max(1.0) as u32;
        let (anchor_x, anchor_y) = spec.position.unwrap_or(Position::Centre).anchor();

        let plan = match (width, height, fit) {
            (Some(w), Some(h), Fit::Cover) => {
                let crop_width = (w as u32).min(scaled_width);
                let crop_height = (h as u32).min(scaled_height);
                if crop_width == scaled_width && crop_height == scaled_height {
                    ResizePlan::Scale {
                        width: scaled_width,
                        height: scaled_height,
                    }
                } else {
                    ResizePlan::ScaleAndCrop {
                        width: scaled_width,
                        height: scaled_height,
                        crop_width,
                        crop_height,
                        left: Self::offset(scaled_width - crop_width, anchor_x),
                        top: Self::offset(scaled_height - crop_height, anchor_y),
                    }
                }
            }
            (Some(w), Some(h), Fit::Contain) if !clamped => {
                let canvas_width = (w as u32).max(scaled_width);
                let canvas_height = (h as u32).max(scaled_height);
                if canvas_width == scaled_width && canvas_height == scaled_height {
                    ResizePlan::Scale {
                        width: scaled_width,
                        height: scaled_height,
                    }
                } else {
                    ResizePlan::ScaleAndEmbed {
                        width: scaled_width,
                        height: scaled_height,
                        canvas_width,
                        canvas_height,
                        left: Self::offset(canvas_width - scaled_width, anchor_x),
                        top: Self::offset(canvas_height - scaled_height, anchor_y),
                    }
                }
            }
            _ => ResizePlan::Scale {
                width: scaled_width,
                height: scaled_height,
            },
        };

        match plan {
            ResizePlan::Scale { width, height }
                if width == source.width && height == source.height =>
            {
                ResizePlan::Unchanged
            }
            other => other,
        }
    }

    /// Clamp a scale factor to 1 when `withoutEnlargement`/`withoutReduction` forbid it
    fn guard_scale(scale: f64, spec: &ResizeSpec) -> (f64, bool) {
        if spec.without_enlargement == Some(true) && scale > 1.0 {
            (1.0, true)
        } else if spec.without_reduction == Some(true) && scale < 1.0 {
            (1.0, true)
        } else {
            (scale, false)
        }
    }

    fn offset(free: u32, anchor: f64) -> u32 {
        (free as f64 * anchor).floor() as u32
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            imageops::FilterType::CatmullRom
        } else {
            imageops::FilterType::Lanczos3
        }
    }

    /// Resize image to exact dimensions
    pub fn resize_image(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        if (orig_width, orig_height) == (width, height) {
            return img.clone();
        }
        let filter = Self::select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    }

    /// Apply a normalized resize to every frame
    pub fn apply(image: Image, spec: &ResizeSpec) -> Image {
        let plan = Self::plan(image.dimensions(), spec);
        Self::apply_plan(image, plan, spec)
    }

    /// Like [`ImageResize::apply`], but refuses plans whose buffers exceed `limits`
    /// before anything is allocated
    pub fn apply_within(
        image: Image,
        spec: &ResizeSpec,
        limits: &DimensionLimits,
    ) -> Result<Image, String> {
        let plan = Self::plan(image.dimensions(), spec);
        if let Some(working) = plan.working_dimensions() {
            limits.check(working.width, working.height)?;
        }
        Ok(Self::apply_plan(image, plan, spec))
    }

    fn apply_plan(image: Image, plan: ResizePlan, spec: &ResizeSpec) -> Image {
        let background = spec.background.unwrap_or(Color::BLACK);

        tracing::debug!(
            width = ?spec.width,
            height = ?spec.height,
            fit = ?spec.fit,
            plan = ?plan,
            "Applying resize"
        );

        match plan {
            ResizePlan::Unchanged => image,
            ResizePlan::Scale { width, height } => {
                image.map_frames(|frame| Self::resize_image(&frame, width, height))
            }
            ResizePlan::ScaleAndCrop {
                width,
                height,
                crop_width,
                crop_height,
                left,
                top,
            } => image.map_frames(|frame| {
                Self::resize_image(&frame, width, height).crop_imm(
                    left,
                    top,
                    crop_width,
                    crop_height,
                )
            }),
            ResizePlan::ScaleAndEmbed {
                width,
                height,
                canvas_width,
                canvas_height,
                left,
                top,
            } => image.map_frames(|frame| {
                let resized = Self::resize_image(&frame, width, height).to_rgba8();
                let mut canvas =
                    RgbaImage::from_pixel(canvas_width, canvas_height, Rgba(background.to_rgba()));
                imageops::replace(&mut canvas, &resized, left as i64, top as i64);
                DynamicImage::ImageRgba8(canvas)
            }),
        }
    }
}
