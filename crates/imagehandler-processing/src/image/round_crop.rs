//! Elliptical crop
//!
//! The ellipse is rasterised as an alpha mask over the current frame, the
//! result is re-encoded and decoded into a fresh handle, and fully transparent
//! borders are trimmed away.

use super::handle::{DecodeOptions, Dimensions, Image};
use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbaImage};
use imagehandler_core::{ContentType, RoundCropSpec};

/// Resolved ellipse: centre (`left`, `top`) and radii, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseGeometry {
    pub left: f64,
    pub top: f64,
    pub rx: f64,
    pub ry: f64,
}

pub struct RoundCropOperator;

impl RoundCropOperator {
    /// Resolve each parameter independently. Only values strictly greater
    /// than zero are honoured, so `0` selects the default as well.
    pub fn resolve(spec: &RoundCropSpec, dimensions: Dimensions) -> EllipseGeometry {
        let requested = spec.geometry();
        let (width, height) = (dimensions.width as f64, dimensions.height as f64);
        let radius = width.min(height) / 2.0;

        EllipseGeometry {
            left: Self::accepted(requested.left).unwrap_or(width / 2.0),
            top: Self::accepted(requested.top).unwrap_or(height / 2.0),
            rx: Self::accepted(requested.rx).unwrap_or(radius),
            ry: Self::accepted(requested.ry).unwrap_or(radius),
        }
    }

    fn accepted(value: Option<f64>) -> Option<f64> {
        value.filter(|v| v.is_finite() && *v > 0.0)
    }

    /// Opaque (255) inside the ellipse, transparent (0) outside; sampled at pixel centres
    pub fn build_mask(geometry: &EllipseGeometry, dimensions: Dimensions) -> GrayImage {
        GrayImage::from_fn(dimensions.width, dimensions.height, |x, y| {
            let dx = (x as f64 + 0.5 - geometry.left) / geometry.rx;
            let dy = (y as f64 + 0.5 - geometry.top) / geometry.ry;
            if dx * dx + dy * dy <= 1.0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// Keep destination pixels only where the mask is opaque
    fn composite(frame: &DynamicImage, mask: &GrayImage) -> RgbaImage {
        let mut rgba = frame.to_rgba8();
        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            let coverage = mask.get_pixel(x, y)[0] as u32;
            pixel[3] = ((pixel[3] as u32 * coverage + 127) / 255) as u8;
        }
        rgba
    }

    /// Smallest rectangle containing every pixel with non-zero alpha
    fn opaque_bounds(rgba: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in rgba.enumerate_pixels() {
            if pixel[3] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
        bounds.map(|(min_x, min_y, max_x, max_y)| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// Remove fully transparent borders; a fully transparent image is kept as-is
    pub fn trim(img: DynamicImage) -> DynamicImage {
        let rgba = img.to_rgba8();
        match Self::opaque_bounds(&rgba) {
            Some((left, top, width, height)) if (width, height) != img.dimensions() => {
                img.crop_imm(left, top, width, height)
            }
            _ => img,
        }
    }

    /// Mask the current image to the ellipse and hand back a freshly decoded handle.
    ///
    /// Animated handles are reduced to their first frame.
    pub fn apply(image: Image, spec: &RoundCropSpec) -> Result<Image, anyhow::Error> {
        let dimensions = image.dimensions();
        let geometry = Self::resolve(spec, dimensions);

        tracing::debug!(
            left = geometry.left,
            top = geometry.top,
            rx = geometry.rx,
            ry = geometry.ry,
            "Applying round crop"
        );

        let mask = Self::build_mask(&geometry, dimensions);
        let composited = Self::composite(&image.into_first_frame(), &mask);

        let encoded = Image::from_dynamic(DynamicImage::ImageRgba8(composited)).to_png()?;
        let fresh = Image::decode(
            &encoded,
            ContentType::Png,
            DecodeOptions::for_content_type(ContentType::Png),
        )?;

        Ok(fresh.map_frames(Self::trim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use imagehandler_core::RoundCropGeometry;

    fn image(width: u32, height: u32) -> Image {
        Image::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 100, 50, 255]),
        )))
    }

    #[test]
    fn test_resolve_defaults() {
        let geometry = RoundCropOperator::resolve(&RoundCropSpec::Defaults, Dimensions::new(200, 100));
        assert_eq!(
            geometry,
            EllipseGeometry {
                left: 100.0,
                top: 50.0,
                rx: 50.0,
                ry: 50.0,
            }
        );
    }

    #[test]
    fn test_resolve_zero_top_matches_defaults() {
        let dims = Dimensions::new(120, 80);
        let zero_top = RoundCropSpec::Custom(RoundCropGeometry {
            top: Some(0.0),
            ..RoundCropGeometry::default()
        });
        assert_eq!(
            RoundCropOperator::resolve(&zero_top, dims),
            RoundCropOperator::resolve(&RoundCropSpec::Defaults, dims)
        );
    }

    #[test]
    fn test_resolve_negative_and_positive_values() {
        let spec = RoundCropSpec::Custom(RoundCropGeometry {
            top: Some(10.0),
            left: Some(-4.0),
            rx: Some(7.5),
            ry: None,
        });
        let geometry = RoundCropOperator::resolve(&spec, Dimensions::new(40, 30));
        assert_eq!(geometry.top, 10.0);
        assert_eq!(geometry.left, 20.0);
        assert_eq!(geometry.rx, 7.5);
        assert_eq!(geometry.ry, 15.0);
    }

    #[test]
    fn test_mask_is_elliptical() {
        let dims = Dimensions::new(10, 10);
        let geometry = RoundCropOperator::resolve(&RoundCropSpec::Defaults, dims);
        let mask = RoundCropOperator::build_mask(&geometry, dims);
        assert_eq!(mask.get_pixel(5, 5)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(9, 9)[0], 0);
    }

    #[test]
    fn test_apply_makes_corners_transparent() {
        let cropped = RoundCropOperator::apply(image(50, 50), &RoundCropSpec::Defaults).unwrap();
        let frame = cropped.first_frame().to_rgba8();
        assert_eq!(frame.dimensions(), (50, 50));
        assert_eq!(frame.get_pixel(0, 0)[3], 0);
        assert_eq!(frame.get_pixel(25, 25).0, [200, 100, 50, 255]);
        assert!(!cropped.is_animated());
    }

    #[test]
    fn test_apply_trims_to_ellipse() {
        let spec = RoundCropSpec::Custom(RoundCropGeometry {
            top: Some(20.0),
            left: Some(20.0),
            rx: Some(10.0),
            ry: Some(5.0),
        });
        let cropped = RoundCropOperator::apply(image(100, 60), &spec).unwrap();
        assert_eq!(cropped.first_frame().dimensions(), (20, 10));
    }

    #[test]
    fn test_trim_keeps_fully_transparent_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        assert_eq!(RoundCropOperator::trim(img).dimensions(), (8, 8));
    }
}
