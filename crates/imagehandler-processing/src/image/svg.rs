use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbaImage};
use resvg::{tiny_skia, usvg};

/// Rasterise an SVG document at its intrinsic size
pub fn rasterize(data: &[u8]) -> Result<DynamicImage> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())?;
    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("invalid pixmap size {}x{}", width, height))?;
    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap_mut);

    // tiny-skia stores premultiplied alpha
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }

    let buffer = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("rasterised SVG buffer does not match {}x{}", width, height))?;
    Ok(DynamicImage::ImageRgba8(buffer))
}
