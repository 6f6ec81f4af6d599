//! Decoded image handle
//!
//! An [`Image`] owns one or more frames. Static sources always have exactly one;
//! animated sources (decoded with `animated = true`) have one per page. Operators
//! that have to restart decoding consume the handle and return a new one.

use super::orientation::read_exif_orientation;
use super::svg;
use anyhow::anyhow;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Delay, DynamicImage, GenericImageView, ImageFormat, ImageReader};
use imagehandler_core::ContentType;
use std::io::Cursor;

/// Pixel dimensions of an image (first frame for animations)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decoder configuration. `animated` selects multi-frame decoding and cannot be
/// toggled on an existing handle; the source has to be decoded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Abort on the first corrupt frame instead of keeping what decoded
    pub fail_on_error: bool,
    pub animated: bool,
}

impl DecodeOptions {
    pub fn for_content_type(content_type: ContentType) -> Self {
        Self {
            fail_on_error: false,
            animated: content_type.is_animated_format(),
        }
    }

    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub delay: Delay,
}

impl Frame {
    pub fn still(image: DynamicImage) -> Self {
        Self {
            image,
            delay: Delay::from_numer_denom_ms(0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Image {
    // never empty
    frames: Vec<Frame>,
    animated: bool,
    orientation: u8,
}

impl Image {
    /// Wrap a single decoded frame
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            frames: vec![Frame::still(image)],
            animated: false,
            orientation: 1,
        }
    }

    pub fn from_frames(frames: Vec<Frame>, animated: bool) -> Result<Self, anyhow::Error> {
        if frames.is_empty() {
            return Err(anyhow!("Image contains no frames"));
        }
        Ok(Self {
            frames,
            animated,
            orientation: 1,
        })
    }

    /// Decode an encoded buffer of the declared content type
    pub fn decode(
        data: &[u8],
        content_type: ContentType,
        options: DecodeOptions,
    ) -> Result<Self, anyhow::Error> {
        if content_type == ContentType::Svg {
            return Ok(Self::from_dynamic(svg::rasterize(data)?));
        }

        if options.animated {
            return Self::decode_animated(data, options);
        }

        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;

        Ok(Self {
            frames: vec![Frame::still(img)],
            animated: false,
            orientation: read_exif_orientation(data),
        })
    }

    fn decode_animated(data: &[u8], options: DecodeOptions) -> Result<Self, anyhow::Error> {
        let decoder = GifDecoder::new(Cursor::new(data))?;
        let mut frames = Vec::new();

        for frame in decoder.into_frames() {
            match frame {
                Ok(frame) => {
                    let delay = frame.delay();
                    frames.push(Frame {
                        image: DynamicImage::ImageRgba8(frame.into_buffer()),
                        delay,
                    });
                }
                Err(err) if !options.fail_on_error && !frames.is_empty() => {
                    tracing::warn!(
                        error = %err,
                        decoded_frames = frames.len(),
                        "Corrupt frame in animated image, keeping decoded frames"
                    );
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Self::from_frames(frames, true)
    }

    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = self.first_frame().dimensions();
        Dimensions { width, height }
    }

    /// Number of frames (pages)
    pub fn pages(&self) -> usize {
        self.frames.len()
    }

    /// Whether this handle was decoded in animated mode
    pub fn is_animated(&self) -> bool {
        self.animated
    }

    /// EXIF orientation (1-8) of the source, 1 when absent
    pub fn orientation(&self) -> u8 {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: u8) {
        self.orientation = orientation;
    }

    pub fn first_frame(&self) -> &DynamicImage {
        &self.frames[0].image
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Drop every frame but the first and leave animated mode
    pub fn into_first_frame(self) -> DynamicImage {
        let mut frames = self.frames;
        frames.swap_remove(0).image
    }

    /// Apply an infallible transform to every frame
    pub fn map_frames<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(DynamicImage) -> DynamicImage,
    {
        self.frames = self
            .frames
            .into_iter()
            .map(|frame| Frame {
                image: f(frame.image),
                delay: frame.delay,
            })
            .collect();
        self
    }

    /// Apply a fallible transform to every frame; the first error aborts
    pub fn try_map_frames<F, E>(mut self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(DynamicImage) -> Result<DynamicImage, E>,
    {
        let mut frames = Vec::with_capacity(self.frames.len());
        for frame in self.frames {
            frames.push(Frame {
                image: f(frame.image)?,
                delay: frame.delay,
            });
        }
        self.frames = frames;
        Ok(self)
    }

    /// Encode the first frame losslessly; used to hand pixels to collaborators
    pub fn to_png(&self) -> Result<Vec<u8>, anyhow::Error> {
        let mut buffer = Vec::new();
        self.first_frame()
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }
}
