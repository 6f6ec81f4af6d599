//! Configuration module
//!
//! Limits and output defaults of the pipeline. Passed into the orchestrator at
//! construction so tests can run with different ceilings.

use std::env;

use crate::models::ImageFormatType;

/// Hosting platform response-payload limit (base64 body)
const PAYLOAD_LIMIT_BYTES: usize = 6 * 1024 * 1024;
const DEFAULT_WEBP_EFFORT: u8 = 4;
const DEFAULT_WEBP_QUALITY: u8 = 80;
const MAX_WEBP_EFFORT: u8 = 6;
/// Largest width or height an edit may produce
const MAX_DIMENSION: u32 = 16384;
/// 100 megapixels, 400 MB of RGBA
const MAX_PIXELS: u64 = 100_000_000;

/// Upper bound on any pixel buffer an edit allocates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DimensionLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl DimensionLimits {
    pub fn check(&self, width: u32, height: u32) -> Result<(), String> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(format!(
                "{}x{} exceeds the maximum dimension of {}",
                width, height, self.max_dimension
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(format!(
                "{}x{} is {} pixels, over the limit of {}",
                width, height, pixels, self.max_pixels
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Ceiling on the base64-encoded response body
    pub payload_limit_bytes: usize,
    /// Format used when the caller selects none
    pub default_output_format: ImageFormatType,
    pub default_webp_effort: u8,
    pub default_webp_quality: u8,
    /// Bounds on the canvas any edit may produce
    pub limits: DimensionLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            payload_limit_bytes: PAYLOAD_LIMIT_BYTES,
            default_output_format: ImageFormatType::Webp,
            default_webp_effort: DEFAULT_WEBP_EFFORT,
            default_webp_quality: DEFAULT_WEBP_QUALITY,
            limits: DimensionLimits::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from the process environment (and `.env` if present).
    /// Missing variables fall back to defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let payload_limit_bytes = match lookup("IMAGE_PAYLOAD_LIMIT_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_PAYLOAD_LIMIT_BYTES '{}': {}", v, e))?,
            None => defaults.payload_limit_bytes,
        };

        let default_output_format = match lookup("IMAGE_DEFAULT_OUTPUT_FORMAT") {
            Some(v) => v
                .parse::<ImageFormatType>()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_DEFAULT_OUTPUT_FORMAT: {}", e))?,
            None => defaults.default_output_format,
        };

        let default_webp_effort = match lookup("IMAGE_DEFAULT_WEBP_EFFORT") {
            Some(v) => v
                .trim()
                .parse::<u8>()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_DEFAULT_WEBP_EFFORT '{}': {}", v, e))?,
            None => defaults.default_webp_effort,
        };

        let default_webp_quality = match lookup("IMAGE_DEFAULT_WEBP_QUALITY") {
            Some(v) => v.trim().parse::<u8>().map_err(|e| {
                anyhow::anyhow!("Invalid IMAGE_DEFAULT_WEBP_QUALITY '{}': {}", v, e)
            })?,
            None => defaults.default_webp_quality,
        };

        let max_dimension = match lookup("IMAGE_MAX_DIMENSION") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_MAX_DIMENSION '{}': {}", v, e))?,
            None => defaults.limits.max_dimension,
        };

        let max_pixels = match lookup("IMAGE_MAX_PIXELS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_MAX_PIXELS '{}': {}", v, e))?,
            None => defaults.limits.max_pixels,
        };

        let config = Self {
            payload_limit_bytes,
            default_output_format,
            default_webp_effort,
            default_webp_quality,
            limits: DimensionLimits {
                max_dimension,
                max_pixels,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.payload_limit_bytes == 0 {
            anyhow::bail!("IMAGE_PAYLOAD_LIMIT_BYTES must be greater than zero");
        }
        if self.default_webp_effort > MAX_WEBP_EFFORT {
            anyhow::bail!(
                "IMAGE_DEFAULT_WEBP_EFFORT must be between 0 and {}, got {}",
                MAX_WEBP_EFFORT,
                self.default_webp_effort
            );
        }
        if !(1..=100).contains(&self.default_webp_quality) {
            anyhow::bail!(
                "IMAGE_DEFAULT_WEBP_QUALITY must be between 1 and 100, got {}",
                self.default_webp_quality
            );
        }
        if self.limits.max_dimension == 0 || self.limits.max_pixels == 0 {
            anyhow::bail!("IMAGE_MAX_DIMENSION and IMAGE_MAX_PIXELS must be greater than zero");
        }
        Ok(())
    }

    pub fn with_limits(mut self, limits: DimensionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_payload_limit(mut self, payload_limit_bytes: usize) -> Self {
        self.payload_limit_bytes = payload_limit_bytes;
        self
    }
}
