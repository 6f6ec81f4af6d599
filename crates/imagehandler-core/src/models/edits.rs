//! Edit set and per-operation parameter shapes.
//!
//! An [`EditSet`] is the untyped mapping handed over by request parsing. Its key
//! order is preserved (serde_json `preserve_order`), so edits after `resize` run
//! in the order the caller wrote them. The typed specs below are parsed lazily by
//! the dispatcher, one entry at a time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known edit keys
pub mod keys {
    pub const RESIZE: &str = "resize";
    pub const CROP: &str = "crop";
    pub const ROUND_CROP: &str = "roundCrop";
    pub const CONTENT_MODERATION: &str = "contentModeration";
    pub const OVERLAY_WITH: &str = "overlayWith";
}

/// Unordered (but order-preserving) mapping from operation name to parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditSet(Map<String, Value>);

impl EditSet {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse the `resize` entry. `null` counts as absent.
    pub fn resize_spec(&self) -> Result<Option<ResizeSpec>, serde_json::Error> {
        match self.0.get(keys::RESIZE) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => ResizeSpec::deserialize(value).map(Some),
        }
    }
}

impl From<Map<String, Value>> for EditSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for EditSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Geometric policy for target dimensions vs. source aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

impl Fit {
    /// Fits for which `position` has an effect
    pub fn uses_position(self) -> bool {
        matches!(self, Fit::Cover | Fit::Contain)
    }
}

/// Anchor used by cover (crop) and contain (embed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "centre", alias = "center")]
    Centre,
    #[serde(rename = "top", alias = "north")]
    Top,
    #[serde(rename = "right top", alias = "northeast")]
    RightTop,
    #[serde(rename = "right", alias = "east")]
    Right,
    #[serde(rename = "right bottom", alias = "southeast")]
    RightBottom,
    #[serde(rename = "bottom", alias = "south")]
    Bottom,
    #[serde(rename = "left bottom", alias = "southwest")]
    LeftBottom,
    #[serde(rename = "left", alias = "west")]
    Left,
    #[serde(rename = "left top", alias = "northwest")]
    LeftTop,
}

impl Position {
    /// Horizontal and vertical anchor as fractions of the free space (0 = left/top)
    pub fn anchor(self) -> (f64, f64) {
        match self {
            Position::Centre => (0.5, 0.5),
            Position::Top => (0.5, 0.0),
            Position::RightTop => (1.0, 0.0),
            Position::Right => (1.0, 0.5),
            Position::RightBottom => (1.0, 1.0),
            Position::Bottom => (0.5, 1.0),
            Position::LeftBottom => (0.0, 1.0),
            Position::Left => (0.0, 0.5),
            Position::LeftTop => (0.0, 0.0),
        }
    }
}

/// RGB colour with an alpha in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub r: u8,
    #[serde(default)]
    pub g: u8,
    #[serde(default)]
    pub b: u8,
    #[serde(default = "opaque")]
    pub alpha: f64,
}

fn opaque() -> f64 {
    1.0
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        alpha: 1.0,
    };

    pub fn to_rgba(self) -> [u8; 4] {
        let alpha = (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        [self.r, self.g, self.b, alpha]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Resize parameters as requested, and (after normalization) as applied.
///
/// `width`/`height` stay floating point so percentage math upstream can hand
/// over non-integral values; normalization rounds them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeSpec {
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<Fit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub without_enlargement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub without_reduction: Option<bool>,
}

/// Rectangular extraction in pixels. Signed so that negative input reaches
/// the bounds check instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSpec {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// Ellipse geometry overrides; every field is optional and individually defaulted
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundCropGeometry {
    pub top: Option<f64>,
    pub left: Option<f64>,
    pub rx: Option<f64>,
    pub ry: Option<f64>,
}

/// `roundCrop: true` or `roundCrop: { top?, left?, rx?, ry? }`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundCropSpec {
    Defaults,
    Custom(RoundCropGeometry),
}

impl RoundCropSpec {
    /// Returns `None` for any form other than `true` or an object; such a
    /// round-crop entry is a no-op.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(RoundCropSpec::Defaults),
            Value::Object(fields) => Some(RoundCropSpec::Custom(RoundCropGeometry {
                top: fields.get("top").and_then(loose_number),
                left: fields.get("left").and_then(loose_number),
                rx: fields.get("rx").and_then(loose_number),
                ry: fields.get("ry").and_then(loose_number),
            })),
            _ => None,
        }
    }

    pub fn geometry(&self) -> RoundCropGeometry {
        match self {
            RoundCropSpec::Defaults => RoundCropGeometry::default(),
            RoundCropSpec::Custom(geometry) => *geometry,
        }
    }
}

/// `contentModeration` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModerationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub blur: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderation_labels: Option<Vec<String>>,
}

/// Placement of an overlay; each axis is a textual offset (`"10"`, `"-10"`, `"25p"`, `"-25p"`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPlacement {
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub left: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub top: Option<String>,
}

/// `overlayWith` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySpec {
    pub bucket: String,
    pub key: String,
    /// Overlay width as a percentage (0-100) of the base width
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub w_ratio: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub h_ratio: Option<f64>,
    /// Transparency percentage (0-100)
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub options: OverlayPlacement,
}

/// Numbers or numeric strings; anything else is treated as absent
pub fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accepts a number, a numeric string or null
    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, found \"{}\"", s))),
            Some(other) => Err(D::Error::custom(format!(
                "expected a number, found {}",
                other
            ))),
        }
    }

    /// Accepts a string or a number (kept in its textual form) or null
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected a string or number, found {}",
                other
            ))),
        }
    }
}
