//! Viewer payload: URDF text, base64 mesh blobs and display options

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::encoding::{EncodingError, decode_base64};

/// Up axis of the displayed scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpAxis {
    /// ROS convention, +Z up
    #[default]
    Z,
    Y,
}

/// Display options carried with a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerOptions {
    pub up_axis: UpAxis,
    /// Camera distance along each axis after loading
    pub initial_distance: f32,
    pub cast_shadows: bool,
    /// CSS hex colour
    pub background: String,
    pub show_grid: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::Z,
            initial_distance: 2.0,
            cast_shadows: true,
            background: "#0b0b0b".to_string(),
            show_grid: true,
        }
    }
}

impl ViewerOptions {
    pub const DEFAULT_DISTANCE: f32 = 2.0;
    pub const MIN_DISTANCE: f32 = 0.1;

    /// Distance actually used for the camera: never below 0.1, default when unset or invalid
    pub fn effective_distance(&self) -> f32 {
        let d = self.initial_distance;
        if !d.is_finite() || d == 0.0 {
            return Self::DEFAULT_DISTANCE;
        }
        d.max(Self::MIN_DISTANCE)
    }

    /// Background as RGBA, falling back to the default colour if unparsable
    pub fn background_rgba(&self) -> [f32; 4] {
        parse_hex_color(&self.background).unwrap_or_else(|e| {
            tracing::warn!("{}; using default background", e);
            DEFAULT_BACKGROUND
        })
    }
}

/// `#0b0b0b`
pub const DEFAULT_BACKGROUND: [f32; 4] = [11.0 / 255.0, 11.0 / 255.0, 11.0 / 255.0, 1.0];

/// Payload-related errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid payload: {0}")]
    Invalid(String),
    #[error("URDF is neither XML nor base64: {0}")]
    UrdfEncoding(#[from] EncodingError),
    #[error("Decoded URDF is not valid UTF-8")]
    UrdfUtf8,
    #[error("Invalid colour '{0}'")]
    Color(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// A URDF document plus the mesh blobs it references.
///
/// `meshes` maps a mesh reference (basename or full path as written in the
/// URDF) to the base64-encoded file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub urdf: String,
    #[serde(default)]
    pub meshes: BTreeMap<String, String>,
    #[serde(default)]
    pub options: ViewerOptions,
}

impl Payload {
    pub fn new(urdf: impl Into<String>) -> Self {
        Self {
            urdf: urdf.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, name: impl Into<String>, base64: impl Into<String>) -> Self {
        self.meshes.insert(name.into(), base64.into());
        self
    }

    pub fn with_options(mut self, options: ViewerOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a JSON payload. The top level must be an object.
    pub fn from_json(json: &str) -> Result<Self, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| PayloadError::Invalid(e.to_string()))?;
        if !value.is_object() {
            return Err(PayloadError::Invalid("payload must be a JSON object".into()));
        }
        serde_json::from_value(value).map_err(|e| PayloadError::Invalid(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, PayloadError> {
        serde_json::to_string_pretty(self).map_err(|e| PayloadError::Serialize(e.to_string()))
    }

    /// The URDF document as XML text.
    ///
    /// Text whose first non-blank character is `<` is taken verbatim, anything
    /// else is treated as base64.
    pub fn urdf_text(&self) -> Result<String, PayloadError> {
        let trimmed = self.urdf.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('<') {
            return Ok(self.urdf.clone());
        }
        let bytes = decode_base64(&self.urdf)?;
        String::from_utf8(bytes).map_err(|_| PayloadError::UrdfUtf8)
    }
}

/// Parse `#rrggbb`, `#rgb` (with or without `#`) into RGBA in `0.0..=1.0`
pub fn parse_hex_color(input: &str) -> Result<[f32; 4], PayloadError> {
    let err = || PayloadError::Color(input.to_string());
    let hex = input.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map(|v| v as f32 / 255.0);
    let (r, g, b) = match hex.len() {
        6 => (
            channel(&hex[0..2]).map_err(|_| err())?,
            channel(&hex[2..4]).map_err(|_| err())?,
            channel(&hex[4..6]).map_err(|_| err())?,
        ),
        3 => {
            let double = |i: usize| hex[i..i + 1].repeat(2);
            (
                channel(&double(0)).map_err(|_| err())?,
                channel(&double(1)).map_err(|_| err())?,
                channel(&double(2)).map_err(|_| err())?,
            )
        }
        _ => return Err(err()),
    };
    Ok([r, g, b, 1.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_base64;

    #[test]
    fn test_options_defaults_when_missing() {
        let payload = Payload::from_json(r#"{"urdf": "<robot name='r'/>"}"#).unwrap();
        assert_eq!(payload.options, ViewerOptions::default());
        assert!(payload.meshes.is_empty());
    }

    #[test]
    fn test_options_camel_case_and_partial() {
        let payload = Payload::from_json(
            r#"{"urdf": "", "options": {"upAxis": "y", "showGrid": false, "extra": 1}}"#,
        )
        .unwrap();
        assert_eq!(payload.options.up_axis, UpAxis::Y);
        assert!(!payload.options.show_grid);
        assert!(payload.options.cast_shadows);
        assert_eq!(payload.options.background, "#0b0b0b");
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            Payload::from_json("[1, 2]"),
            Err(PayloadError::Invalid(_))
        ));
        assert!(matches!(
            Payload::from_json("not json"),
            Err(PayloadError::Invalid(_))
        ));
    }

    #[test]
    fn test_urdf_text_raw_and_base64() {
        let xml = "<robot name=\"r\"></robot>";
        assert_eq!(Payload::new(xml).urdf_text().unwrap(), xml);
        assert_eq!(Payload::new(format!("\n  {xml}")).urdf_text().unwrap(), format!("\n  {xml}"));
        assert_eq!(
            Payload::new(encode_base64(xml.as_bytes())).urdf_text().unwrap(),
            xml
        );
    }

    #[test]
    fn test_urdf_text_invalid_utf8() {
        let payload = Payload::new(encode_base64(&[0xff, 0xfe, 0x00]));
        assert_eq!(payload.urdf_text(), Err(PayloadError::UrdfUtf8));
    }

    #[test]
    fn test_effective_distance() {
        let mut options = ViewerOptions::default();
        assert_eq!(options.effective_distance(), 2.0);
        options.initial_distance = 0.01;
        assert_eq!(options.effective_distance(), 0.1);
        options.initial_distance = 0.0;
        assert_eq!(options.effective_distance(), 2.0);
        options.initial_distance = f32::NAN;
        assert_eq!(options.effective_distance(), 2.0);
        options.initial_distance = 5.0;
        assert_eq!(options.effective_distance(), 5.0);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ffffff").unwrap(), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(parse_hex_color("f00").unwrap(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(parse_hex_color("#0b0b0b").unwrap(), DEFAULT_BACKGROUND);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_meshes() {
        let payload = Payload::new("<robot/>").with_mesh("base.stl", "AAAA");
        let back = Payload::from_json(&payload.to_json().unwrap()).unwrap();
        assert_eq!(back, payload);
    }
}
