//! Base64 and data URL helpers

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Standard alphabet, padding optional on decode
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encoding-related errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("Invalid base64: {0}")]
    Base64(String),
    #[error("Not a data URL: {0}")]
    NotDataUrl(String),
    #[error("Data URL is not base64 encoded")]
    NotBase64DataUrl,
}

/// Decode standard base64, ignoring embedded whitespace and line breaks
pub fn decode_base64(input: &str) -> Result<Vec<u8>, EncodingError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| EncodingError::Base64(e.to_string()))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Extension of a path or URL, lowercase, ignoring any `?query` or `#fragment`
pub fn extension_of(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type used for a mesh or texture path
pub fn mime_for_path(path: &str) -> &'static str {
    match extension_of(path).as_deref() {
        Some("stl") => "model/stl",
        Some("dae") => "model/vnd.collada+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// A parsed `data:<mime>;base64,<payload>` URL
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn is_data_url(s: &str) -> bool {
        s.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
    }

    pub fn parse(url: &str) -> Result<Self, EncodingError> {
        if !Self::is_data_url(url) {
            return Err(EncodingError::NotDataUrl(truncate(url, 32)));
        }
        let rest = &url[5..];
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| EncodingError::NotDataUrl(truncate(url, 32)))?;

        let mut params = header.split(';');
        let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(EncodingError::NotBase64DataUrl);
        }

        Ok(Self {
            mime: if mime.is_empty() {
                "text/plain".to_string()
            } else {
                mime
            },
            bytes: decode_base64(data)?,
        })
    }

    pub fn build(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, encode_base64(bytes))
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
