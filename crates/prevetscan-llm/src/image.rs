// Inline image payloads sent alongside prompts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Largest decoded image accepted for inline upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Debug, Error, PartialEq)]
pub enum ImageError {
    #[error("image is empty")]
    Empty,

    #[error("malformed data URL")]
    InvalidDataUrl,

    #[error("image is not valid base64")]
    InvalidBase64,

    #[error("unsupported media type: {0}")]
    UnsupportedMime(String),

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// A validated base64 image with its MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64 text exactly as it will be sent upstream.
    pub data: String,
}

impl ImagePayload {
    /// Accepts bare base64 (assumed JPEG) or a `data:<mime>;base64,<data>` URL.
    pub fn parse(raw: &str) -> Result<Self, ImageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ImageError::Empty);
        }

        let (mime_type, data) = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or(ImageError::InvalidDataUrl)?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or(ImageError::InvalidDataUrl)?;
                (mime.to_ascii_lowercase(), data)
            }
            None => (DEFAULT_MIME.to_string(), raw),
        };

        if !mime_type.starts_with("image/") {
            return Err(ImageError::UnsupportedMime(mime_type));
        }
        if data.is_empty() {
            return Err(ImageError::Empty);
        }

        let decoded = STANDARD.decode(data).map_err(|_| ImageError::InvalidBase64)?;
        if decoded.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge {
                size: decoded.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }

        Ok(Self {
            mime_type,
            data: data.to_string(),
        })
    }

    /// Provider JSON part for this image.
    pub fn to_part(&self) -> serde_json::Value {
        serde_json::json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": self.data,
            }
        })
    }
}
