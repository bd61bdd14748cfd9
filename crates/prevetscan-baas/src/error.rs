// Error type for BaaS calls.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BaasError {
    #[error("invalid or expired session")]
    Unauthorized,

    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("record not found")]
    NotFound,

    #[error("BaaS returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("failed to decode BaaS response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BaasError {
    fn from(e: reqwest::Error) -> Self {
        BaasError::Transport(e.to_string())
    }
}

impl BaasError {
    /// Build the error for a non-success response.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => BaasError::Unauthorized,
            404 => BaasError::NotFound,
            _ => BaasError::Http {
                status,
                message: error_message(body),
            },
        }
    }
}

/// Pull the human-readable message out of a PostgREST or GoTrue error body.
///
/// PostgREST uses `message`, GoTrue uses `msg` or `error_description`.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Whether an RPC failure message reports an exhausted balance.
pub(crate) fn is_insufficient(message: &str) -> bool {
    message.to_ascii_lowercase().contains("insufficient")
}
