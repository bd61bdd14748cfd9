// Application error kinds and their HTTP statuses.

use prevetscan_baas::BaasError;
use thiserror::Error;
use tracing::warn;

/// A failed request. The message is safe to show to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    VerificationFailed(String),

    #[error("{0}")]
    NotFound(String),

    /// A vendor call failed. Details are logged, not returned.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Unauthorized(_) => 401,
            AppError::PaymentRequired(_) => 402,
            AppError::BadRequest(_) | AppError::VerificationFailed(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Upstream(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Unauthorized(m)
            | AppError::PaymentRequired(m)
            | AppError::BadRequest(m)
            | AppError::VerificationFailed(m)
            | AppError::NotFound(m)
            | AppError::Upstream(m)
            | AppError::Internal(m) => m,
        }
    }

    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".into())
    }

    pub fn insufficient_credits() -> Self {
        AppError::PaymentRequired("Insufficient credits".into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }
}

/// Map a BaaS failure on a call that addresses one existing record.
///
/// A missing row is the caller's 404; everything else is handled as in
/// [`service_error`].
pub(crate) fn store_error(action: &'static str) -> impl FnOnce(BaasError) -> AppError {
    move |err| match err {
        BaasError::NotFound => AppError::NotFound("Not found".into()),
        other => service_error(action)(other),
    }
}

/// Map a BaaS failure on a call that has no caller-addressed target.
///
/// Session and credit failures keep their meaning. Anything else, a 404 from
/// a missing RPC or an empty insert result included, is logged and reported
/// as `Upstream` with `action` as the message.
pub(crate) fn service_error(action: &'static str) -> impl FnOnce(BaasError) -> AppError {
    move |err| match err {
        BaasError::Unauthorized => AppError::unauthorized(),
        BaasError::InsufficientCredits => AppError::insufficient_credits(),
        other => {
            warn!(error = %other, "{action}");
            AppError::Upstream(action.to_string())
        }
    }
}
