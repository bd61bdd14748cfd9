// HTTP surface: axum router, request extraction and error rendering.

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, AppState};
