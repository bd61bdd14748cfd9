// Request pipelines behind vendor seams.
//
// Each pipeline takes the caller's bearer token and a decoded request body,
// talks to the vendors through the traits in `ports`, and returns either a
// response value or an `AppError` carrying its HTTP status.

pub mod analysis;
pub mod challenge;
pub mod chat;
pub mod credits;
pub mod error;
pub mod pets;
pub mod ports;
pub mod scans;
pub mod services;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use analysis::{run_analysis, AnalysisOutcome, AnalyzeRequest};
pub use challenge::{ChallengeError, TurnstileVerifier};
pub use chat::{relay_chat, ChatInput, ChatStream};
pub use credits::{check_credits, CreditSummary};
pub use error::AppError;
pub use services::Services;
