// Generative-AI provider client: one-shot structured image analysis and
// streamed chat replies.

pub mod client;
pub mod image;
pub mod prompt;
pub mod protocol;

pub use client::{GeminiClient, LlmError};
pub use image::{ImageError, ImagePayload};
pub use protocol::{ChatEvent, ChatPart, ChatRequest, ChatTurn, Role};
