// Chat conversation types and the events a streamed reply produces.

use serde::{Deserialize, Serialize};

use crate::image::ImagePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPart {
    pub text: String,
}

/// One prior turn, in the provider's `{role, parts: [{text}]}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<ChatPart>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ChatPart { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![ChatPart { text: text.into() }],
        }
    }
}

/// A new chat message plus the conversation so far.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub image: Option<ImagePayload>,
    /// Selects the higher-effort model and thinking budget.
    pub reasoning: bool,
}

/// Events emitted while relaying a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A text fragment, in upstream arrival order.
    Token { text: String },
    /// The upstream stream ended normally.
    Done,
    /// The upstream call failed; no further events follow.
    Error { message: String },
}
