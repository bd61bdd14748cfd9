// Chat relay: forwards the conversation upstream and re-emits each text
// fragment as it arrives.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use prevetscan_llm::prompt::IMAGE_ONLY_MESSAGE;
use prevetscan_llm::{ChatEvent, ChatRequest, ChatTurn, ImagePayload};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::ports::ChatProvider;

/// Buffered upstream events between the provider task and the response body.
const CHANNEL_CAPACITY: usize = 64;

/// Body of a chat request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInput {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub use_deep_thinking: bool,
}

/// Text chunks in upstream order. An `Err` item ends the stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

fn into_request(input: ChatInput) -> Result<ChatRequest, AppError> {
    let image = match input.image.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            ImagePayload::parse(raw)
                .map_err(|e| AppError::bad_request(format!("Invalid image: {e}")))?,
        ),
        _ => None,
    };

    let message = match (input.message.trim().is_empty(), image.is_some()) {
        (false, _) => input.message,
        (true, true) => IMAGE_ONLY_MESSAGE.to_string(),
        (true, false) => return Err(AppError::bad_request("Message is required")),
    };

    Ok(ChatRequest {
        history: input.history,
        message,
        image,
        reasoning: input.use_deep_thinking,
    })
}

struct RelayState {
    pending: Option<ChatEvent>,
    rx: mpsc::Receiver<ChatEvent>,
    finished: bool,
}

/// Start a chat reply and return its body stream.
///
/// Waits for the first upstream event so that an immediate failure is
/// reported as an error status instead of an empty 200.
pub async fn relay_chat(
    provider: Arc<dyn ChatProvider>,
    input: ChatInput,
) -> Result<ChatStream, AppError> {
    let request = into_request(input)?;
    debug!(
        turns = request.history.len(),
        has_image = request.image.is_some(),
        reasoning = request.reasoning,
        "starting chat relay"
    );

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(async move { provider.stream_chat(request, tx).await });

    let first = rx.recv().await;
    if let Some(ChatEvent::Error { message }) = &first {
        warn!(%message, "chat failed before first chunk");
        return Err(AppError::Upstream("Chat failed".into()));
    }

    let state = RelayState {
        pending: first,
        rx,
        finished: false,
    };
    let body = stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        let event = match state.pending.take() {
            Some(event) => Some(event),
            None => state.rx.recv().await,
        };
        match event {
            Some(ChatEvent::Token { text }) => Some((Ok(text), state)),
            Some(ChatEvent::Error { message }) => {
                warn!(%message, "chat stream interrupted");
                state.finished = true;
                Some((Err(AppError::Upstream("Chat failed".into())), state))
            }
            // Done, or the provider task ended without a terminal event.
            Some(ChatEvent::Done) | None => None,
        }
    });

    Ok(Box::pin(body))
}
