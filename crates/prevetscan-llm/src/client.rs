// Gemini REST client.
//
// Image analysis is a single `generateContent` call constrained to JSON by a
// response schema. Chat uses `streamGenerateContent?alt=sse` through
// reqwest-eventsource and forwards each text fragment as a `ChatEvent` over
// an mpsc channel, in arrival order.

use futures_util::StreamExt;
use prevetscan_core::config::{Config, LlmConfig};
use prevetscan_core::model::{AnalysisResult, HealthCategory};
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::image::ImagePayload;
use crate::prompt;
use crate::protocol::{ChatEvent, ChatRequest, ChatTurn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("AI provider returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI provider returned no content")]
    EmptyResponse,

    #[error("failed to decode AI response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Client for the Gemini `generateContent` family of endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    settings: LlmConfig,
}

impl GeminiClient {
    pub fn new(api_key: String, settings: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.credentials.gemini_api_key.clone(), config.llm.clone())
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{model}:{method}",
            self.settings.api_base.trim_end_matches('/')
        )
    }

    /// Submit one photo with the fixed analysis instruction and parse the
    /// structured reply.
    pub async fn analyze_image(
        &self,
        image: &ImagePayload,
        category: HealthCategory,
    ) -> Result<AnalysisResult, LlmError> {
        let body = self.analysis_body(image, category);
        let url = self.endpoint(&self.settings.analysis_model, "generateContent");

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let text = extract_text(&value).ok_or(LlmError::EmptyResponse)?;
        parse_analysis(&text)
    }

    /// Stream a chat reply as `ChatEvent`s over `tx`.
    ///
    /// Exactly one terminal event (`Done` or `Error`) is sent unless the
    /// receiver is dropped first, in which case the upstream stream is closed
    /// and the method returns.
    pub async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ChatEvent>) {
        let model = if request.reasoning {
            &self.settings.reasoning_model
        } else {
            &self.settings.chat_model
        };
        let body = self.chat_body(&request);
        let url = format!("{}?alt=sse", self.endpoint(model, "streamGenerateContent"));

        let builder = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let mut es = match builder.eventsource() {
            Ok(es) => es,
            Err(e) => {
                let _ = tx
                    .send(ChatEvent::Error {
                        message: format!("Failed to create event source: {e}"),
                    })
                    .await;
                return;
            }
        };

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    let Ok(value) = serde_json::from_str::<Value>(&msg.data) else {
                        warn!("ignoring undecodable SSE payload");
                        continue;
                    };
                    if let Some(message) = upstream_error(&value) {
                        let _ = tx.send(ChatEvent::Error { message }).await;
                        es.close();
                        return;
                    }
                    let Some(text) = extract_text(&value) else {
                        debug!("SSE chunk without text");
                        continue;
                    };
                    if tx.send(ChatEvent::Token { text }).await.is_err() {
                        // Receiver dropped: abort upstream.
                        es.close();
                        return;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    debug!("SSE stream ended");
                    let _ = tx.send(ChatEvent::Done).await;
                    es.close();
                    return;
                }
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    let _ = tx
                        .send(ChatEvent::Error {
                            message: extract_error_message(&err),
                        })
                        .await;
                    es.close();
                    return;
                }
            }
        }

        // The event source only yields None after close(); treat as done.
        let _ = tx.send(ChatEvent::Done).await;
    }

    fn analysis_body(&self, image: &ImagePayload, category: HealthCategory) -> Value {
        let mut generation = json!({
            "responseMimeType": "application/json",
            "responseSchema": prompt::analysis_schema(),
        });
        if self.settings.analysis_thinking_budget > 0 {
            generation["thinkingConfig"] =
                json!({ "thinkingBudget": self.settings.analysis_thinking_budget });
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    image.to_part(),
                    { "text": prompt::analysis_instruction(category) },
                ]
            }],
            "generationConfig": generation,
        })
    }

    pub(crate) fn chat_body(&self, request: &ChatRequest) -> Value {
        let budget = if request.reasoning {
            self.settings.reasoning_thinking_budget
        } else {
            self.settings.chat_thinking_budget
        };

        let mut contents: Vec<Value> = request.history.iter().map(turn_to_json).collect();
        let mut parts = vec![json!({ "text": request.message })];
        if let Some(image) = &request.image {
            parts.push(image.to_part());
        }
        contents.push(json!({ "role": "user", "parts": parts }));

        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": prompt::chat_system_instruction() }] },
            "contents": contents,
        });
        if budget > 0 {
            body["generationConfig"] = json!({ "thinkingConfig": { "thinkingBudget": budget } });
        }
        body
    }
}

fn turn_to_json(turn: &ChatTurn) -> Value {
    serde_json::to_value(turn).unwrap_or_else(|_| json!({ "role": "user", "parts": [] }))
}

// ---------------------------------------------------------------------------
// Response parsing helpers
// ---------------------------------------------------------------------------

/// Concatenate the non-thought text parts of the first candidate.
///
/// Expected shape: `{ "candidates": [{ "content": { "parts": [{ "text": "..." }] } }] }`
pub(crate) fn extract_text(v: &Value) -> Option<String> {
    let parts = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Error object embedded in a streamed payload, if any.
fn upstream_error(v: &Value) -> Option<String> {
    let err = v.get("error")?;
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Some(format!("AI provider error: {message}"))
}

/// Parse the model's JSON reply, tolerating a Markdown code fence.
pub(crate) fn parse_analysis(text: &str) -> Result<AnalysisResult, LlmError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json"); the fence may open and close on one line.
    let rest = rest
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extract a human-readable error message from an SSE error.
fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("AI provider returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => {
            format!("Network error: {e}")
        }
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use prevetscan_core::model::Severity;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const ANALYSIS_JSON: &str = r#"{"severity":"Low","title":"Mild tear staining","observations":["Reddish fur below inner eye corners"],"possibleCauses":["Epiphora"],"vetWillExamine":["Tear duct patency"],"questionsToAsk":["Is a duct flush needed?"],"urgency":"Routine","nextSteps":"Wipe daily and mention at next checkup.","disclaimer":"AI guidance only.","financialForecast":"Daily care ($0) vs infection treatment ($250)."}"#;

    fn settings(api_base: &str) -> LlmConfig {
        LlmConfig {
            api_base: api_base.to_string(),
            analysis_model: "analysis-model".into(),
            analysis_thinking_budget: 1024,
            chat_model: "chat-model".into(),
            chat_thinking_budget: 0,
            reasoning_model: "reasoning-model".into(),
            reasoning_thinking_budget: 8192,
        }
    }

    fn chat_request(reasoning: bool) -> ChatRequest {
        ChatRequest {
            history: vec![ChatTurn::model("Hi! How can I help?")],
            message: "Is $900 fair for a dental cleaning?".into(),
            image: None,
            reasoning,
        }
    }

    /// Read one HTTP request (headers plus Content-Length body).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Accept one connection, reply with `response`, return the raw request.
    async fn serve_once(response: String) -> (SocketAddr, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            request
        });
        (addr, handle)
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn sse_response(events: &[&str]) -> String {
        let mut out = String::from(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        );
        for data in events {
            out.push_str("data: ");
            out.push_str(data);
            out.push_str("\r\n\r\n");
        }
        out
    }

    fn chunk(text: &str) -> String {
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    async fn collect(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    // -- parsing helpers --

    #[test]
    fn extract_text_joins_parts_and_skips_thoughts() {
        let v = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "thinking...", "thought": true },
                { "text": "Hello" },
                { "text": " there" }
            ]}}]
        });
        assert_eq!(extract_text(&v), Some("Hello there".to_string()));
    }

    #[test]
    fn extract_text_none_without_candidates() {
        let v = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert_eq!(extract_text(&v), None);
    }

    #[test]
    fn extract_text_none_for_empty_final_chunk() {
        let v = json!({ "candidates": [{ "content": { "parts": [{ "text": "" }] }, "finishReason": "STOP" }] });
        assert_eq!(extract_text(&v), None);
    }

    #[test]
    fn parse_analysis_plain_json() {
        let result = parse_analysis(ANALYSIS_JSON).unwrap();
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.possible_causes, vec!["Epiphora".to_string()]);
    }

    #[test]
    fn parse_analysis_strips_code_fence() {
        let fenced = format!("```json\n{ANALYSIS_JSON}\n```\n");
        let result = parse_analysis(&fenced).unwrap();
        assert_eq!(result.title, "Mild tear staining");
    }

    #[test]
    fn parse_analysis_accepts_single_line_fence() {
        for fenced in [
            format!("```{ANALYSIS_JSON}```"),
            format!("```json{ANALYSIS_JSON}```"),
            format!("```json {ANALYSIS_JSON} ```"),
        ] {
            let result = parse_analysis(&fenced).unwrap();
            assert_eq!(result.title, "Mild tear staining");
        }
        assert!(matches!(parse_analysis("``````"), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn parse_analysis_rejects_garbage() {
        assert!(matches!(parse_analysis("not json"), Err(LlmError::Decode(_))));
        assert!(matches!(parse_analysis("   "), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn upstream_error_is_detected() {
        let v = json!({ "error": { "code": 429, "message": "Resource exhausted" } });
        assert_eq!(
            upstream_error(&v),
            Some("AI provider error: Resource exhausted".to_string())
        );
        assert_eq!(upstream_error(&json!({ "candidates": [] })), None);
    }

    // -- request bodies --

    #[test]
    fn chat_body_appends_user_turn_with_image() {
        let client = GeminiClient::new("k".into(), settings("http://unused"));
        let mut request = chat_request(false);
        request.image = Some(ImagePayload::parse("aGVsbG8=").unwrap());

        let body = client.chat_body(&request);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[1]["parts"][0]["text"], "Is $900 fair for a dental cleaning?");
        assert_eq!(contents[1]["parts"][1]["inlineData"]["data"], "aGVsbG8=");
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("second opinion"));
        // Zero chat budget leaves thinking at the model default.
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn reasoning_mode_sets_thinking_budget() {
        let client = GeminiClient::new("k".into(), settings("http://unused"));
        let body = client.chat_body(&chat_request(true));
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 8192);
    }

    // -- mock server flows --

    #[tokio::test]
    async fn analyze_image_parses_structured_reply() {
        let reply = json!({
            "candidates": [{ "content": { "parts": [{ "text": ANALYSIS_JSON }] } }]
        })
        .to_string();
        let (addr, server) = serve_once(json_response("200 OK", &reply)).await;

        let client = GeminiClient::new("secret-key".into(), settings(&format!("http://{addr}")));
        let image = ImagePayload::parse("aGVsbG8=").unwrap();
        let result = client
            .analyze_image(&image, HealthCategory::Eyes)
            .await
            .expect("analysis should succeed");
        assert_eq!(result.title, "Mild tear staining");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /models/analysis-model:generateContent"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: secret-key"));
        assert!(request.contains("responseSchema"));
        assert!(request.contains("\"thinkingBudget\":1024"));
        assert!(request.contains("Eyes"));
    }

    #[tokio::test]
    async fn analyze_image_surfaces_http_error() {
        let (addr, server) = serve_once(json_response(
            "500 Internal Server Error",
            r#"{"error":{"message":"boom"}}"#,
        ))
        .await;

        let client = GeminiClient::new("k".into(), settings(&format!("http://{addr}")));
        let image = ImagePayload::parse("aGVsbG8=").unwrap();
        let err = client
            .analyze_image(&image, HealthCategory::Teeth)
            .await
            .unwrap_err();
        match err {
            LlmError::Http { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
        let _ = server.await;
    }

    #[tokio::test]
    async fn analyze_image_empty_candidate_is_error() {
        let reply = json!({ "candidates": [{ "content": { "parts": [] } }] }).to_string();
        let (addr, server) = serve_once(json_response("200 OK", &reply)).await;

        let client = GeminiClient::new("k".into(), settings(&format!("http://{addr}")));
        let image = ImagePayload::parse("aGVsbG8=").unwrap();
        let err = client
            .analyze_image(&image, HealthCategory::Teeth)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
        let _ = server.await;
    }

    #[tokio::test]
    async fn stream_chat_relays_tokens_in_order_then_done() {
        let first = chunk("Dental cleanings");
        let second = chunk(" usually cost");
        let third = chunk(" $300-$700.");
        let (addr, server) = serve_once(sse_response(&[&first, &second, &third])).await;

        let client = GeminiClient::new("k".into(), settings(&format!("http://{addr}")));
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(async move { client.stream_chat(chat_request(false), tx).await });

        let events = collect(rx).await;
        let _ = task.await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Token { text: "Dental cleanings".into() },
                ChatEvent::Token { text: " usually cost".into() },
                ChatEvent::Token { text: " $300-$700.".into() },
                ChatEvent::Done,
            ]
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /models/chat-model:streamGenerateContent?alt=sse"));
    }

    #[tokio::test]
    async fn stream_chat_with_zero_chunks_still_completes() {
        let (addr, server) = serve_once(sse_response(&[])).await;

        let client = GeminiClient::new("k".into(), settings(&format!("http://{addr}")));
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move { client.stream_chat(chat_request(true), tx).await });

        let events = collect(rx).await;
        let _ = task.await;
        assert_eq!(events, vec![ChatEvent::Done]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /models/reasoning-model:streamGenerateContent"));
    }

    #[tokio::test]
    async fn stream_chat_error_status_sends_error_event() {
        let (addr, server) = serve_once(json_response(
            "401 Unauthorized",
            r#"{"error":{"message":"API key not valid"}}"#,
        ))
        .await;

        let client = GeminiClient::new("bad".into(), settings(&format!("http://{addr}")));
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move { client.stream_chat(chat_request(false), tx).await });

        let events = collect(rx).await;
        let _ = task.await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChatEvent::Error { message } => assert!(message.contains("401"), "{message}"),
            other => panic!("expected Error, got {other:?}"),
        }
        let _ = server.await;
    }

    #[tokio::test]
    async fn stream_chat_embedded_error_stops_stream() {
        let first = chunk("Partial");
        let failure = json!({ "error": { "message": "quota exceeded" } }).to_string();
        let (addr, server) = serve_once(sse_response(&[&first, &failure])).await;

        let client = GeminiClient::new("k".into(), settings(&format!("http://{addr}")));
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async move { client.stream_chat(chat_request(false), tx).await });

        let events = collect(rx).await;
        let _ = task.await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Token { text: "Partial".into() },
                ChatEvent::Error { message: "AI provider error: quota exceeded".into() },
            ]
        );
        let _ = server.await;
    }
}
