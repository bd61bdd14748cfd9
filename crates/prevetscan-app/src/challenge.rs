// Turnstile bot-challenge verification.

use async_trait::async_trait;
use prevetscan_core::config::Config;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::HumanVerifier;

#[derive(Debug, Error, PartialEq)]
pub enum ChallengeError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("verification service returned status {0}")]
    Http(u16),

    #[error("failed to decode verification response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChallengeError {
    fn from(e: reqwest::Error) -> Self {
        ChallengeError::Transport(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Server-side check of a Turnstile token against `siteverify`.
#[derive(Clone)]
pub struct TurnstileVerifier {
    http: reqwest::Client,
    verify_url: String,
    secret: String,
}

impl TurnstileVerifier {
    pub fn new(verify_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            verify_url: verify_url.into(),
            secret: secret.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.challenge.verify_url,
            &config.credentials.turnstile_secret_key,
        )
    }
}

#[async_trait]
impl HumanVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool, ChallengeError> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self.http.post(&self.verify_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChallengeError::Http(status.as_u16()));
        }

        let body: SiteverifyResponse = response
            .json()
            .await
            .map_err(|e| ChallengeError::Decode(e.to_string()))?;
        if body.success {
            debug!("challenge token accepted");
        } else {
            warn!(codes = ?body.error_codes, "challenge token rejected");
        }
        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    async fn serve_json(status: &str, body: &str) -> (SocketAddr, JoinHandle<String>) {
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            // Form bodies are small: read until the declared length arrives.
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let len = head
                        .to_ascii_lowercase()
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if body.len() >= len {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn accepted_token() {
        let (addr, server) = serve_json("200 OK", r#"{"success":true,"error-codes":[]}"#).await;
        let verifier = TurnstileVerifier::new(format!("http://{addr}/siteverify"), "s3cret");

        assert!(verifier.verify("tok-1", Some("203.0.113.9")).await.unwrap());

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /siteverify "));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.contains("secret=s3cret&response=tok-1&remoteip=203.0.113.9"));
    }

    #[tokio::test]
    async fn rejected_token() {
        let (addr, server) = serve_json(
            "200 OK",
            r#"{"success":false,"error-codes":["invalid-input-response"]}"#,
        )
        .await;
        let verifier = TurnstileVerifier::new(format!("http://{addr}/siteverify"), "s3cret");

        assert!(!verifier.verify("forged", None).await.unwrap());
        let request = server.await.unwrap();
        assert!(!request.contains("remoteip"));
    }

    #[tokio::test]
    async fn service_outage_is_an_error() {
        let (addr, server) = serve_json("502 Bad Gateway", "{}").await;
        let verifier = TurnstileVerifier::new(format!("http://{addr}/siteverify"), "s3cret");

        assert_eq!(
            verifier.verify("tok", None).await,
            Err(ChallengeError::Http(502))
        );
        let _ = server.await;
    }
}
