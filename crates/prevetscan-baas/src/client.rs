// Supabase REST client.
//
// Every request carries the project's anon key in `apikey` and the caller's
// own access token as the bearer, so row-level policies on the BaaS side
// decide what each account may read or write.

use chrono::{DateTime, Utc};
use prevetscan_core::config::Config;
use prevetscan_core::model::{AccountId, CreditBalance};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{is_insufficient, BaasError};

/// The authenticated account behind a bearer token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthUser {
    pub id: AccountId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct BaasClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl BaasClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.baas_url, &config.credentials.baas_anon_key)
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn patch(&self, path: &str) -> RequestBuilder {
        self.http.patch(self.url(path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path))
    }

    /// Attach credentials, send, and turn non-2xx replies into `BaasError`.
    pub(crate) async fn send(
        &self,
        builder: RequestBuilder,
        bearer: &str,
    ) -> Result<Response, BaasError> {
        let response = builder
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "BaaS request failed");
        Err(BaasError::from_status(status.as_u16(), &body))
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BaasError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BaasError::Decode(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Resolve a bearer token to its account.
    pub async fn get_user(&self, bearer: &str) -> Result<AuthUser, BaasError> {
        let response = self.send(self.get("/auth/v1/user"), bearer).await?;
        Self::read_json(response).await
    }

    // -----------------------------------------------------------------------
    // Credits
    // -----------------------------------------------------------------------

    /// Current balance and expiry. A missing row reads as zero credits.
    pub async fn get_user_credits(
        &self,
        bearer: &str,
        user_id: &str,
    ) -> Result<CreditBalance, BaasError> {
        let request = self
            .post("/rest/v1/rpc/get_user_credits")
            .json(&json!({ "p_user_id": user_id }));
        let response = self.send(request, bearer).await?;
        let value: Value = Self::read_json(response).await?;
        parse_credit_balance(value)
    }

    /// Atomically take one credit and return the new balance.
    pub async fn deduct_credit(&self, bearer: &str, user_id: &str) -> Result<i64, BaasError> {
        let request = self
            .post("/rest/v1/rpc/deduct_credit")
            .json(&json!({ "p_user_id": user_id }));
        let response = match self.send(request, bearer).await {
            Ok(response) => response,
            Err(BaasError::Http { message, .. }) if is_insufficient(&message) => {
                warn!(user_id, "credit deduction refused: balance exhausted");
                return Err(BaasError::InsufficientCredits);
            }
            Err(e) => return Err(e),
        };
        let value: Value = Self::read_json(response).await?;
        parse_remaining(value)
    }
}

// ---------------------------------------------------------------------------
// RPC payload decoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreditRow {
    #[serde(default)]
    credits: Option<i64>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Accepts a bare integer, a `{credits, expires_at}` row, a set of such rows,
/// or `null`.
fn parse_credit_balance(value: Value) -> Result<CreditBalance, BaasError> {
    match value {
        Value::Null => Ok(CreditBalance::default()),
        Value::Number(n) => n
            .as_i64()
            .map(|credits| CreditBalance::new(credits, None))
            .ok_or_else(|| BaasError::Decode(format!("credit count out of range: {n}"))),
        Value::Array(rows) => match rows.into_iter().next() {
            Some(row) => parse_credit_balance(row),
            None => Ok(CreditBalance::default()),
        },
        Value::Object(map) => {
            let row: CreditRow = serde_json::from_value(Value::Object(map))
                .map_err(|e| BaasError::Decode(e.to_string()))?;
            Ok(CreditBalance::new(row.credits.unwrap_or(0), row.expires_at))
        }
        other => Err(BaasError::Decode(format!(
            "unexpected credit payload: {other}"
        ))),
    }
}

fn parse_remaining(value: Value) -> Result<i64, BaasError> {
    match &value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| BaasError::Decode(format!("balance out of range: {n}"))),
        Value::Object(map) => map
            .get("credits")
            .and_then(Value::as_i64)
            .ok_or_else(|| BaasError::Decode(format!("missing credits in {value}"))),
        Value::Array(rows) => match rows.first() {
            Some(row) => parse_remaining(row.clone()),
            None => Err(BaasError::Decode("empty deduction result".into())),
        },
        _ => Err(BaasError::Decode(format!(
            "unexpected deduction payload: {value}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
