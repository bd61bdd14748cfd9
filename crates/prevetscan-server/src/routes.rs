// Route table and handlers.
//
// Handlers only extract the bearer token, client address and body, then
// hand off to the `prevetscan_app` pipelines.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{ConnectInfo, DefaultBodyLimit, Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use prevetscan_app::{
    check_credits, pets, relay_chat, run_analysis, scans, AnalysisOutcome, AnalyzeRequest,
    AppError, ChatInput, CreditSummary, Services,
};
use prevetscan_core::model::{NewPet, Pet, Scan};
use prevetscan_core::report::{paginate, PageBand, PageLayout};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

/// Request bodies carry base64 images of up to 10 MiB decoded.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Public Turnstile site key handed to the browser widget.
    pub turnstile_site_key: Option<String>,
}

impl AppState {
    pub fn new(services: Services, turnstile_site_key: Option<String>) -> Self {
        Self {
            services,
            turnstile_site_key,
        }
    }
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/config", get(public_config))
        .route("/api/analyze", post(analyze))
        .route("/api/chat", post(chat))
        .route("/api/check-credits", get(credits))
        .route("/api/pets", get(list_pets).post(create_pet))
        .route(
            "/api/pets/:id",
            get(get_pet).put(update_pet).delete(delete_pet),
        )
        .route("/api/scans", get(list_scans))
        .route("/api/scans/:id", axum::routing::delete(delete_scan))
        .route("/api/report/pages", get(report_pages))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

/// Token from `Authorization: Bearer <token>`.
fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

/// Caller address as seen by the edge proxy, falling back to the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    let forwarded = headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    forwarded.or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        warn!(error = %rejection, "rejected request body");
        ApiError(AppError::bad_request("Invalid request body"))
    })
}

/// Like `body`, but a malformed body from a caller without a valid session
/// is reported as 401.
async fn authed_body<T>(
    services: &Services,
    token: Option<&str>,
    payload: Result<Json<T>, JsonRejection>,
) -> ApiResult<T> {
    if payload.is_err() {
        services.authenticate(token).await?;
    }
    body(payload)
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Uuid> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError(AppError::bad_request("Invalid id")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicConfig {
    turnstile_site_key: Option<String>,
}

async fn public_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(PublicConfig {
        turnstile_site_key: state.turnstile_site_key.clone(),
    })
}

async fn analyze(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalysisOutcome>> {
    let token = bearer(&headers);
    let request = authed_body(&state.services, token, payload).await?;
    let ip = client_ip(&headers, peer);
    let outcome = run_analysis(&state.services, token, request, ip.as_deref()).await?;
    Ok(Json(outcome))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatInput>, JsonRejection>,
) -> ApiResult<Response> {
    let input = body(payload)?;
    let stream = relay_chat(state.services.chat.clone(), input).await?;
    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn credits(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CreditSummary>> {
    Ok(Json(check_credits(&state.services, bearer(&headers)).await?))
}

async fn list_pets(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Pet>>> {
    Ok(Json(pets::list_pets(&state.services, bearer(&headers)).await?))
}

async fn get_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Pet>> {
    let id = path_id(id)?;
    Ok(Json(pets::get_pet(&state.services, bearer(&headers), id).await?))
}

async fn create_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewPet>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Pet>)> {
    let token = bearer(&headers);
    let draft = authed_body(&state.services, token, payload).await?;
    let pet = pets::create_pet(&state.services, token, draft).await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

async fn update_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewPet>, JsonRejection>,
) -> ApiResult<Json<Pet>> {
    let token = bearer(&headers);
    let draft = authed_body(&state.services, token, payload).await?;
    let id = path_id(id)?;
    let pet = pets::update_pet(&state.services, token, id, draft).await?;
    Ok(Json(pet))
}

async fn delete_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = path_id(id)?;
    pets::delete_pet(&state.services, bearer(&headers), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_scans(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Scan>>> {
    Ok(Json(scans::list_scans(&state.services, bearer(&headers)).await?))
}

async fn delete_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = path_id(id)?;
    scans::delete_scan(&state.services, bearer(&headers), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pixel size of a rendered report bitmap.
#[derive(Deserialize)]
struct CanvasSize {
    width: u32,
    height: u32,
}

/// A4 page bands for slicing a rendered report into a printable document.
async fn report_pages(
    size: Result<Query<CanvasSize>, QueryRejection>,
) -> ApiResult<Json<Vec<PageBand>>> {
    let Query(size) =
        size.map_err(|_| ApiError(AppError::bad_request("Invalid canvas size")))?;
    let bands = paginate(size.width, size.height, &PageLayout::a4())
        .map_err(|e| ApiError(AppError::bad_request(e.to_string())))?;
    Ok(Json(bands))
}
