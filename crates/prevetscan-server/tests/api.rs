// Router-level tests against in-memory vendor fakes.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use prevetscan_app::fakes::{FakeChat, Harness, TINY_IMAGE, VALID_TOKEN};
use prevetscan_llm::ChatEvent;
use prevetscan_server::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(harness: &Harness) -> Router {
    let state = AppState::new(harness.services(), Some("site-key-123".into()));
    router(state, &[])
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn analyze_body() -> Value {
    json!({
        "image": TINY_IMAGE,
        "category": "Eyes",
        "turnstileToken": "challenge-ok"
    })
}

#[tokio::test]
async fn health_is_ok() {
    let h = Harness::with_credits(0);
    let (status, body) = send_json(app(&h), request("GET", "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn config_exposes_site_key() {
    let h = Harness::with_credits(0);
    let (status, body) = send_json(app(&h), request("GET", "/api/config", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "turnstileSiteKey": "site-key-123" }));
}

#[tokio::test]
async fn analyze_success_returns_scan_and_balance() {
    let h = Harness::with_credits(2);
    let (status, body) = send_json(
        app(&h),
        request("POST", "/api/analyze", Some(VALID_TOKEN), Some(analyze_body())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["creditsRemaining"], 1);
    assert_eq!(body["severity"], "Moderate");
    assert!(body["scanId"].is_string());
    assert_eq!(h.backend.scans().len(), 1);
}

#[tokio::test]
async fn analyze_without_session_is_401() {
    let h = Harness::with_credits(2);
    let (status, body) =
        send_json(app(&h), request("POST", "/api/analyze", None, Some(analyze_body()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "No authorization" }));
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn analyze_without_credits_is_402() {
    let h = Harness::with_credits(0);
    let (status, body) = send_json(
        app(&h),
        request("POST", "/api/analyze", Some(VALID_TOKEN), Some(analyze_body())),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "Insufficient credits");
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn analyze_missing_token_is_400() {
    let h = Harness::with_credits(2);
    let mut body = analyze_body();
    body.as_object_mut().unwrap().remove("turnstileToken");

    let (status, body) = send_json(
        app(&h),
        request("POST", "/api/analyze", Some(VALID_TOKEN), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing verification token");
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn analyze_malformed_body_is_400() {
    let h = Harness::with_credits(2);
    let req = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("authorization", format!("Bearer {VALID_TOKEN}"))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(app(&h), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn analyze_rejects_get() {
    let h = Harness::with_credits(2);
    let (status, _) = send(app(&h), request("GET", "/api/analyze", None, None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn chat_streams_plain_text() {
    let h = Harness::with_credits(0).chat(FakeChat::scripted(vec![
        ChatEvent::Token { text: "That estimate ".into() },
        ChatEvent::Token { text: "looks high.".into() },
        ChatEvent::Done,
    ]));
    let req = request(
        "POST",
        "/api/chat",
        None,
        Some(json!({ "history": [], "message": "Is $900 fair?", "useDeepThinking": false })),
    );

    let response = app(&h).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"That estimate looks high.");
}

#[tokio::test]
async fn chat_with_no_chunks_returns_empty_body() {
    let h = Harness::with_credits(0).chat(FakeChat::scripted(vec![ChatEvent::Done]));
    let (status, body) = send(
        app(&h),
        request("POST", "/api/chat", None, Some(json!({ "message": "hi" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn chat_upstream_failure_is_500() {
    let h = Harness::with_credits(0).chat(FakeChat::scripted(vec![ChatEvent::Error {
        message: "quota".into(),
    }]));
    let (status, body) = send_json(
        app(&h),
        request("POST", "/api/chat", None, Some(json!({ "message": "hi" }))),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Chat failed");
}

#[tokio::test]
async fn check_credits_reports_balance() {
    let h = Harness::with_credits(5);
    let (status, body) = send_json(
        app(&h),
        request("GET", "/api/check-credits", Some(VALID_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "credits": 5, "expiresAt": null, "expiresToday": false })
    );
}

#[tokio::test]
async fn pet_create_then_list_round_trip() {
    let h = Harness::with_credits(0);
    let draft = json!({
        "name": "Pepper",
        "species": "rabbit",
        "breed": "Holland Lop",
        "age_years": 1,
        "age_months": 4,
        "weight_kg": 1.7
    });

    let (status, created) = send_json(
        app(&h),
        request("POST", "/api/pets", Some(VALID_TOKEN), Some(draft)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Pepper");

    let (status, listed) =
        send_json(app(&h), request("GET", "/api/pets", Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([created]));
}

#[tokio::test]
async fn pet_fetch_by_id() {
    let h = Harness::with_credits(0);
    let draft = json!({
        "name": "Biscuit",
        "species": "dog",
        "age_years": 4,
        "age_months": 0,
        "weight_kg": 12.5
    });
    let (_, created) = send_json(
        app(&h),
        request("POST", "/api/pets", Some(VALID_TOKEN), Some(draft)),
    )
    .await;
    let uri = format!("/api/pets/{}", created["id"].as_str().unwrap());

    let (status, fetched) = send_json(app(&h), request("GET", &uri, Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, _) = send_json(app(&h), request("GET", &uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let missing = format!("/api/pets/{}", uuid::Uuid::new_v4());
    let (status, body) =
        send_json(app(&h), request("GET", &missing, Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn pet_with_bad_weight_is_400() {
    let h = Harness::with_credits(0);
    let draft = json!({
        "name": "Pepper",
        "species": "rabbit",
        "age_years": 1,
        "age_months": 4,
        "weight_kg": 0.0
    });
    let (status, _) = send_json(
        app(&h),
        request("POST", "/api/pets", Some(VALID_TOKEN), Some(draft)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.backend.pets().is_empty());
}

#[tokio::test]
async fn invalid_path_id_is_400() {
    let h = Harness::with_credits(0);
    let (status, body) = send_json(
        app(&h),
        request("DELETE", "/api/pets/not-a-uuid", Some(VALID_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid id");
}

#[tokio::test]
async fn scan_history_and_delete() {
    let h = Harness::with_credits(3);
    let (_, outcome) = send_json(
        app(&h),
        request("POST", "/api/analyze", Some(VALID_TOKEN), Some(analyze_body())),
    )
    .await;
    let scan_id = outcome["scanId"].as_str().unwrap().to_string();

    let (status, scans) =
        send_json(app(&h), request("GET", "/api/scans", Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scans[0]["id"], scan_id.as_str());

    let uri = format!("/api/scans/{scan_id}");
    let (status, _) = send(app(&h), request("DELETE", &uri, Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send_json(app(&h), request("DELETE", &uri, Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn credit_rpc_404_is_reported_as_500() {
    let h = Harness::with_credits(3);
    h.backend
        .fail_next_balance(prevetscan_baas::BaasError::NotFound);
    let (status, body) =
        send_json(app(&h), request("GET", "/api/check-credits", Some(VALID_TOKEN), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to check credits");
}

#[tokio::test]
async fn report_pages_slice_canvas_into_a4_bands() {
    let h = Harness::with_credits(0);
    let (status, bands) = send_json(
        app(&h),
        request("GET", "/api/report/pages?width=1900&height=6000", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bands = bands.as_array().unwrap();
    assert_eq!(bands.len(), 3);
    assert_eq!(bands[1]["sourceYPx"], 2770);
    assert_eq!(bands[2]["sourceHeightPx"], 460);

    let (status, body) = send_json(
        app(&h),
        request("GET", "/api/report/pages?width=0&height=10", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("non-empty"));

    let (status, _) = send_json(
        app(&h),
        request("GET", "/api/report/pages?width=wide", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
