//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::protocol::{HealthOut, RootOut};
use crate::state::AppState;

pub mod auth;
pub mod exams;
pub mod users;

/// Build the application router with:
/// - liveness at `/` and `/api/v1/health`
/// - passcode auth under `/api/v1/auth/...`
/// - profile registration under `/api/v1/users/...`
/// - exam generation, grading, submission, report and chat under `/api/v1/exams/...`
/// - CORS restricted to the configured origins (`*` allows any)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/api/v1/health", get(health))
        // Auth
        .route("/api/v1/auth/send-otp", post(auth::send_otp))
        .route("/api/v1/auth/verify-otp", post(auth::verify_otp))
        // Users
        .route("/api/v1/users/register", post(users::register))
        // Exams
        .route("/api/v1/exams/generate", post(exams::generate))
        .route("/api/v1/exams/grade-writing", post(exams::grade_writing))
        .route("/api/v1/exams/submit", post(exams::submit))
        .route("/api/v1/exams/report", post(exams::report))
        .route("/api/v1/exams/chat", post(exams::chat))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(cors),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(target: "certsim_backend", origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

async fn root() -> Json<RootOut> {
    Json(RootOut { message: "API is online", docs: "/api/v1/health" })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
    Json(HealthOut {
        ok: true,
        oracle: state.evaluator.oracle_label(),
        store: state.store_label(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{Settings, StoreBackend};

    fn app(backend: StoreBackend) -> Router {
        let mut settings = Settings::from_lookup(|_| None);
        settings.store.backend = backend;
        build_router(Arc::new(AppState::from_settings(&settings, None)))
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).header("content-type", "application/json");
        let req = match body {
            Some(b) => req.body(Body::from(b.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn root_and_health_answer() {
        let (status, body) = call(app(StoreBackend::Memory), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API is online");

        let (status, body) = call(app(StoreBackend::Memory), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "oracle": "oracle disabled", "store": "memory"}));
    }

    #[tokio::test]
    async fn verify_without_issue_is_400_with_fixed_message() {
        let (status, body) = call(
            app(StoreBackend::Memory),
            "POST",
            "/api/v1/auth/verify-otp",
            Some(json!({"email": "nobody@example.com", "code": "12345678"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], crate::error::INVALID_PASSCODE_MESSAGE);
    }

    #[tokio::test]
    async fn register_without_store_is_503() {
        let (status, _) = call(
            app(StoreBackend::Disabled),
            "POST",
            "/api/v1/users/register",
            Some(json!({"uid": "u1", "full_name": "ana lopez", "email": "ana@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn oracle_endpoints_stay_200_without_a_key() {
        let (status, body) = call(
            app(StoreBackend::Memory),
            "POST",
            "/api/v1/exams/report",
            Some(json!({"level": "B2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scores"], json!({"reading": 0.0, "writing": 0.0, "listening": 0.0, "speaking": 0.0}));
        assert!(!body["steps"].as_array().unwrap().is_empty());

        let (status, body) =
            call(app(StoreBackend::Memory), "POST", "/api/v1/exams/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["reply"].as_str().is_some());
    }

    #[tokio::test]
    async fn empty_chat_message_is_rejected() {
        let (status, body) =
            call(app(StoreBackend::Memory), "POST", "/api/v1/exams/chat", Some(json!({"message": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());

        let (status, _) =
            call(app(StoreBackend::Memory), "POST", "/api/v1/exams/chat", Some(json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn wildcard_origin_is_accepted() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
