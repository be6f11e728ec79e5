// tests/api_tests.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use certsim_backend::config::Prompts;
use certsim_backend::logic::{Evaluator, MAX_CHAT_REPLY_CHARS};
use certsim_backend::oracle::{Oracle, OracleError, OracleRequest};
use certsim_backend::otp::{MemoryOtpStore, OtpError, PasscodeNotifier};
use certsim_backend::policy::PolicyBook;
use certsim_backend::routes;
use certsim_backend::state::AppState;
use certsim_backend::store::{DocumentStore, MemoryStore, Repository, EXAM_RESULTS, USERS};

/// Keeps the last code delivered per email so tests can play the user's inbox.
#[derive(Default)]
struct Inbox {
    codes: Mutex<HashMap<String, String>>,
}

impl Inbox {
    fn code_for(&self, email: &str) -> String {
        self.codes.lock().unwrap().get(email).cloned().expect("no code delivered")
    }
}

#[async_trait]
impl PasscodeNotifier for Inbox {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), OtpError> {
        self.codes.lock().unwrap().insert(email.to_string(), code.to_string());
        Ok(())
    }
}

struct DownOracle;

#[async_trait]
impl Oracle for DownOracle {
    async fn complete(&self, _request: OracleRequest) -> Result<String, OracleError> {
        Err(OracleError::Status { status: 503, message: "upstream overloaded".into() })
    }
    fn describe(&self) -> String {
        "down".into()
    }
}

/// Answers every request with the same content.
struct FixedOracle(String);

#[async_trait]
impl Oracle for FixedOracle {
    async fn complete(&self, _request: OracleRequest) -> Result<String, OracleError> {
        Ok(self.0.clone())
    }
    fn describe(&self) -> String {
        "fixed".into()
    }
}

struct TestApp {
    address: String,
    inbox: Arc<Inbox>,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

impl TestApp {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

/// Spawn the app on a random port. `persistence = false` mimics a missing store.
async fn spawn_app(oracle: Option<Arc<dyn Oracle>>, persistence: bool) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let inbox = Arc::new(Inbox::default());

    let state = AppState {
        evaluator: Evaluator::new(oracle, Prompts::default(), PolicyBook::default()),
        otp: Arc::new(MemoryOtpStore::new()),
        notifier: inbox.clone(),
        repo: persistence.then(|| Repository::new(store.clone())),
        cors_origins: vec!["*".into()],
    };
    let app = routes::build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        inbox,
        store,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app(None, true).await;
    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn passcode_verifies_exactly_once() {
    let app = spawn_app(None, true).await;

    let (status, body) = app.post("/api/v1/auth/send-otp", json!({"email": "  Ana@Example.COM "})).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    let code = app.inbox.code_for("ana@example.com");
    assert_eq!(code.len(), 8);
    assert!(!body.to_string().contains(&code));

    let (status, _) = app
        .post("/api/v1/auth/verify-otp", json!({"email": "ana@example.com", "code": format!(" {code} ")}))
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.post("/api/v1/auth/verify-otp", json!({"email": "ana@example.com", "code": code})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid or expired code");
}

#[tokio::test]
async fn reissue_invalidates_the_previous_code() {
    let app = spawn_app(None, true).await;
    let email = "bo@example.com";

    app.post("/api/v1/auth/send-otp", json!({"email": email})).await;
    let first = app.inbox.code_for(email);
    let mut second = first.clone();
    while second == first {
        app.post("/api/v1/auth/send-otp", json!({"email": email})).await;
        second = app.inbox.code_for(email);
    }

    let (status, _) = app.post("/api/v1/auth/verify-otp", json!({"email": email, "code": first})).await;
    assert_eq!(status, 400);
    let (status, _) = app.post("/api/v1/auth/verify-otp", json!({"email": email, "code": second})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn wrong_code_and_unknown_email_look_the_same() {
    let app = spawn_app(None, true).await;
    app.post("/api/v1/auth/send-otp", json!({"email": "cy@example.com"})).await;
    let code = app.inbox.code_for("cy@example.com");
    let wrong = if code == "10000000" { "10000001" } else { "10000000" };

    let (s1, b1) = app.post("/api/v1/auth/verify-otp", json!({"email": "cy@example.com", "code": wrong})).await;
    let (s2, b2) = app.post("/api/v1/auth/verify-otp", json!({"email": "never@example.com", "code": wrong})).await;
    assert_eq!((s1, &b1), (s2, &b2));

    // The mismatch did not consume the pending code.
    let (status, _) = app.post("/api/v1/auth/verify-otp", json!({"email": "cy@example.com", "code": code})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn second_registration_replaces_the_profile() {
    let app = spawn_app(None, true).await;

    let (status, body) = app
        .post(
            "/api/v1/users/register",
            json!({"uid": "u1", "full_name": "maria GARCIA", "email": " Maria@Example.com ", "phone": "+34 600 111 222"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    let (status, _) = app
        .post("/api/v1/users/register", json!({"uid": "u1", "full_name": "maría garcía-lópez", "email": "m@example.com"}))
        .await;
    assert_eq!(status, 200);

    assert_eq!(app.store.count(USERS).await, 1);
    let doc = app.store.get(USERS, "u1").await.unwrap().unwrap();
    assert_eq!(doc["full_name"], "María García-López");
    assert_eq!(doc["email"], "m@example.com");
    assert!(doc["phone"].is_null());
}

#[tokio::test]
async fn invalid_registration_is_400() {
    let app = spawn_app(None, true).await;
    let (status, body) = app
        .post("/api/v1/users/register", json!({"uid": "u1", "full_name": "Ana", "email": "not-an-email"}))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().is_some());
    assert_eq!(app.store.count(USERS).await, 0);
}

#[tokio::test]
async fn failed_evaluation_is_still_persisted() {
    let app = spawn_app(Some(Arc::new(DownOracle)), true).await;

    let (status, body) = app
        .post(
            "/api/v1/exams/submit",
            json!({"user_id": "u1", "module": "writing", "level": "B2", "content": "Dear Tom, I am writing..."}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["degraded"], true);
    assert_eq!(body["results"]["score"], 0.0);
    assert!(!body["results"]["feedback"].as_str().unwrap().is_empty());

    let id = body["firebase_id"].as_str().unwrap();
    let record = app.store.get(EXAM_RESULTS, id).await.unwrap().unwrap();
    assert_eq!(record["user_id"], "u1");
    assert_eq!(record["module"], "writing");
    assert_eq!(record["analysis"]["score"], 0.0);
    assert!(record["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn scored_submission_carries_module_fields() {
    let reply = r#"{"score": 78, "feedback": "Good range.", "corrections": ["I am agree -> I agree"], "suggestions": []}"#;
    let app = spawn_app(Some(Arc::new(FixedOracle(reply.into()))), true).await;

    let (status, body) = app
        .post("/api/v1/exams/submit", json!({"user_id": "u2", "module": "Writing", "content": "I am agree."}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["degraded"], false);
    assert_eq!(body["results"]["score"], 78.0);
    assert_eq!(body["results"]["corrections"], json!(["I am agree -> I agree"]));
    assert_eq!(app.store.count(EXAM_RESULTS).await, 1);
}

#[tokio::test]
async fn submit_without_store_is_503() {
    let app = spawn_app(Some(Arc::new(DownOracle)), false).await;
    let (status, body) = app
        .post("/api/v1/exams/submit", json!({"user_id": "u1", "module": "reading", "content": {"answers": []}}))
        .await;
    assert_eq!(status, 503);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn unknown_module_generation_is_well_formed() {
    let app = spawn_app(Some(Arc::new(DownOracle)), true).await;
    let (status, body) = app.post("/api/v1/exams/generate", json!({"module": "astrology", "level": "B1"})).await;
    assert_eq!(status, 200);
    assert!(body["title"].as_str().is_some());
    assert!(body["passage"].as_str().is_some());

    let (status, body) = app.post("/api/v1/exams/generate", json!({"module": "reading", "level": "B1"})).await;
    assert_eq!(status, 200);
    let questions = body["questions"].as_array().unwrap();
    assert!(!questions.is_empty());
    for q in questions {
        assert!(q["options"].as_array().unwrap().contains(&q["correct_answer"]));
    }
}

#[tokio::test]
async fn report_defaults_missing_scores_to_zero() {
    let app = spawn_app(Some(Arc::new(DownOracle)), true).await;
    let (status, body) = app.post("/api/v1/exams/report", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["scores"], json!({"reading": 0.0, "writing": 0.0, "listening": 0.0, "speaking": 0.0}));
    assert!(!body["advice"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn writing_grade_and_chat_are_bounded() {
    let long = "Use the present perfect here. ".repeat(60);
    let app = spawn_app(Some(Arc::new(FixedOracle(long))), true).await;

    let (status, body) = app.post("/api/v1/exams/chat", json!({"message": "When do I use 'since'?"})).await;
    assert_eq!(status, 200);
    assert!(body["reply"].as_str().unwrap().chars().count() <= MAX_CHAT_REPLY_CHARS);

    // Non-JSON content from the oracle degrades to the canned grade.
    let (status, body) = app
        .post("/api/v1/exams/grade-writing", json!({"content": "My town is nice.", "level": "B1", "prompt": "Describe your town"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["score"], 0);
    assert!(body["feedback"].as_str().is_some());
}
