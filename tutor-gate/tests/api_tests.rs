//! HTTP API tests
//!
//! Drives the router with `oneshot` over the in-memory store and a
//! scripted provider.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use tutor_common::ManualClock;
use tutor_gate::api::SESSION_HEADER;
use tutor_gate::models::Identity;
use tutor_gate::services::generation::{RetryPolicy, ScriptedBackend};
use tutor_gate::store::MemoryEntitlementStore;
use tutor_gate::{build_router, AppState, GateSettings};

const ADMIN: &str = "boss@x.ma";

struct TestApp {
    router: Router,
    backend: Arc<ScriptedBackend>,
}

fn create_test_app() -> TestApp {
    let backend = Arc::new(ScriptedBackend::new());
    let settings = GateSettings {
        daily_base_allowance: 2,
        referral_bonus: 10,
        public_base_url: "http://tutor.test/".to_string(),
        admin: Some(Identity::parse(ADMIN).unwrap()),
        retry: RetryPolicy::new(2, Duration::ZERO),
        session_idle_timeout: Duration::from_secs(3600),
    };
    let state = AppState::new(
        Arc::new(MemoryEntitlementStore::new()),
        backend.clone(),
        Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap())),
        settings,
    );
    TestApp {
        router: build_router(state),
        backend,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(SESSION_HEADER, token);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register and return the session token
    async fn register(&self, email: &str) -> String {
        let (status, json) = self
            .send(
                "POST",
                "/api/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "secret1",
                    "password_confirm": "secret1"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["token"].as_str().unwrap().to_string()
    }

    async fn ask(&self, token: &str, prompt: &str) -> (StatusCode, Value) {
        self.send("POST", "/api/ask", Some(token), Some(json!({ "prompt": prompt })))
            .await
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "tutor-gate");
    assert_eq!(json["active_sessions"], 0);
}

#[tokio::test]
async fn test_register_then_login() {
    let app = create_test_app();

    let (status, json) = app
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({
                "email": "Lina@X.ma",
                "password": "secret1",
                "password_confirm": "secret1"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["email"], "lina@x.ma");
    assert_eq!(json["quota"]["limit"], 2);
    assert_eq!(json["quota"]["remaining"], 2);
    assert_eq!(json["referred_by"], Value::Null);

    let (status, json) = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "lina@x.ma", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].is_string());

    let (status, json) = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "lina@x.ma", "password": "wrong!!" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_passwords() {
    let app = create_test_app();
    app.register("dup@x.ma").await;

    let (status, json) = app
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "email": "dup@x.ma", "password": "secret1", "password_confirm": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");

    let (status, _) = app
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "email": "new@x.ma", "password": "secret1", "password_confirm": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_need_a_live_session() {
    let app = create_test_app();

    let (status, _) = app.send("GET", "/api/quota", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("GET", "/api/quota", Some("not-a-uuid"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.register("omar@x.ma").await;
    let (status, _) = app.send("GET", "/api/quota", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("POST", "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = app.send("GET", "/api/quota", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_ask_until_quota_exhausted() {
    let app = create_test_app();
    let token = app.register("student@x.ma").await;

    let (status, json) = app.ask(&token, "Solve 2x + 3 = 7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "Mock answer");
    assert_eq!(json["answered"], true);
    assert_eq!(json["remaining_quota"]["remaining"], 1);

    let (status, _) = app.ask(&token, "And 3x = 9?").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.ask(&token, "One more").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "QUOTA_EXHAUSTED");
    assert_eq!(app.backend.call_count(), 2);

    let (_, quota) = app.send("GET", "/api/quota", Some(&token), None).await;
    assert_eq!(quota["used"], 2);
    assert_eq!(quota["remaining"], 0);
}

#[tokio::test]
async fn test_ask_validation() {
    let app = create_test_app();
    let token = app.register("val@x.ma").await;

    let (status, _) = app
        .send("POST", "/api/ask", Some(&token), Some(json!({ "prompt": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            "POST",
            "/api/ask",
            Some(&token),
            Some(json!({ "image": { "data": "R0lGODlh", "mime_type": "image/gif" } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");

    let (status, _) = app
        .send(
            "POST",
            "/api/ask",
            Some(&token),
            Some(json!({ "image": { "data": "iVBORw0KGgo=", "file_name": "exercice.png" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.backend.call_count(), 1);
    assert_eq!(
        app.backend.requests()[0].image.as_ref().unwrap().data,
        vec![137, 80, 78, 71, 13, 10, 26, 10]
    );
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let app = create_test_app();
    let token = app.register("unlucky@x.ma").await;
    app.backend.push_network_error("connection reset");
    app.backend.push_network_error("connection reset");

    let (status, json) = app.ask(&token, "q").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "NETWORK_EXHAUSTED");

    let (_, quota) = app.send("GET", "/api/quota", Some(&token), None).await;
    assert_eq!(quota["used"], 1);
}

#[tokio::test]
async fn test_preferences_and_password() {
    let app = create_test_app();
    let token = app.register("pref@x.ma").await;

    let (status, json) = app.send("GET", "/api/preferences", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["language"], "french");
    assert_eq!(json["response_style"], "steps");

    let update = json!({
        "language": "english",
        "response_style": "answer",
        "school_level": "1ère Année Bac"
    });
    let (status, json) = app
        .send("PUT", "/api/preferences", Some(&token), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, update);

    let (status, _) = app
        .send(
            "POST",
            "/api/password",
            Some(&token),
            Some(json!({ "new_password": "changed1", "confirm_password": "changed1" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "pref@x.ma", "password": "changed1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_referral_link_and_query_tag() {
    let app = create_test_app();
    let token = app.register("amal@x.ma").await;

    let (status, json) = app
        .send(
            "POST",
            "/api/register?ref_code=amal%40x.ma",
            None,
            Some(json!({ "email": "zoe@x.ma", "password": "secret1", "password_confirm": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["referred_by"], "amal@x.ma");
    assert_eq!(json["bonus_granted"], true);

    let (status, json) = app.send("GET", "/api/referrals", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["link"], "http://tutor.test/?ref_code=amal%40x.ma");
    assert_eq!(json["bonus_per_referral"], 10);
    assert_eq!(json["bonus_allowance"], 10);
    assert_eq!(json["daily_total"], 12);
    assert_eq!(json["referral_count"], 1);
    assert_eq!(json["referred_users"], json!(["zoe@x.ma"]));
}

#[tokio::test]
async fn test_admin_dashboard() {
    let app = create_test_app();
    let admin = app.register(ADMIN).await;
    let student = app.register("student@x.ma").await;

    let (status, json) = app.send("GET", "/api/admin/users", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    let (status, json) = app.send("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_users"], 1);
    assert_eq!(json["users"][0]["identity"], "student@x.ma");

    let (status, _) = app
        .send(
            "PUT",
            "/api/admin/users/student@x.ma",
            Some(&admin),
            Some(json!({ "bonus_allowance": -1, "is_unlimited": false })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            "PUT",
            "/api/admin/users/student@x.ma",
            Some(&admin),
            Some(json!({ "bonus_allowance": 5, "is_unlimited": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["daily_limit"], 7);

    let (status, _) = app
        .send(
            "PUT",
            "/api/admin/users/ghost@x.ma",
            Some(&admin),
            Some(json!({ "bonus_allowance": 1, "is_unlimited": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the live session picks up the new limit on its next question
    let (status, json) = app.ask(&student, "q").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remaining_quota"]["remaining"], 6);
}
