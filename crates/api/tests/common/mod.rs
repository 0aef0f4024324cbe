#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use filmnesia_events::{
    BestEffortPublisher, EventPublisher, FailureCounter, PublishError, UserRegisteredEvent,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use filmnesia_api::config::ServerConfig;
use filmnesia_api::router::build_app_router;
use filmnesia_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

// ---------------------------------------------------------------------------
// Publishers
// ---------------------------------------------------------------------------

/// Keeps every published event in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<UserRegisteredEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<UserRegisteredEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Behaves like a broker that refuses every message.
pub struct UnreachableBroker;

#[async_trait]
impl EventPublisher for UnreachableBroker {
    async fn publish(&self, _event: &UserRegisteredEvent) -> Result<(), PublishError> {
        Err(PublishError::Nacked {
            exchange: "user_events".to_string(),
            routing_key: "user.registered".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// The router plus the failure counter its publisher reports into.
pub struct TestApp {
    pub router: Router,
    pub publish_failures: Arc<FailureCounter>,
}

/// Build the full application router with all middleware layers, using the
/// given database pool and publisher.
pub fn build_test_app(pool: PgPool, publisher: Arc<dyn EventPublisher>) -> TestApp {
    let config = test_config();
    let publish_failures = Arc::new(FailureCounter::new());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        notifier: BestEffortPublisher::new(publisher, publish_failures.clone()),
        publish_failures: publish_failures.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        publish_failures,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Check a stored PHC hash against a plaintext password.
pub fn password_matches(password: &str, hash: &str) -> bool {
    let parsed = PasswordHash::new(hash).expect("stored hash should be a PHC string");
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
