#![allow(dead_code)]

use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use aristocratii_api::{AppState, AppStateInner, router};
use aristocratii_db::Database;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
}

impl TestApp {
    pub fn new() -> Self {
        let upload_dir = std::env::temp_dir().join(format!("aristocratii-test-{}", Uuid::new_v4()));
        let state = AppStateInner::new(Database::open_in_memory().unwrap(), upload_dir.clone(), 1024 * 1024);
        Self {
            router: router(state.clone()),
            state,
            upload_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(req).await;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn send_raw(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Register a user and return their id.
    pub async fn register(&self, username: &str, password: &str) -> i64 {
        let (status, body) = self
            .post(
                "/register",
                serde_json::json!({
                    "username": username,
                    "password": password,
                    "email": format!("{}@x.com", username),
                    "isVerified": "PERSON",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        body["id"].as_i64().unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}
