#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use chrono::Duration;
use http_body_util::BodyExt;
use prep_app::{AppState, router};
use prep_core::time::{fixed_clock, fixed_now};
use serde_json::{Value, json};
use services::{AppServices, RateLimitPolicy};
use storage::seed::seed_master_data;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "Secret123";

pub struct TestApp {
    pub router: Router,
    pub services: AppServices,
}

/// A router over a fresh in-memory database with master data and an admin.
pub async fn spawn(name: &str) -> TestApp {
    spawn_with_policy(name, RateLimitPolicy::default()).await
}

pub async fn spawn_with_policy(name: &str, policy: RateLimitPolicy) -> TestApp {
    let url = format!("sqlite:file:memdb_app_{name}?mode=memory&cache=shared");
    let services = AppServices::new_sqlite(&url, fixed_clock())
        .await
        .expect("services should start")
        .with_session_ttl(Duration::days(30));
    seed_master_data(services.storage(), fixed_now())
        .await
        .expect("seed master data");
    services
        .auth()
        .ensure_admin(ADMIN_EMAIL, PASSWORD)
        .await
        .expect("create admin");

    let state = AppState::new(services.clone(), policy, false);
    TestApp {
        router: router(state),
        services,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("router should respond");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be json")
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request(Method::PATCH, uri, token, Some(body))).await
    }

    /// Log in and return the session token.
    pub async fn login(&self, email: &str) -> String {
        let resp = self
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
        resp.body["data"]["token"]
            .as_str()
            .expect("token in login response")
            .to_owned()
    }

    /// Register a user preparing for `exam_code` and log them in.
    pub async fn student(&self, email: &str, exam_code: Option<&str>) -> String {
        let resp = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "firstName": "Ayşe",
                    "lastName": "Yılmaz",
                    "examCode": exam_code,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
        self.login(email).await
    }
}

/// Build a request, sending the token as the `session` cookie.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(COOKIE, format!("session={token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request build should succeed")
}
