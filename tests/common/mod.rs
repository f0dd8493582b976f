#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{DateTime, Utc};
use courseops::db::{Database, SubscriptionStatus, UserRole};
use courseops::password::hash_password;
use courseops::{ServerConfig, create_app};
use serde_json::Value;
use std::sync::OnceLock;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-jwt-secret-for-testing-0123456789";
pub const ADMIN_KEY: &str = "test-admin-key-abcdef123456";

pub const OWNER_EMAIL: &str = "owner@acme.test";
pub const OWNER_PASSWORD: &str = "owner-password-1";
pub const USER_EMAIL: &str = "alice@acme.test";
pub const USER_PASSWORD: &str = "alice-password-1";

/// Password hashing is deliberately slow; hash each fixture password once
/// per test binary.
fn owner_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(OWNER_PASSWORD).expect("Failed to hash password"))
}

fn user_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(USER_PASSWORD).expect("Failed to hash password"))
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub tenant_id: i64,
    pub user_id: i64,
}

/// An app with one tenant (active subscription, far-future expiry), its
/// tenant-admin login, and one active user.
pub async fn setup() -> TestApp {
    setup_with_subscription(
        SubscriptionStatus::Active,
        Some(Utc::now() + chrono::Duration::days(365)),
    )
    .await
}

pub async fn setup_with_subscription(
    status: SubscriptionStatus,
    expires_at: Option<DateTime<Utc>>,
) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let tenant_id = db
        .accounts()
        .create(
            OWNER_EMAIL,
            "Acme Training",
            owner_hash(),
            "pro",
            status,
            expires_at.as_ref(),
            10,
        )
        .await
        .expect("Failed to seed account");

    let user_id = db
        .users()
        .create(tenant_id, USER_EMAIL, user_hash(), UserRole::User)
        .await
        .expect("Failed to seed user");

    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.as_bytes().to_vec(),
        admin_key: ADMIN_KEY.as_bytes().to_vec(),
    };

    TestApp {
        app: create_app(&config),
        db,
        tenant_id,
        user_id,
    }
}

/// Send one request to the app and decode the JSON response (Null when the
/// body is empty).
pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    bearer: Option<&str>,
    admin_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);

    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    if let Some(key) = admin_key {
        builder = builder.header("X-Admin-Key", key);
    }

    let body = match body {
        Some(value) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("Failed to build request"))
        .await
        .expect("Request failed");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response body is not JSON")
    };

    (status, json)
}

pub async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, path, Some(body), None, None).await
}

/// Log in and return the response body. Panics unless the login succeeds.
pub async fn login(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = post_json(
        app,
        "/auth/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

pub fn access_token(login_body: &Value) -> String {
    login_body["accessToken"].as_str().expect("no accessToken").to_string()
}

pub fn refresh_token(login_body: &Value) -> String {
    login_body["refreshToken"].as_str().expect("no refreshToken").to_string()
}
