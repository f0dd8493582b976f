//! End-to-end tests for login, refresh, logout, and the request pipeline.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::*;
use courseops::db::SubscriptionStatus;
use courseops::kv::KeyValueStore;
use courseops::subscription::subscription_key;
use serde_json::json;

#[tokio::test]
async fn test_login_returns_working_token_pair() {
    let ctx = setup().await;

    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    assert_eq!(body["expiresIn"], 86400);
    assert_eq!(body["user"]["email"], USER_EMAIL);
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["isTenantAdmin"], false);
    assert_eq!(body["client"]["name"], "Acme Training");
    assert_eq!(body["client"]["plan"], "pro");

    // The issued access token authenticates /auth/me and the claims match
    // the user that logged in.
    let token = access_token(&body);
    let (status, me) = send(&ctx.app, Method::GET, "/auth/me", None, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], USER_EMAIL);
    assert_eq!(me["user"]["id"], ctx.user_id);
    assert_eq!(me["client"]["id"], ctx.tenant_id);
}

#[tokio::test]
async fn test_login_as_tenant_admin_uses_reserved_user_id() {
    let ctx = setup().await;

    let body = login(&ctx.app, OWNER_EMAIL, OWNER_PASSWORD).await;
    assert_eq!(body["user"]["id"], 0);
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["isTenantAdmin"], true);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
    let ctx = setup().await;

    let (status_a, body_a) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": USER_EMAIL, "password": "wrong-password" }),
    )
    .await;
    let (status_b, body_b) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": "nobody@nowhere.test", "password": "wrong-password" }),
    )
    .await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    // Identical response shape: no account enumeration.
    assert_eq!(body_a, body_b);
    assert_eq!(body_a["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_login_missing_fields_fails_closed() {
    let ctx = setup().await;

    let (status, body) = post_json(&ctx.app, "/auth/login", json!({ "email": USER_EMAIL })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": "", "password": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong-typed field is rejected before any credential check runs.
    let (status, body) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": 42, "password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_deactivated_user_cannot_login() {
    let ctx = setup().await;
    ctx.db.users().set_active(ctx.user_id, false).await.unwrap();

    let (status, body) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": USER_EMAIL, "password": USER_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCOUNT_DISABLED");
}

#[tokio::test]
async fn test_login_blocked_for_expired_subscription() {
    let ctx = setup_with_subscription(
        SubscriptionStatus::Active,
        Some(Utc::now() - Duration::days(1)),
    )
    .await;

    let (status, body) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": USER_EMAIL, "password": USER_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SUBSCRIPTION_EXPIRED");
}

#[tokio::test]
async fn test_login_blocked_for_suspended_subscription() {
    let ctx = setup_with_subscription(SubscriptionStatus::Suspended, None).await;

    let (status, body) = post_json(
        &ctx.app,
        "/auth/login",
        json!({ "email": USER_EMAIL, "password": USER_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SUBSCRIPTION_SUSPENDED");
}

#[tokio::test]
async fn test_refresh_rotates_tokens_and_old_refresh_is_single_use() {
    let ctx = setup().await;
    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    let a1 = access_token(&body);
    let r1 = refresh_token(&body);

    let (status, rotated) =
        post_json(&ctx.app, "/auth/refresh", json!({ "refreshToken": r1 })).await;
    assert_eq!(status, StatusCode::OK);
    let a2 = access_token(&rotated);
    let r2 = refresh_token(&rotated);
    assert_ne!(a2, a1);
    assert_ne!(r2, r1);

    // The rotated-out token is gone.
    let (status, body) = post_json(&ctx.app, "/auth/refresh", json!({ "refreshToken": r1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_EXPIRED");

    // The replacement works.
    let (status, _) = post_json(&ctx.app, "/auth/refresh", json!({ "refreshToken": r2 })).await;
    assert_eq!(status, StatusCode::OK);

    // The new access token is live.
    let (status, _) = send(&ctx.app, Method::GET, "/auth/me", None, Some(&a2), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_access_token_rejected_by_refresh() {
    let ctx = setup().await;
    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    let a1 = access_token(&body);

    let (status, body) = post_json(&ctx.app, "/auth/refresh", json!({ "refreshToken": a1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn test_refresh_missing_token_rejected() {
    let ctx = setup().await;

    let (status, body) = post_json(&ctx.app, "/auth/refresh", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_refresh_rejected_after_user_deactivation() {
    let ctx = setup().await;
    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    let r1 = refresh_token(&body);

    ctx.db.users().set_active(ctx.user_id, false).await.unwrap();

    let (status, body) = post_json(&ctx.app, "/auth/refresh", json!({ "refreshToken": r1 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCOUNT_DISABLED");
}

#[tokio::test]
async fn test_logout_revokes_access_token_that_still_verifies() {
    let ctx = setup().await;
    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    let a1 = access_token(&body);

    let (status, out) = send(
        &ctx.app,
        Method::POST,
        "/auth/logout",
        None,
        Some(&a1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);

    // The token is cryptographically valid for another 24 hours, but its
    // session record is gone.
    let (status, body) = send(&ctx.app, Method::GET, "/auth/me", None, Some(&a1), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn test_logout_with_refresh_token_revokes_it() {
    let ctx = setup().await;
    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    let a1 = access_token(&body);
    let r1 = refresh_token(&body);

    let (status, _) = send(
        &ctx.app,
        Method::POST,
        "/auth/logout",
        Some(json!({ "refreshToken": r1 })),
        Some(&a1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(&ctx.app, "/auth/refresh", json!({ "refreshToken": r1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_is_idempotent_and_never_fails() {
    let ctx = setup().await;

    // No token, no body.
    let (status, out) = send(&ctx.app, Method::POST, "/auth/logout", None, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);

    // Garbage bearer and garbage body.
    let (status, out) = send(
        &ctx.app,
        Method::POST,
        "/auth/logout",
        Some(json!({ "refreshToken": "not-a-token" })),
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);
}

#[tokio::test]
async fn test_tenant_route_without_token() {
    let ctx = setup().await;

    let (status, body) = send(&ctx.app, Method::GET, "/auth/me", None, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn test_tenant_route_with_invalid_token() {
    let ctx = setup().await;

    let (status, body) = send(
        &ctx.app,
        Method::GET,
        "/auth/me",
        None,
        Some("deadbeef.invalid.token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn test_stale_active_cache_is_demoted_on_first_request() {
    let ctx = setup().await;
    let body = login(&ctx.app, USER_EMAIL, USER_PASSWORD).await;
    let a1 = access_token(&body);

    // Simulate a subscription record cached while active whose expiry has
    // since passed.
    let stale = json!({
        "status": "active",
        "plan": "pro",
        "expiresAt": (Utc::now() - Duration::days(1)).to_rfc3339(),
        "updatedAt": (Utc::now() - Duration::days(10)).to_rfc3339(),
        "updatedBy": "read",
        "notes": null,
    });
    ctx.db
        .kv()
        .put(&subscription_key(ctx.tenant_id), &stale.to_string(), 3600)
        .await
        .unwrap();

    // First authenticated request after expiry: rejected, never silently
    // treated as active.
    let (status, body) = send(&ctx.app, Method::GET, "/auth/me", None, Some(&a1), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SUBSCRIPTION_EXPIRED");

    // And the cached record was demoted in place.
    let cached = ctx
        .db
        .kv()
        .get(&subscription_key(ctx.tenant_id))
        .await
        .unwrap()
        .unwrap();
    let cached: serde_json::Value = serde_json::from_str(&cached).unwrap();
    assert_eq!(cached["status"], "expired");
}

#[tokio::test]
async fn test_cors_preflight_and_response_headers() {
    let ctx = setup().await;

    // Preflight is answered before classification: no auth, empty body.
    let request = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/auth/me")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());

    // Ordinary responses carry the headers too.
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/auth/me")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_login_rate_limit_kicks_in() {
    let ctx = setup().await;

    let mut limited = 0;
    for _ in 0..20 {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header("Content-Type", "application/json")
            .header("X-Forwarded-For", "203.0.113.5")
            .body(axum::body::Body::from(
                json!({ "email": "nobody@nowhere.test", "password": "wrong" }).to_string(),
            ))
            .unwrap();
        let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
            .await
            .unwrap();
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert!(limited > 0, "expected some requests to be rate limited");
}
