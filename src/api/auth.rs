//! Authentication endpoints.
//!
//! - POST `/login` - Exchange email+password for an access/refresh pair
//! - POST `/refresh` - Rotate a refresh token into a new pair
//! - POST `/logout` - Revoke the presented tokens; always succeeds
//! - GET `/me` - Resolved identity and tenant view for the current session

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::error::{ApiError, ResultExt};
use super::extract::ValidatedJson;
use crate::auth::{Identity, bearer_token};
use crate::db::{Account, Database, User, UserRole};
use crate::jwt::{JwtConfig, TokenIdentity};
use crate::password::verify_password;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::session::{SessionRecord, SessionStore};
use crate::subscription::{GateError, SubscriptionGate};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionStore,
    pub subscriptions: SubscriptionGate,
}

pub fn router(state: AuthState, rate_limits: Arc<RateLimitConfig>) -> Router {
    let login_route = Router::new()
        .route("/login", post(login))
        .layer(axum::middleware::from_fn_with_state(
            rate_limits,
            rate_limit_login,
        ));

    Router::new()
        .merge(login_route)
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

/// The caller's user view in login and `/me` responses.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserView {
    id: i64,
    email: String,
    role: UserRole,
    is_tenant_admin: bool,
}

/// The tenant view in login and `/me` responses.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientView {
    id: i64,
    name: String,
    plan: String,
    subscription_status: crate::db::SubscriptionStatus,
    subscription_expires_at: Option<DateTime<Utc>>,
    max_seats: i64,
}

impl ClientView {
    fn from_account(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            plan: account.plan.clone(),
            subscription_status: account.subscription_status,
            subscription_expires_at: account.subscription_expires_at,
            max_seats: account.max_seats,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    user: UserView,
    client: ClientView,
}

/// The identity a login resolved to: a User row, or the Account's own
/// tenant-admin login (reserved user id 0).
enum ResolvedLogin {
    User(User, Account),
    TenantAdmin(Account),
}

impl ResolvedLogin {
    fn account(&self) -> &Account {
        match self {
            ResolvedLogin::User(_, account) => account,
            ResolvedLogin::TenantAdmin(account) => account,
        }
    }

    fn token_identity(&self) -> TokenIdentity {
        match self {
            ResolvedLogin::User(user, account) => TokenIdentity {
                tenant_id: account.id,
                user_id: user.id,
                email: user.email.clone(),
                role: user.role,
                is_tenant_admin: false,
            },
            ResolvedLogin::TenantAdmin(account) => TokenIdentity {
                tenant_id: account.id,
                user_id: 0,
                email: account.email.clone(),
                role: UserRole::Admin,
                is_tenant_admin: true,
            },
        }
    }

    fn user_view(&self) -> UserView {
        let identity = self.token_identity();
        UserView {
            id: identity.user_id,
            email: identity.email,
            role: identity.role,
            is_tenant_admin: identity.is_tenant_admin,
        }
    }
}

/// Resolve an email+password to a login identity.
///
/// The caller's tenant is unknown at this point, so the User table is
/// searched by email alone first; when nothing matches, the email may be an
/// Account's own login. Both failure paths return the same
/// invalid-credentials error so responses cannot distinguish "wrong
/// password" from "no such email".
async fn resolve_login(db: &Database, email: &str, password: &str) -> Result<ResolvedLogin, ApiError> {
    if let Some(user) = db
        .users()
        .find_by_email(email)
        .await
        .db_err("Failed to search users")?
    {
        if !verify_password(password, &user.password_hash).is_match() {
            return Err(ApiError::invalid_credentials());
        }
        if !user.active {
            return Err(ApiError::account_disabled());
        }
        let account = db
            .accounts()
            .get_by_id(user.account_id)
            .await
            .db_err("Failed to load account")?
            .ok_or_else(|| {
                ApiError::internal_error("Account missing for user", user.account_id)
            })?;
        return Ok(ResolvedLogin::User(user, account));
    }

    let account = db
        .accounts()
        .get_by_email(email)
        .await
        .db_err("Failed to search accounts")?
        .ok_or_else(ApiError::invalid_credentials)?;
    if !verify_password(password, &account.password_hash).is_match() {
        return Err(ApiError::invalid_credentials());
    }
    Ok(ResolvedLogin::TenantAdmin(account))
}

fn map_gate_error(e: GateError) -> ApiError {
    match e {
        GateError::UnknownTenant => ApiError::not_found("Tenant not found"),
        other => ApiError::internal_error("Subscription check failed", other),
    }
}

async fn login(
    State(state): State<AuthState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let resolved = resolve_login(&state.db, body.email.trim(), &body.password).await?;
    let account = resolved.account();

    let subscription = state
        .subscriptions
        .status(account.id)
        .await
        .map_err(map_gate_error)?;
    if !subscription.status.allows_access() {
        return Err(ApiError::subscription(subscription.status));
    }

    let identity = resolved.token_identity();
    let access = state
        .jwt
        .generate_access_token(&identity)
        .map_err(|e| ApiError::internal_error("Failed to issue access token", e))?;
    let refresh = state
        .jwt
        .generate_refresh_token(&identity)
        .map_err(|e| ApiError::internal_error("Failed to issue refresh token", e))?;

    let record = SessionRecord::new(identity.tenant_id, identity.user_id, &identity.email);
    state
        .sessions
        .create_session(&access.token, &record)
        .await
        .store_err("Failed to create session record")?;
    state
        .sessions
        .create_refresh(&refresh.token, &record)
        .await
        .store_err("Failed to create refresh record")?;

    // Best-effort: a failed timestamp update never fails the login.
    let last_login = match &resolved {
        ResolvedLogin::User(user, _) => state.db.users().update_last_login(user.id).await,
        ResolvedLogin::TenantAdmin(account) => {
            state.db.accounts().update_last_login(account.id).await
        }
    };
    if let Err(e) = last_login {
        warn!(error = %e, "Failed to update last-login timestamp");
    }

    Ok(Json(LoginResponse {
        access_token: access.token,
        refresh_token: refresh.token,
        expires_in: access.duration,
        user: resolved.user_view(),
        client: ClientView::from_account(account),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

async fn refresh(
    State(state): State<AuthState>,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.refresh_token.is_empty() {
        return Err(ApiError::validation("refreshToken is required"));
    }

    // The type discriminator is enforced here: an access token presented as
    // a refresh token fails validation.
    let claims = state
        .jwt
        .validate_refresh_token(&body.refresh_token)
        .map_err(|_| ApiError::invalid_token("Invalid or expired refresh token"))?;

    state
        .sessions
        .get_refresh(&body.refresh_token)
        .await
        .store_err("Failed to check refresh record")?
        .ok_or_else(|| ApiError::session_expired("Refresh token has been revoked"))?;

    // Re-resolve the account and user to catch deactivation or deletion
    // since the token was issued.
    let account = state
        .db
        .accounts()
        .get_by_id(claims.tenant_id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

    let identity = if claims.user_id == 0 {
        TokenIdentity {
            tenant_id: account.id,
            user_id: 0,
            email: account.email.clone(),
            role: UserRole::Admin,
            is_tenant_admin: true,
        }
    } else {
        let user = state
            .db
            .users()
            .get_by_tenant_and_id(claims.tenant_id, claims.user_id)
            .await
            .db_err("Failed to load user")?
            .ok_or_else(|| ApiError::invalid_token("User no longer exists"))?;
        if !user.active {
            return Err(ApiError::account_disabled());
        }
        TokenIdentity {
            tenant_id: account.id,
            user_id: user.id,
            email: user.email,
            role: user.role,
            is_tenant_admin: false,
        }
    };

    let subscription = state
        .subscriptions
        .status(account.id)
        .await
        .map_err(map_gate_error)?;
    if !subscription.status.allows_access() {
        return Err(ApiError::subscription(subscription.status));
    }

    // Rotation. New tokens are issued and their records written before the
    // old refresh record is deleted, so a failure partway through never
    // leaves the caller with zero valid refresh tokens. Two concurrent
    // refreshes of the same token can both observe the record as present
    // and both succeed; the store is eventually consistent and offers no
    // check-then-act, so this race is accepted and the superseded pair
    // simply expires by TTL.
    let access = state
        .jwt
        .generate_access_token(&identity)
        .map_err(|e| ApiError::internal_error("Failed to issue access token", e))?;
    let new_refresh = state
        .jwt
        .generate_refresh_token(&identity)
        .map_err(|e| ApiError::internal_error("Failed to issue refresh token", e))?;

    let record = SessionRecord::new(identity.tenant_id, identity.user_id, &identity.email);
    state
        .sessions
        .create_session(&access.token, &record)
        .await
        .store_err("Failed to create session record")?;
    state
        .sessions
        .create_refresh(&new_refresh.token, &record)
        .await
        .store_err("Failed to create refresh record")?;

    state
        .sessions
        .delete_refresh(&body.refresh_token)
        .await
        .store_err("Failed to delete old refresh record")?;

    Ok(Json(RefreshResponse {
        access_token: access.token,
        refresh_token: new_refresh.token,
        expires_in: access.duration,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Logout revokes whatever it can and always reports success: a revocation
/// failure must not block a user from believing they are logged out.
async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    if let Some(token) = bearer_token(&headers) {
        if let Err(e) = state.sessions.delete_session(token).await {
            warn!(error = %e, "Failed to delete session record on logout");
        }
    }

    if let Ok(request) = serde_json::from_slice::<LogoutRequest>(&body) {
        if let Some(refresh_token) = request.refresh_token {
            if !refresh_token.is_empty() {
                if let Err(e) = state.sessions.delete_refresh(&refresh_token).await {
                    warn!(error = %e, "Failed to delete refresh record on logout");
                }
            }
        }
    }

    Json(serde_json::json!({ "success": true }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user: UserView,
    client: ClientView,
}

/// The identity context comes from the authorizer; the Account row is
/// re-read so the client view reflects subscription changes made since the
/// token was issued.
async fn me(
    State(state): State<AuthState>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .accounts()
        .get_by_id(identity.tenant_id())
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

    Ok(Json(MeResponse {
        user: UserView {
            id: identity.user_id(),
            email: identity.email().to_string(),
            role: identity.role(),
            is_tenant_admin: identity.is_tenant_admin(),
        },
        client: ClientView::from_account(&account),
    }))
}
