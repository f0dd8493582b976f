//! The request-time authorization gate.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::context::Identity;
use super::errors::AuthError;
use super::routes::{RouteClass, RouteConfig};
use crate::db::SubscriptionStatus;
use crate::jwt::JwtConfig;
use crate::session::SessionStore;
use crate::subscription::{GateError, SubscriptionGate};

/// Header carrying the shared admin secret on admin-keyed routes.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Extract the bearer token from an Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Composes token verification, session lookup, and the subscription gate.
///
/// Route classification runs before any token work, so public and
/// admin-keyed routes incur no cryptographic cost.
pub struct Authorizer {
    jwt: Arc<JwtConfig>,
    sessions: SessionStore,
    subscriptions: SubscriptionGate,
    routes: RouteConfig,
    admin_key: Vec<u8>,
}

impl Authorizer {
    pub fn new(
        jwt: Arc<JwtConfig>,
        sessions: SessionStore,
        subscriptions: SubscriptionGate,
        routes: RouteConfig,
        admin_key: Vec<u8>,
    ) -> Self {
        Self {
            jwt,
            sessions,
            subscriptions,
            routes,
            admin_key,
        }
    }

    fn check_admin_key(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let presented = headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::AdminKeyInvalid)?
            .as_bytes();
        // memcmp::eq requires equal lengths; the length check itself leaks
        // nothing useful about the key's content.
        if presented.len() != self.admin_key.len()
            || !openssl::memcmp::eq(presented, &self.admin_key)
        {
            return Err(AuthError::AdminKeyInvalid);
        }
        Ok(())
    }

    /// Run the gate pipeline for one request.
    ///
    /// `Ok(None)` means the route needs no identity (public or admin-keyed);
    /// `Ok(Some(identity))` is a fully checked tenant identity.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        path: &str,
    ) -> Result<Option<Identity>, AuthError> {
        match self.routes.classify(path) {
            RouteClass::Public => Ok(None),
            RouteClass::Admin => {
                self.check_admin_key(headers)?;
                Ok(None)
            }
            RouteClass::Tenant => self.authorize_tenant(headers).await.map(Some),
        }
    }

    async fn authorize_tenant(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::TokenMissing)?;

        let claims = self
            .jwt
            .validate_access_token(token)
            .map_err(|_| AuthError::TokenInvalid)?;

        // Cryptographic validity is not enough: the session record must
        // still exist. Its absence means the token was revoked (or the
        // record TTL'd out), and is reported distinctly.
        let session = self
            .sessions
            .get_session(token)
            .await
            .map_err(|e| {
                error!(error = %e, "Session lookup failed");
                AuthError::Internal
            })?
            .ok_or(AuthError::SessionExpired)?;

        let subscription = self
            .subscriptions
            .status(session.tenant_id)
            .await
            .map_err(|e| match e {
                GateError::UnknownTenant => AuthError::TenantNotFound,
                other => {
                    error!(error = %other, "Subscription check failed");
                    AuthError::Internal
                }
            })?;

        match subscription.status {
            SubscriptionStatus::Suspended => return Err(AuthError::SubscriptionSuspended),
            SubscriptionStatus::Expired => return Err(AuthError::SubscriptionExpired),
            SubscriptionStatus::Trial | SubscriptionStatus::Active => {}
        }

        Ok(Identity::new(
            claims.tenant_id,
            claims.user_id,
            claims.email,
            claims.role,
            claims.is_tenant_admin,
            subscription.plan,
        ))
    }
}

/// Authorizer middleware. On success the resolved identity (if any) is
/// attached to the request for handlers to extract.
pub async fn authorize_request(
    State(authorizer): State<Arc<Authorizer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match authorizer.authorize(request.headers(), &path).await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
