//! Authorization errors (returns JSON with a machine-readable code).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Why the authorizer denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token on a tenant-scoped route.
    TokenMissing,
    /// Signature, expiry, or type-discriminator check failed.
    TokenInvalid,
    /// Token verifies but its session record is gone (revoked or TTL'd out).
    SessionExpired,
    /// Wrong or missing X-Admin-Key on an admin route.
    AdminKeyInvalid,
    /// Tenant subscription has expired.
    SubscriptionExpired,
    /// Tenant subscription is suspended.
    SubscriptionSuspended,
    /// No Account row for the tenant in the token.
    TenantNotFound,
    /// Store or database failure.
    Internal,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenMissing
            | Self::TokenInvalid
            | Self::SessionExpired
            | Self::AdminKeyInvalid => StatusCode::UNAUTHORIZED,
            Self::SubscriptionExpired | Self::SubscriptionSuspended => StatusCode::FORBIDDEN,
            Self::TenantNotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::AdminKeyInvalid => "ADMIN_KEY_INVALID",
            Self::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            Self::SubscriptionSuspended => "SUBSCRIPTION_SUSPENDED",
            Self::TenantNotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::TokenMissing => "Missing bearer token",
            Self::TokenInvalid => "Invalid or expired token",
            Self::SessionExpired => "Session expired",
            Self::AdminKeyInvalid => "Invalid admin key",
            Self::SubscriptionExpired => "Subscription has expired",
            Self::SubscriptionSuspended => "Subscription is suspended",
            Self::TenantNotFound => "Tenant not found",
            Self::Internal => "Internal server error",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            code: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}
