//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::db::SubscriptionStatus;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
    fn store_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal_error(msg, e))
    }
    fn store_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal_error(msg, e))
    }
}

/// API error with an HTTP status and a machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// 400: missing or malformed input.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: msg.into(),
        }
    }

    /// 401: bad credentials. One shape for wrong password and unknown email,
    /// so responses cannot be used to enumerate accounts.
    pub fn invalid_credentials() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "INVALID_CREDENTIALS",
            message: "Invalid email or password".to_string(),
        }
    }

    /// 401: invalid, expired, or wrong-type token.
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "TOKEN_INVALID",
            message: msg.into(),
        }
    }

    /// 401: token verifies but its record has been revoked or expired.
    pub fn session_expired(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "SESSION_EXPIRED",
            message: msg.into(),
        }
    }

    /// 403: deactivated user.
    pub fn account_disabled() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "ACCOUNT_DISABLED",
            message: "Account is disabled".to_string(),
        }
    }

    /// 403: tenant subscription does not allow access.
    pub fn subscription(status: SubscriptionStatus) -> Self {
        let (code, message) = match status {
            SubscriptionStatus::Suspended => {
                ("SUBSCRIPTION_SUSPENDED", "Subscription is suspended")
            }
            _ => ("SUBSCRIPTION_EXPIRED", "Subscription has expired"),
        };
        Self {
            status: StatusCode::FORBIDDEN,
            code,
            message: message.to_string(),
        }
    }

    /// 404: unknown tenant or resource.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: msg.into(),
        }
    }

    /// 500: unexpected failure. The message sent to the client is generic;
    /// the underlying error goes to the log only.
    pub fn internal_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL",
            message: "Internal server error".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code,
            }),
        )
            .into_response()
    }
}
