mod admin;
mod auth;
mod error;
mod extract;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionStore;
use crate::subscription::SubscriptionGate;

pub use auth::AuthState;
pub use error::{ApiError, ResultExt};
pub use extract::ValidatedJson;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    sessions: SessionStore,
    subscriptions: SubscriptionGate,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt,
        sessions,
        subscriptions: subscriptions.clone(),
    };

    let admin_state = admin::AdminState { db, subscriptions };

    let rate_limits = Arc::new(RateLimitConfig::new());

    Router::new()
        .nest("/auth", auth::router(auth_state, rate_limits))
        .nest("/admin", admin::router(admin_state))
}
