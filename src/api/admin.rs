//! Admin subscription endpoints.
//!
//! Guarded upstream by the authorizer's admin-key check; these handlers
//! never see an unauthenticated request.
//!
//! - GET `/subscriptions/{tenantId}` - Current subscription view
//! - PUT `/subscriptions/{tenantId}` - Overwrite status/plan/expiry
//! - DELETE `/subscriptions/{tenantId}` - Drop the cached record

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use super::extract::ValidatedJson;
use crate::db::{Database, SubscriptionStatus};
use crate::subscription::{GateError, SubscriptionGate, SubscriptionRecord};

#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub subscriptions: SubscriptionGate,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/subscriptions/{tenant_id}",
            get(get_subscription)
                .put(update_subscription)
                .delete(invalidate_subscription),
        )
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionView {
    tenant_id: i64,
    tenant_name: String,
    status: SubscriptionStatus,
    plan: String,
    expires_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    updated_by: String,
    notes: Option<String>,
}

impl SubscriptionView {
    fn new(tenant_id: i64, tenant_name: String, record: SubscriptionRecord) -> Self {
        Self {
            tenant_id,
            tenant_name,
            status: record.status,
            plan: record.plan,
            expires_at: record.expires_at,
            updated_at: record.updated_at,
            updated_by: record.updated_by,
            notes: record.notes,
        }
    }
}

fn map_gate_error(e: GateError) -> ApiError {
    match e {
        GateError::UnknownTenant => ApiError::not_found("Tenant not found"),
        other => ApiError::internal_error("Subscription gate failed", other),
    }
}

async fn get_subscription(
    State(state): State<AdminState>,
    Path(tenant_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .accounts()
        .get_by_id(tenant_id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

    let record = state
        .subscriptions
        .status(tenant_id)
        .await
        .map_err(map_gate_error)?;

    Ok(Json(SubscriptionView::new(tenant_id, account.name, record)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSubscriptionRequest {
    status: String,
    plan: String,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn update_subscription(
    State(state): State<AdminState>,
    Path(tenant_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = SubscriptionStatus::parse(&body.status).ok_or_else(|| {
        ApiError::validation("status must be one of trial, active, suspended, expired")
    })?;
    if body.plan.trim().is_empty() {
        return Err(ApiError::validation("plan is required"));
    }
    let expires_at = match body.expires_at.as_deref() {
        Some(s) => Some(
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| ApiError::validation("expiresAt must be an ISO-8601 timestamp"))?,
        ),
        None => None,
    };

    let account = state
        .db
        .accounts()
        .get_by_id(tenant_id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

    let record = state
        .subscriptions
        .overwrite(tenant_id, status, body.plan.trim(), expires_at, body.notes)
        .await
        .map_err(map_gate_error)?;

    Ok(Json(SubscriptionView::new(tenant_id, account.name, record)))
}

async fn invalidate_subscription(
    State(state): State<AdminState>,
    Path(tenant_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let exists = state
        .db
        .accounts()
        .get_by_id(tenant_id)
        .await
        .db_err("Failed to load account")?
        .is_some();
    if !exists {
        return Err(ApiError::not_found("Tenant not found"));
    }

    state
        .subscriptions
        .invalidate(tenant_id)
        .await
        .store_err("Failed to invalidate subscription record")?;

    Ok(Json(serde_json::json!({ "success": true })))
}
