//! Per-tenant subscription state, cached in the key-value store.
//!
//! The Account row is authoritative; the cached record is a read-through /
//! write-through projection with its own TTL. Reads lazily demote a record
//! whose expiry has passed to `expired` and persist the demotion before
//! using it. The read path never improves a status; only the admin write
//! path may (e.g. `expired` back to `active`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::db::{Account, AccountStore, SubscriptionStatus};
use crate::kv::{KeyValueStore, KvError};

/// Cached subscription records live for 30 days before rehydration.
pub const SUBSCRIPTION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Storage key for a tenant's cached subscription record.
pub fn subscription_key(tenant_id: i64) -> String {
    format!("tenant:{}:subscription", tenant_id)
}

/// The cached projection of a tenant's subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub status: SubscriptionStatus,
    pub plan: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Which path last wrote this record: `read`, or `admin`.
    pub updated_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SubscriptionRecord {
    fn from_account(account: &Account) -> Self {
        Self {
            status: account.subscription_status,
            plan: account.plan.clone(),
            expires_at: account.subscription_expires_at,
            updated_at: Utc::now(),
            updated_by: "read".to_string(),
            notes: None,
        }
    }
}

/// Errors from the subscription gate.
#[derive(Debug)]
pub enum GateError {
    /// No Account row exists for the tenant.
    UnknownTenant,
    Store(KvError),
    Db(sqlx::Error),
    Codec(serde_json::Error),
}

impl std::fmt::Display for GateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateError::UnknownTenant => write!(f, "unknown tenant"),
            GateError::Store(e) => write!(f, "subscription store error: {}", e),
            GateError::Db(e) => write!(f, "subscription database error: {}", e),
            GateError::Codec(e) => write!(f, "subscription record codec error: {}", e),
        }
    }
}

impl std::error::Error for GateError {}

/// Read and write path for tenant subscription state.
#[derive(Clone)]
pub struct SubscriptionGate {
    kv: Arc<dyn KeyValueStore>,
    accounts: AccountStore,
}

impl SubscriptionGate {
    pub fn new(kv: Arc<dyn KeyValueStore>, accounts: AccountStore) -> Self {
        Self { kv, accounts }
    }

    async fn put_record(&self, tenant_id: i64, record: &SubscriptionRecord) -> Result<(), GateError> {
        let json = serde_json::to_string(record).map_err(GateError::Codec)?;
        self.kv
            .put(&subscription_key(tenant_id), &json, SUBSCRIPTION_TTL_SECS)
            .await
            .map_err(GateError::Store)
    }

    /// Current subscription state for a tenant.
    ///
    /// Read path: cached record, rehydrated from the Account row on a miss,
    /// lazily demoted to `expired` once `expires_at` is in the past. The
    /// demotion is persisted before the record is returned; the status is
    /// never silently treated as active past its expiry.
    pub async fn status(&self, tenant_id: i64) -> Result<SubscriptionRecord, GateError> {
        let key = subscription_key(tenant_id);

        let cached = match self.kv.get(&key).await.map_err(GateError::Store)? {
            Some(json) => match serde_json::from_str::<SubscriptionRecord>(&json) {
                Ok(record) => Some(record),
                Err(e) => {
                    // Unreadable cache entry: fall through to rehydration.
                    warn!(tenant_id, error = %e, "Discarding unreadable subscription record");
                    None
                }
            },
            None => None,
        };

        let mut record = match cached {
            Some(record) => record,
            None => {
                let account = self
                    .accounts
                    .get_by_id(tenant_id)
                    .await
                    .map_err(GateError::Db)?
                    .ok_or(GateError::UnknownTenant)?;
                let record = SubscriptionRecord::from_account(&account);
                self.put_record(tenant_id, &record).await?;
                record
            }
        };

        if record.status != SubscriptionStatus::Expired {
            if let Some(expires_at) = record.expires_at {
                if expires_at <= Utc::now() {
                    record.status = SubscriptionStatus::Expired;
                    record.updated_at = Utc::now();
                    record.updated_by = "read".to_string();
                    self.put_record(tenant_id, &record).await?;
                }
            }
        }

        Ok(record)
    }

    /// Overwrite a tenant's subscription. Admin path only; this is the one
    /// place a status may improve. Writes through to the Account row and the
    /// cached record.
    pub async fn overwrite(
        &self,
        tenant_id: i64,
        status: SubscriptionStatus,
        plan: &str,
        expires_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<SubscriptionRecord, GateError> {
        let updated = self
            .accounts
            .update_subscription(tenant_id, status, plan, expires_at.as_ref())
            .await
            .map_err(GateError::Db)?;
        if !updated {
            return Err(GateError::UnknownTenant);
        }

        let record = SubscriptionRecord {
            status,
            plan: plan.to_string(),
            expires_at,
            updated_at: Utc::now(),
            updated_by: "admin".to_string(),
            notes,
        };
        self.put_record(tenant_id, &record).await?;
        Ok(record)
    }

    /// Drop the cached record so the next read rehydrates from the Account
    /// row. Never touches the authoritative row.
    pub async fn invalidate(&self, tenant_id: i64) -> Result<(), GateError> {
        self.kv
            .delete(&subscription_key(tenant_id))
            .await
            .map_err(GateError::Store)
    }
}
