//! Session and refresh-token records in the revocable key-value store.
//!
//! Records are keyed by a fixed-length suffix of the token string under a
//! namespace prefix. Deleting the record is the only way to revoke a token
//! before its cryptographic expiry: a request whose token still verifies but
//! whose record is gone is rejected as "session expired", which is distinct
//! from "token invalid".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::kv::{KeyValueStore, KvError};

/// Session records live as long as an access token: 24 hours.
pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Refresh records live as long as a refresh token: 7 days.
pub const REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Number of trailing token characters used as the record key.
const KEY_SUFFIX_LEN: usize = 32;

const SESSION_PREFIX: &str = "session:";
const REFRESH_PREFIX: &str = "refresh:";

/// Take the trailing key fragment of a token. Tokens are ASCII (base64url
/// JWT segments), so byte indexing is safe; shorter inputs are used whole.
fn token_suffix(token: &str) -> &str {
    token.get(token.len().saturating_sub(KEY_SUFFIX_LEN)..).unwrap_or(token)
}

/// Storage key for an access token's session record.
pub fn session_key(access_token: &str) -> String {
    format!("{}{}", SESSION_PREFIX, token_suffix(access_token))
}

/// Storage key for a refresh token's record.
pub fn refresh_key(refresh_token: &str) -> String {
    format!("{}{}", REFRESH_PREFIX, token_suffix(refresh_token))
}

/// A revocation-control record for an issued token.
///
/// Its presence means "issued and not revoked". It says nothing about the
/// token's cryptographic validity; expiry is enforced separately by the
/// token verifier and both checks are always required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub tenant_id: i64,
    pub user_id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(tenant_id: i64, user_id: i64, email: &str) -> Self {
        Self {
            tenant_id,
            user_id,
            email: email.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Errors from session record storage.
#[derive(Debug)]
pub enum SessionError {
    Store(KvError),
    Codec(serde_json::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Store(e) => write!(f, "session store error: {}", e),
            SessionError::Codec(e) => write!(f, "session record codec error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// Typed access to session and refresh records.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn put(&self, key: &str, record: &SessionRecord, ttl: u64) -> Result<(), SessionError> {
        let json = serde_json::to_string(record).map_err(SessionError::Codec)?;
        self.kv.put(key, &json, ttl).await.map_err(SessionError::Store)
    }

    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        match self.kv.get(key).await.map_err(SessionError::Store)? {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).map_err(SessionError::Codec)?,
            )),
            None => Ok(None),
        }
    }

    /// Create the session record for a freshly issued access token.
    pub async fn create_session(
        &self,
        access_token: &str,
        record: &SessionRecord,
    ) -> Result<(), SessionError> {
        self.put(&session_key(access_token), record, SESSION_TTL_SECS)
            .await
    }

    /// Look up the session record for an access token.
    pub async fn get_session(
        &self,
        access_token: &str,
    ) -> Result<Option<SessionRecord>, SessionError> {
        self.get(&session_key(access_token)).await
    }

    /// Revoke the session record for an access token.
    pub async fn delete_session(&self, access_token: &str) -> Result<(), SessionError> {
        self.kv
            .delete(&session_key(access_token))
            .await
            .map_err(SessionError::Store)
    }

    /// Create the record for a freshly issued refresh token.
    pub async fn create_refresh(
        &self,
        refresh_token: &str,
        record: &SessionRecord,
    ) -> Result<(), SessionError> {
        self.put(&refresh_key(refresh_token), record, REFRESH_TTL_SECS)
            .await
    }

    /// Look up the record for a refresh token.
    pub async fn get_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<Option<SessionRecord>, SessionError> {
        self.get(&refresh_key(refresh_token)).await
    }

    /// Revoke the record for a refresh token (logout or rotation).
    pub async fn delete_refresh(&self, refresh_token: &str) -> Result<(), SessionError> {
        self.kv
            .delete(&refresh_key(refresh_token))
            .await
            .map_err(SessionError::Store)
    }
}
