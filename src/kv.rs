//! Key-value store interface for session, refresh, and subscription records.
//!
//! The production deployment backs this with a replicated, eventually
//! consistent store: a write at one edge location is not guaranteed to be
//! immediately visible to reads elsewhere, and there is no atomic
//! check-then-act. Callers must treat `get` followed by `put`/`delete` as
//! independent operations that can interleave with other writers; revocation
//! and rotation are therefore best-effort within the replication window.
//! Records carry a TTL and disappear on their own once it elapses.

use async_trait::async_trait;

/// Error from a key-value store operation.
#[derive(Debug)]
pub struct KvError(pub String);

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kv store error: {}", self.0)
    }
}

impl std::error::Error for KvError {}

/// Revocable record storage with per-entry time-to-live.
///
/// Weak consistency contract: implementations may serve stale reads and do
/// not provide transactions across keys. `delete` of an absent key is not an
/// error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl_secs`.
    /// Overwrites any existing entry.
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError>;

    /// Fetch the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Remove the entry for `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}
