//! Persistence seams for grants and the access log.
//!
//! Every credential validation goes through these traits to the shared store;
//! no in-process cache of credential state is kept, since hashes can be
//! invalidated between requests by a concurrent rotate, revoke, or re-issue.

pub mod db;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{AccessAction, ClientInfo, Grant};

pub use memory::MemoryAccessStore;
pub use postgres::PgAccessStore;

/// Persistent record per grant. All mutations are single-row conditional
/// updates; the returned bool reports whether a row matched, so callers can
/// distinguish a lost race or missing grant from a store failure.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn find_grant(&self, grant_id: Uuid) -> Result<Option<Grant>, AccessError>;

    async fn find_by_magic_link_hash(&self, hash: &str) -> Result<Option<Grant>, AccessError>;

    async fn find_by_session_hash(&self, hash: &str) -> Result<Option<Grant>, AccessError>;

    /// Install a new magic-link credential: sets hash and expiry, resets the
    /// verified flag, and clears any existing session (a fresh invitation
    /// supersedes an old session). Last writer wins on the hash column.
    async fn set_magic_link(
        &self,
        grant_id: Uuid,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AccessError>;

    /// Clear the magic-link hash, expiry, and verified flag. Leaves any
    /// established session untouched.
    async fn clear_magic_link(&self, grant_id: Uuid) -> Result<bool, AccessError>;

    /// Atomically exchange a live magic link for a session: sets the session
    /// hash, nulls the magic-link hash and expiry, and touches
    /// `last_access_at`. Guarded by `status = active AND magic_link_hash IS
    /// NOT NULL`, which makes concurrent double redemption lose cleanly.
    async fn establish_session(
        &self,
        grant_id: Uuid,
        session_hash: &str,
    ) -> Result<bool, AccessError>;

    /// Overwrite the session hash and touch `last_access_at`.
    async fn rotate_session(&self, grant_id: Uuid, session_hash: &str)
        -> Result<bool, AccessError>;

    async fn clear_session(&self, grant_id: Uuid) -> Result<bool, AccessError>;

    /// Set `magic_link_verified` and touch `last_access_at` after a
    /// successful identity challenge.
    async fn mark_verified(&self, grant_id: Uuid) -> Result<bool, AccessError>;

    async fn touch_last_access(&self, grant_id: Uuid) -> Result<bool, AccessError>;
}

/// Append-only audit sink. Entries are never updated or deleted.
#[async_trait]
pub trait AccessLog: Send + Sync {
    async fn append(
        &self,
        grant_id: Option<Uuid>,
        action: AccessAction,
        client: Option<&ClientInfo>,
        failure_reason: Option<&str>,
    ) -> Result<(), AccessError>;

    /// Count `identity_verification_failed` entries strictly after the most
    /// recent `token_generated` entry for the grant. The throttling window
    /// resets whenever a fresh invitation is issued.
    async fn count_failures_since_last_issue(&self, grant_id: Uuid) -> Result<i64, AccessError>;
}
