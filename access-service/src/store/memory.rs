//! In-memory store for tests and local development.
//!
//! All state lives behind one async mutex, so every mutation is as atomic as
//! the conditional UPDATEs of the PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{AccessAction, AccessLogEntry, ClientInfo, Grant, GrantStatus};
use crate::store::{AccessLog, GrantStore};

#[derive(Default)]
struct MemoryState {
    grants: Vec<Grant>,
    logs: Vec<AccessLogEntry>,
}

#[derive(Default)]
pub struct MemoryAccessStore {
    inner: Mutex<MemoryState>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_grant(&self, grant: Grant) {
        self.inner.lock().await.grants.push(grant);
    }

    /// Snapshot of a grant row, for assertions.
    pub async fn grant_snapshot(&self, grant_id: Uuid) -> Option<Grant> {
        self.inner
            .lock()
            .await
            .grants
            .iter()
            .find(|g| g.grant_id == grant_id)
            .cloned()
    }

    /// Snapshot of all log entries, oldest first.
    pub async fn log_entries(&self) -> Vec<AccessLogEntry> {
        self.inner.lock().await.logs.clone()
    }

    pub async fn set_status(&self, grant_id: Uuid, status: GrantStatus) {
        let mut state = self.inner.lock().await;
        if let Some(grant) = state.grants.iter_mut().find(|g| g.grant_id == grant_id) {
            grant.status_code = status.as_str().to_string();
        }
    }

    /// Force the stored magic link past its expiry, for expiry tests.
    pub async fn expire_magic_link(&self, grant_id: Uuid) {
        let mut state = self.inner.lock().await;
        if let Some(grant) = state.grants.iter_mut().find(|g| g.grant_id == grant_id) {
            grant.magic_link_expires_at = Some(Utc::now() - Duration::hours(1));
        }
    }

    /// Shift `last_access_at` into the past, for rotation-policy tests.
    pub async fn backdate_last_access(&self, grant_id: Uuid, hours: i64) {
        let mut state = self.inner.lock().await;
        if let Some(grant) = state.grants.iter_mut().find(|g| g.grant_id == grant_id) {
            grant.last_access_at = Some(Utc::now() - Duration::hours(hours));
        }
    }

    /// Shift a log entry's timestamp, for throttling-window tests.
    pub async fn backdate_log_entry(&self, log_id: Uuid, hours: i64) {
        let mut state = self.inner.lock().await;
        if let Some(entry) = state.logs.iter_mut().find(|e| e.log_id == log_id) {
            entry.created_utc = Utc::now() - Duration::hours(hours);
        }
    }

    async fn update_grant<F>(&self, grant_id: Uuid, mutate: F) -> bool
    where
        F: FnOnce(&mut Grant),
    {
        let mut state = self.inner.lock().await;
        match state.grants.iter_mut().find(|g| g.grant_id == grant_id) {
            Some(grant) => {
                mutate(grant);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl GrantStore for MemoryAccessStore {
    async fn find_grant(&self, grant_id: Uuid) -> Result<Option<Grant>, AccessError> {
        Ok(self.grant_snapshot(grant_id).await)
    }

    async fn find_by_magic_link_hash(&self, hash: &str) -> Result<Option<Grant>, AccessError> {
        let state = self.inner.lock().await;
        Ok(state
            .grants
            .iter()
            .find(|g| g.magic_link_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn find_by_session_hash(&self, hash: &str) -> Result<Option<Grant>, AccessError> {
        let state = self.inner.lock().await;
        Ok(state
            .grants
            .iter()
            .find(|g| g.session_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn set_magic_link(
        &self,
        grant_id: Uuid,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AccessError> {
        Ok(self
            .update_grant(grant_id, |grant| {
                grant.magic_link_hash = Some(hash.to_string());
                grant.magic_link_expires_at = Some(expires_at);
                grant.magic_link_verified = false;
                grant.session_hash = None;
            })
            .await)
    }

    async fn clear_magic_link(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        Ok(self
            .update_grant(grant_id, |grant| {
                grant.magic_link_hash = None;
                grant.magic_link_expires_at = None;
                grant.magic_link_verified = false;
            })
            .await)
    }

    async fn establish_session(
        &self,
        grant_id: Uuid,
        session_hash: &str,
    ) -> Result<bool, AccessError> {
        let mut state = self.inner.lock().await;
        match state.grants.iter_mut().find(|g| {
            g.grant_id == grant_id
                && g.status_code == GrantStatus::Active.as_str()
                && g.magic_link_hash.is_some()
        }) {
            Some(grant) => {
                grant.session_hash = Some(session_hash.to_string());
                grant.magic_link_hash = None;
                grant.magic_link_expires_at = None;
                grant.last_access_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_session(
        &self,
        grant_id: Uuid,
        session_hash: &str,
    ) -> Result<bool, AccessError> {
        Ok(self
            .update_grant(grant_id, |grant| {
                grant.session_hash = Some(session_hash.to_string());
                grant.last_access_at = Some(Utc::now());
            })
            .await)
    }

    async fn clear_session(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        Ok(self
            .update_grant(grant_id, |grant| {
                grant.session_hash = None;
            })
            .await)
    }

    async fn mark_verified(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        Ok(self
            .update_grant(grant_id, |grant| {
                grant.magic_link_verified = true;
                grant.last_access_at = Some(Utc::now());
            })
            .await)
    }

    async fn touch_last_access(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        Ok(self
            .update_grant(grant_id, |grant| {
                grant.last_access_at = Some(Utc::now());
            })
            .await)
    }
}

#[async_trait]
impl AccessLog for MemoryAccessStore {
    async fn append(
        &self,
        grant_id: Option<Uuid>,
        action: AccessAction,
        client: Option<&ClientInfo>,
        failure_reason: Option<&str>,
    ) -> Result<(), AccessError> {
        let entry = AccessLogEntry::new(grant_id, action, client, failure_reason);
        self.inner.lock().await.logs.push(entry);
        Ok(())
    }

    async fn count_failures_since_last_issue(&self, grant_id: Uuid) -> Result<i64, AccessError> {
        let state = self.inner.lock().await;
        let last_issue = state
            .logs
            .iter()
            .filter(|e| {
                e.grant_id == Some(grant_id) && e.action == AccessAction::TokenGenerated.as_str()
            })
            .map(|e| e.created_utc)
            .max();

        let count = state
            .logs
            .iter()
            .filter(|e| {
                e.grant_id == Some(grant_id)
                    && e.action == AccessAction::IdentityVerificationFailed.as_str()
                    && last_issue.is_none_or(|issued| e.created_utc > issued)
            })
            .count();
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn establish_session_requires_live_magic_link() {
        let store = MemoryAccessStore::new();
        let grant = Grant::new(Uuid::new_v4(), None, "Test Subject".to_string(), None);
        let grant_id = grant.grant_id;
        store.insert_grant(grant).await;

        // No magic link installed yet.
        assert!(!store.establish_session(grant_id, "hash").await.unwrap());

        store
            .set_magic_link(grant_id, "linkhash", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(store.establish_session(grant_id, "hash").await.unwrap());

        // The link was consumed; a second establish loses the race.
        assert!(!store.establish_session(grant_id, "hash2").await.unwrap());
    }

    #[tokio::test]
    async fn failure_count_window_resets_on_issue() {
        let store = MemoryAccessStore::new();
        let grant_id = Uuid::new_v4();

        store
            .append(
                Some(grant_id),
                AccessAction::IdentityVerificationFailed,
                None,
                Some("name mismatch"),
            )
            .await
            .unwrap();
        assert_eq!(store.count_failures_since_last_issue(grant_id).await.unwrap(), 1);

        store
            .append(Some(grant_id), AccessAction::TokenGenerated, None, None)
            .await
            .unwrap();
        assert_eq!(store.count_failures_since_last_issue(grant_id).await.unwrap(), 0);
    }
}
