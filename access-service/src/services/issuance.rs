//! Magic-link issuance and revocation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{AccessAction, ClientInfo};
use crate::services::record_event;
use crate::store::{AccessLog, GrantStore};
use crate::token::generate_secret;

#[derive(Clone)]
pub struct TokenIssuanceService {
    store: Arc<dyn GrantStore>,
    log: Arc<dyn AccessLog>,
    base_url: String,
    redemption_path: String,
    magic_link_expiry_hours: i64,
}

impl TokenIssuanceService {
    pub fn new(
        store: Arc<dyn GrantStore>,
        log: Arc<dyn AccessLog>,
        base_url: String,
        redemption_path: String,
        magic_link_expiry_hours: i64,
    ) -> Self {
        Self {
            store,
            log,
            base_url,
            redemption_path,
            magic_link_expiry_hours,
        }
    }

    /// Create (or replace) the magic-link credential for a grant and return
    /// the raw secret for delivery. The store only ever sees the hash.
    ///
    /// Issuance requires existence, not active status: revoking an inactive
    /// grant's old link is still desirable, and redemption enforces status.
    /// Installing the new hash also clears any existing session, so a fresh
    /// invitation supersedes an old session.
    pub async fn issue(
        &self,
        grant_id: Uuid,
        client: Option<&ClientInfo>,
    ) -> Result<String, AccessError> {
        let secret = generate_secret();
        let expires_at = Utc::now() + Duration::hours(self.magic_link_expiry_hours);

        let matched = self
            .store
            .set_magic_link(grant_id, &secret.hash, expires_at)
            .await?;
        if !matched {
            return Err(AccessError::NotFound);
        }

        record_event(
            &self.log,
            Some(grant_id),
            AccessAction::TokenGenerated,
            client,
            None,
        )
        .await;
        tracing::info!(grant_id = %grant_id, "Magic link issued");

        Ok(secret.raw)
    }

    /// Revoke an outstanding invitation without touching any established
    /// session. Used when an owner withdraws access explicitly.
    pub async fn revoke(
        &self,
        grant_id: Uuid,
        client: Option<&ClientInfo>,
    ) -> Result<(), AccessError> {
        let matched = self.store.clear_magic_link(grant_id).await?;
        if !matched {
            return Err(AccessError::NotFound);
        }

        record_event(
            &self.log,
            Some(grant_id),
            AccessAction::TokenRevoked,
            client,
            None,
        )
        .await;
        tracing::info!(grant_id = %grant_id, "Magic link revoked");

        Ok(())
    }

    /// Canonical redemption URL for a raw secret. The caller hands this to
    /// the delivery collaborator; the service never logs it.
    pub fn redemption_url(&self, raw_secret: &str) -> String {
        format!(
            "{}{}?token={}",
            self.base_url.trim_end_matches('/'),
            self.redemption_path,
            raw_secret
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAccessStore;

    fn service(store: Arc<MemoryAccessStore>) -> TokenIssuanceService {
        TokenIssuanceService::new(
            store.clone(),
            store,
            "https://app.example.com/".to_string(),
            "/access".to_string(),
            24,
        )
    }

    #[test]
    fn redemption_url_joins_base_and_path() {
        let svc = service(Arc::new(MemoryAccessStore::new()));
        assert_eq!(
            svc.redemption_url("abc123"),
            "https://app.example.com/access?token=abc123"
        );
    }

    #[tokio::test]
    async fn issue_unknown_grant_is_not_found() {
        let svc = service(Arc::new(MemoryAccessStore::new()));
        let err = svc.issue(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound));
    }
}
