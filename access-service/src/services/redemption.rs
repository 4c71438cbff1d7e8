//! Magic-link redemption.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AccessError;
use crate::models::{AccessAction, ClientInfo, GrantView};
use crate::services::record_event;
use crate::store::{AccessLog, GrantStore};
use crate::token::hash_secret;

#[derive(Clone)]
pub struct TokenRedemptionService {
    store: Arc<dyn GrantStore>,
    log: Arc<dyn AccessLog>,
}

impl TokenRedemptionService {
    pub fn new(store: Arc<dyn GrantStore>, log: Arc<dyn AccessLog>) -> Self {
        Self { store, log }
    }

    /// Validate a presented raw magic-link secret and return the grant view.
    ///
    /// Redemption does not establish a session; the caller runs the identity
    /// challenge first and then calls the session service explicitly.
    ///
    /// Every failure surfaces as `InvalidOrExpired`. The specific
    /// sub-condition (unknown hash, expired link, inactive grant) goes only
    /// into the access log, and the entry carries no grant id when the hash
    /// matched nothing at all.
    pub async fn redeem(
        &self,
        raw_secret: &str,
        client: Option<&ClientInfo>,
    ) -> Result<GrantView, AccessError> {
        let hash = hash_secret(raw_secret);

        let grant = match self.store.find_by_magic_link_hash(&hash).await? {
            Some(grant) => grant,
            None => {
                record_event(
                    &self.log,
                    None,
                    AccessAction::TokenValidationFailed,
                    client,
                    Some("token not found"),
                )
                .await;
                tracing::warn!("Magic link validation failed: token not found");
                return Err(AccessError::InvalidOrExpired);
            }
        };

        if !grant.is_active() {
            let reason = format!("grant status: {}", grant.status_code);
            record_event(
                &self.log,
                Some(grant.grant_id),
                AccessAction::TokenValidationFailed,
                client,
                Some(&reason),
            )
            .await;
            tracing::warn!(grant_id = %grant.grant_id, reason = %reason, "Magic link validation failed");
            return Err(AccessError::InvalidOrExpired);
        }

        if !grant.magic_link_live(Utc::now()) {
            record_event(
                &self.log,
                Some(grant.grant_id),
                AccessAction::TokenValidationFailed,
                client,
                Some("token expired"),
            )
            .await;
            tracing::warn!(grant_id = %grant.grant_id, "Magic link validation failed: token expired");
            return Err(AccessError::InvalidOrExpired);
        }

        record_event(
            &self.log,
            Some(grant.grant_id),
            AccessAction::TokenValidated,
            client,
            None,
        )
        .await;
        tracing::info!(grant_id = %grant.grant_id, "Magic link validated");

        Ok(GrantView::from(grant))
    }
}
