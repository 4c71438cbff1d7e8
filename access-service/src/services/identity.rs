//! First-access identity challenge.
//!
//! Proves the party holding a magic link is the recorded subject by asking
//! for their name. Matching is deliberately permissive: any whole part of
//! the recorded name (first or last), compared case-, whitespace-, and
//! diacritic-insensitively.

use std::sync::Arc;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{AccessAction, ClientInfo};
use crate::services::record_event;
use crate::store::{AccessLog, GrantStore};

#[derive(Clone)]
pub struct IdentityChallengeService {
    store: Arc<dyn GrantStore>,
    log: Arc<dyn AccessLog>,
    max_attempts: u32,
}

impl IdentityChallengeService {
    pub fn new(store: Arc<dyn GrantStore>, log: Arc<dyn AccessLog>, max_attempts: u32) -> Self {
        Self {
            store,
            log,
            max_attempts,
        }
    }

    /// Check a claimed name against the grant's recorded subject name.
    ///
    /// Failures are logged with their reason; the caller sees only a bool.
    pub async fn verify_identity(
        &self,
        grant_id: Uuid,
        claimed_name: &str,
        client: Option<&ClientInfo>,
    ) -> Result<bool, AccessError> {
        let grant = match self.store.find_grant(grant_id).await? {
            Some(grant) => grant,
            None => {
                record_event(
                    &self.log,
                    Some(grant_id),
                    AccessAction::IdentityVerificationFailed,
                    client,
                    Some("grant not found"),
                )
                .await;
                return Ok(false);
            }
        };

        let claim = normalize_name(claimed_name);
        let recorded = normalize_name(&grant.subject_name);
        let matched = !claim.is_empty() && recorded.split_whitespace().any(|part| part == claim);

        if !matched {
            record_event(
                &self.log,
                Some(grant_id),
                AccessAction::IdentityVerificationFailed,
                client,
                Some("name mismatch"),
            )
            .await;
            tracing::warn!(grant_id = %grant_id, "Identity verification failed");
        }

        Ok(matched)
    }

    /// Record a successful identity challenge: set the verified flag and
    /// touch `last_access_at`. Once a session exists this is effectively a
    /// no-op repeat, never an error.
    pub async fn mark_verified(
        &self,
        grant_id: Uuid,
        client: Option<&ClientInfo>,
    ) -> Result<(), AccessError> {
        let matched = self.store.mark_verified(grant_id).await?;
        if !matched {
            return Err(AccessError::NotFound);
        }

        record_event(
            &self.log,
            Some(grant_id),
            AccessAction::IdentityVerified,
            client,
            None,
        )
        .await;
        tracing::info!(grant_id = %grant_id, "Identity verified");

        Ok(())
    }

    /// Failed attempts since the most recent issuance.
    pub async fn count_failed_attempts(&self, grant_id: Uuid) -> Result<i64, AccessError> {
        self.log.count_failures_since_last_issue(grant_id).await
    }

    /// Whether the grant has burned through its allowed failures since the
    /// last issuance. Callers check this before presenting the challenge;
    /// issuing a fresh link opens a new window.
    pub async fn is_throttled(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        let failures = self.count_failed_attempts(grant_id).await?;
        Ok(failures >= i64::from(self.max_attempts))
    }
}

/// Lowercase, strip diacritics (NFD + combining-mark removal), and collapse
/// whitespace.
fn normalize_name(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
