//! Session establishment, validation, rotation, and invalidation.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{AccessAction, ClientInfo, GrantView};
use crate::services::{record_event, TokenRedemptionService};
use crate::store::{AccessLog, GrantStore};
use crate::token::{generate_secret, hash_secret};

/// Cookie carrying the raw session secret.
pub const SESSION_COOKIE_NAME: &str = "grant_session";

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn GrantStore>,
    log: Arc<dyn AccessLog>,
    redemption: TokenRedemptionService,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn GrantStore>,
        log: Arc<dyn AccessLog>,
        redemption: TokenRedemptionService,
    ) -> Self {
        Self {
            store,
            log,
            redemption,
        }
    }

    /// Exchange a redeemed magic link for a session and return the raw
    /// session secret.
    ///
    /// The store-level update is conditional on the magic-link hash still
    /// being present, which makes the exchange single-use: of two concurrent
    /// establishments from the same link, exactly one succeeds.
    pub async fn establish(
        &self,
        grant_id: Uuid,
        client: Option<&ClientInfo>,
    ) -> Result<String, AccessError> {
        let secret = generate_secret();

        let matched = self.store.establish_session(grant_id, &secret.hash).await?;
        if !matched {
            return match self.store.find_grant(grant_id).await? {
                None => Err(AccessError::NotFound),
                // Link already consumed, revoked, or the grant went inactive.
                Some(_) => Err(AccessError::InvalidOrExpired),
            };
        }

        record_event(
            &self.log,
            Some(grant_id),
            AccessAction::SessionCreated,
            client,
            None,
        )
        .await;
        tracing::info!(grant_id = %grant_id, "Session established");

        Ok(secret.raw)
    }

    /// Validate a raw session secret against the store.
    ///
    /// Sessions carry no stored expiry: absolute lifetime is bounded by the
    /// cookie max-age and rotation bounds the exposure window. Every call
    /// hits the store, since a concurrent rotate, revoke, or re-issue may
    /// have invalidated the hash.
    pub async fn validate_session(
        &self,
        raw_secret: &str,
        client: Option<&ClientInfo>,
    ) -> Result<GrantView, AccessError> {
        let hash = hash_secret(raw_secret);

        if let Some(grant) = self.store.find_by_session_hash(&hash).await? {
            if !grant.is_active() {
                return Err(AccessError::InvalidOrExpired);
            }
            return Ok(GrantView::from(grant));
        }

        // Compatibility: cookies issued before the session-hash scheme carry
        // the raw magic-link token, so fall back to magic-link validation.
        // Remove once all live sessions have been re-established.
        self.redemption.redeem(raw_secret, client).await
    }

    /// Unconditionally replace the session secret. The caller decides when
    /// via `RotationPolicy` and must propagate the new raw secret to the
    /// credential carrier before completing the request.
    pub async fn rotate(&self, grant_id: Uuid) -> Result<String, AccessError> {
        let secret = generate_secret();

        let matched = self.store.rotate_session(grant_id, &secret.hash).await?;
        if !matched {
            return Err(AccessError::NotFound);
        }

        tracing::debug!(grant_id = %grant_id, "Session rotated");
        Ok(secret.raw)
    }

    /// Drop the session (explicit logout).
    pub async fn invalidate(
        &self,
        grant_id: Uuid,
        client: Option<&ClientInfo>,
    ) -> Result<(), AccessError> {
        let matched = self.store.clear_session(grant_id).await?;
        if !matched {
            return Err(AccessError::NotFound);
        }

        record_event(
            &self.log,
            Some(grant_id),
            AccessAction::SessionExpired,
            client,
            None,
        )
        .await;
        tracing::info!(grant_id = %grant_id, "Session invalidated");

        Ok(())
    }

    /// Touch `last_access_at` without rotating.
    pub async fn mark_accessed(&self, grant_id: Uuid) -> Result<(), AccessError> {
        let matched = self.store.touch_last_access(grant_id).await?;
        if !matched {
            return Err(AccessError::NotFound);
        }
        Ok(())
    }
}

/// Stateless per-request rotation decision. There is no background timer;
/// the caller checks on each request and rotates before responding.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    interval_hours: i64,
}

impl RotationPolicy {
    pub fn new(interval_hours: i64) -> Self {
        Self { interval_hours }
    }

    pub fn should_rotate(&self, last_access_at: Option<DateTime<Utc>>) -> bool {
        self.should_rotate_at(last_access_at, Utc::now())
    }

    fn should_rotate_at(&self, last_access_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_access_at {
            Some(last) => now - last >= Duration::hours(self.interval_hours),
            None => true,
        }
    }
}

/// Session cookie for the raw secret: secure channel only, non-scriptable,
/// same-site. Max-age enforces the absolute session lifetime the store
/// deliberately does not track.
pub fn session_cookie(raw_secret: &str, lifetime_hours: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, raw_secret.to_owned()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(lifetime_hours))
        .build()
}

/// Expired cookie that clears the session carrier on logout.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}
