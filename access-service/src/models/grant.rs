//! Grant model - the protected resource credential state is anchored to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Grant lifecycle state codes, controlled by the surrounding business domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantStatus {
    Active,
    Pending,
    Ended,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Active => "active",
            GrantStatus::Pending => "pending",
            GrantStatus::Ended => "ended",
        }
    }
}

impl std::str::FromStr for GrantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GrantStatus::Active),
            "pending" => Ok(GrantStatus::Pending),
            "ended" => Ok(GrantStatus::Ended),
            other => Err(format!("Invalid grant status: {}", other)),
        }
    }
}

/// Grant entity. Credential fields hold hashes only, never raw secrets.
#[derive(Debug, Clone, FromRow)]
pub struct Grant {
    pub grant_id: Uuid,
    pub resource_id: Uuid,
    pub resource_label: Option<String>,
    pub subject_name: String,
    pub subject_email: Option<String>,
    pub status_code: String,
    pub magic_link_hash: Option<String>,
    pub magic_link_expires_at: Option<DateTime<Utc>>,
    pub magic_link_verified: bool,
    pub session_hash: Option<String>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Grant {
    /// Create a new grant with no credential state.
    pub fn new(
        resource_id: Uuid,
        resource_label: Option<String>,
        subject_name: String,
        subject_email: Option<String>,
    ) -> Self {
        Self {
            grant_id: Uuid::new_v4(),
            resource_id,
            resource_label,
            subject_name,
            subject_email,
            status_code: GrantStatus::Active.as_str().to_string(),
            magic_link_hash: None,
            magic_link_expires_at: None,
            magic_link_verified: false,
            session_hash: None,
            last_access_at: None,
            created_utc: Utc::now(),
        }
    }

    /// Check if the grant is in the active state.
    pub fn is_active(&self) -> bool {
        self.status_code == GrantStatus::Active.as_str()
    }

    /// Check if the stored magic link, if any, is still redeemable at `now`.
    /// A hash left in storage past its expiry is never treated as valid.
    pub fn magic_link_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self.magic_link_hash.is_some()
            && self.magic_link_expires_at.is_some_and(|exp| exp > now)
    }
}

/// Read-only projection returned by every read path. Never carries hashes.
#[derive(Debug, Clone, Serialize)]
pub struct GrantView {
    pub grant_id: Uuid,
    pub resource_id: Uuid,
    pub resource_label: Option<String>,
    pub subject_name: String,
    pub subject_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub verified: bool,
}

impl From<Grant> for GrantView {
    fn from(g: Grant) -> Self {
        Self {
            grant_id: g.grant_id,
            resource_id: g.resource_id,
            resource_label: g.resource_label,
            subject_name: g.subject_name,
            subject_email: g.subject_email,
            expires_at: g.magic_link_expires_at,
            verified: g.magic_link_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant() -> Grant {
        Grant::new(Uuid::new_v4(), None, "Amadou Ndiaye".to_string(), None)
    }

    #[test]
    fn new_grant_has_no_credentials() {
        let g = grant();
        assert!(g.is_active());
        assert!(g.magic_link_hash.is_none());
        assert!(g.session_hash.is_none());
        assert!(!g.magic_link_verified);
    }

    #[test]
    fn magic_link_live_requires_hash_expiry_and_active_status() {
        let now = Utc::now();
        let mut g = grant();
        assert!(!g.magic_link_live(now));

        g.magic_link_hash = Some("a".repeat(64));
        g.magic_link_expires_at = Some(now + Duration::hours(1));
        assert!(g.magic_link_live(now));

        g.magic_link_expires_at = Some(now - Duration::seconds(1));
        assert!(!g.magic_link_live(now));

        g.magic_link_expires_at = Some(now + Duration::hours(1));
        g.status_code = GrantStatus::Ended.as_str().to_string();
        assert!(!g.magic_link_live(now));
    }

    #[test]
    fn status_round_trip() {
        for status in [GrantStatus::Active, GrantStatus::Pending, GrantStatus::Ended] {
            assert_eq!(status.as_str().parse::<GrantStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<GrantStatus>().is_err());
    }

    #[test]
    fn view_carries_no_hashes() {
        let mut g = grant();
        g.magic_link_hash = Some("a".repeat(64));
        let view = GrantView::from(g.clone());
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains(&"a".repeat(64)));
        assert_eq!(view.grant_id, g.grant_id);
    }
}
