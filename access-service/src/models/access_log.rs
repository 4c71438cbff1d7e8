//! Access log model - immutable audit facts about credential lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Closed taxonomy of auditable credential events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    TokenGenerated,
    TokenValidated,
    TokenValidationFailed,
    IdentityVerified,
    IdentityVerificationFailed,
    TokenRevoked,
    SessionCreated,
    SessionExpired,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::TokenGenerated => "token_generated",
            AccessAction::TokenValidated => "token_validated",
            AccessAction::TokenValidationFailed => "token_validation_failed",
            AccessAction::IdentityVerified => "identity_verified",
            AccessAction::IdentityVerificationFailed => "identity_verification_failed",
            AccessAction::TokenRevoked => "token_revoked",
            AccessAction::SessionCreated => "session_created",
            AccessAction::SessionExpired => "session_expired",
        }
    }
}

impl std::str::FromStr for AccessAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token_generated" => Ok(AccessAction::TokenGenerated),
            "token_validated" => Ok(AccessAction::TokenValidated),
            "token_validation_failed" => Ok(AccessAction::TokenValidationFailed),
            "identity_verified" => Ok(AccessAction::IdentityVerified),
            "identity_verification_failed" => Ok(AccessAction::IdentityVerificationFailed),
            "token_revoked" => Ok(AccessAction::TokenRevoked),
            "session_created" => Ok(AccessAction::SessionCreated),
            "session_expired" => Ok(AccessAction::SessionExpired),
            other => Err(format!("Invalid access action: {}", other)),
        }
    }
}

/// Client metadata attached to a log entry. User agents are truncated so a
/// hostile client cannot bloat the audit table.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

const MAX_USER_AGENT_LEN: usize = 500;

impl ClientInfo {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent: user_agent.map(|ua| {
                if ua.len() > MAX_USER_AGENT_LEN {
                    let mut end = MAX_USER_AGENT_LEN;
                    while !ua.is_char_boundary(end) {
                        end -= 1;
                    }
                    ua[..end].to_string()
                } else {
                    ua
                }
            }),
        }
    }
}

/// Append-only access log entry. Never updated or deleted once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessLogEntry {
    pub log_id: Uuid,
    pub grant_id: Option<Uuid>,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub failure_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AccessLogEntry {
    pub fn new(
        grant_id: Option<Uuid>,
        action: AccessAction,
        client: Option<&ClientInfo>,
        failure_reason: Option<&str>,
    ) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            grant_id,
            action: action.as_str().to_string(),
            ip_address: client.and_then(|c| c.ip_address.clone()),
            user_agent: client.and_then(|c| c.user_agent.clone()),
            failure_reason: failure_reason.map(|r| r.to_string()),
            created_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trip() {
        let actions = [
            AccessAction::TokenGenerated,
            AccessAction::TokenValidated,
            AccessAction::TokenValidationFailed,
            AccessAction::IdentityVerified,
            AccessAction::IdentityVerificationFailed,
            AccessAction::TokenRevoked,
            AccessAction::SessionCreated,
            AccessAction::SessionExpired,
        ];
        for action in actions {
            assert_eq!(action.as_str().parse::<AccessAction>().unwrap(), action);
        }
        assert!("session_rotated".parse::<AccessAction>().is_err());
    }

    #[test]
    fn long_user_agents_are_truncated() {
        let client = ClientInfo::new(None, Some("x".repeat(2000)));
        assert_eq!(client.user_agent.unwrap().len(), 500);
    }

    #[test]
    fn entry_carries_client_metadata() {
        let client = ClientInfo::new(Some("203.0.113.9".to_string()), Some("curl/8".to_string()));
        let entry = AccessLogEntry::new(
            None,
            AccessAction::TokenValidationFailed,
            Some(&client),
            Some("token not found"),
        );
        assert_eq!(entry.action, "token_validation_failed");
        assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(entry.failure_reason.as_deref(), Some("token not found"));
        assert!(entry.grant_id.is_none());
    }
}
