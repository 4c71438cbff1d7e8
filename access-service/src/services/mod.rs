//! Credential lifecycle services.
//!
//! Each service takes its store and log dependencies explicitly; there is no
//! ambient store handle anywhere in the crate.

pub mod identity;
pub mod issuance;
pub mod redemption;
pub mod session;

pub use identity::IdentityChallengeService;
pub use issuance::TokenIssuanceService;
pub use redemption::TokenRedemptionService;
pub use session::{RotationPolicy, SessionService};

use std::sync::Arc;
use uuid::Uuid;

use crate::config::AccessConfig;
use crate::models::{AccessAction, ClientInfo};
use crate::store::{AccessLog, GrantStore};

/// Append an access log entry. A failed log write is reported operationally
/// but never overrides the security decision the caller has already made.
pub(crate) async fn record_event(
    log: &Arc<dyn AccessLog>,
    grant_id: Option<Uuid>,
    action: AccessAction,
    client: Option<&ClientInfo>,
    failure_reason: Option<&str>,
) {
    if let Err(e) = log.append(grant_id, action, client, failure_reason).await {
        tracing::error!(
            error = %e,
            action = action.as_str(),
            "Failed to write access log entry"
        );
    }
}

/// All lifecycle services wired against one store and log.
#[derive(Clone)]
pub struct AccessServices {
    pub issuance: TokenIssuanceService,
    pub redemption: TokenRedemptionService,
    pub session: SessionService,
    pub identity: IdentityChallengeService,
    pub rotation: RotationPolicy,
}

impl AccessServices {
    pub fn new(
        store: Arc<dyn GrantStore>,
        log: Arc<dyn AccessLog>,
        config: &AccessConfig,
    ) -> Self {
        let issuance = TokenIssuanceService::new(
            store.clone(),
            log.clone(),
            config.base_url.clone(),
            config.redemption_path.clone(),
            config.magic_link_expiry_hours,
        );
        let redemption = TokenRedemptionService::new(store.clone(), log.clone());
        let session = SessionService::new(store.clone(), log.clone(), redemption.clone());
        let identity = IdentityChallengeService::new(store, log, config.identity_max_attempts);

        Self {
            issuance,
            redemption,
            session,
            identity,
            rotation: RotationPolicy::new(config.rotation_interval_hours),
        }
    }
}
