//! Test helper module for access-service integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use access_service::{
    config::{AccessConfig, DatabaseConfig, Environment, SmtpConfig},
    models::Grant,
    services::AccessServices,
    store::MemoryAccessStore,
};
use uuid::Uuid;

pub struct TestApp {
    pub store: Arc<MemoryAccessStore>,
    pub services: AccessServices,
}

pub fn test_config() -> AccessConfig {
    AccessConfig {
        environment: Environment::Dev,
        service_name: "access-service".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/access_test".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 30,
        },
        base_url: "https://app.example.com".to_string(),
        redemption_path: "/access".to_string(),
        magic_link_expiry_hours: 24,
        session_lifetime_hours: 24,
        rotation_interval_hours: 4,
        identity_max_attempts: 5,
        smtp: SmtpConfig {
            host: "smtp.example.com".to_string(),
            user: "noreply@example.com".to_string(),
            password: "unused".to_string(),
            from_email: "noreply@example.com".to_string(),
        },
    }
}

pub fn setup() -> TestApp {
    let store = Arc::new(MemoryAccessStore::new());
    let services = AccessServices::new(store.clone(), store.clone(), &test_config());
    TestApp { store, services }
}

impl TestApp {
    /// Seed an active grant and return its id.
    pub async fn seed_grant(&self, subject_name: &str) -> Uuid {
        let grant = Grant::new(
            Uuid::new_v4(),
            Some("Apartment 4B".to_string()),
            subject_name.to_string(),
            Some("subject@example.com".to_string()),
        );
        let grant_id = grant.grant_id;
        self.store.insert_grant(grant).await;
        grant_id
    }

    /// Actions recorded for a grant, oldest first.
    pub async fn actions_for(&self, grant_id: Uuid) -> Vec<String> {
        self.store
            .log_entries()
            .await
            .into_iter()
            .filter(|e| e.grant_id == Some(grant_id))
            .map(|e| e.action)
            .collect()
    }
}
