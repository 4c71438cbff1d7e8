//! Passwordless credential and session lifecycle for account-less grant
//! access.
//!
//! Subjects (tenants and similar parties without durable accounts) receive a
//! single-use magic link by email; redeeming it, after an identity challenge,
//! establishes a rotating session carried in a cookie. Secrets are persisted
//! hash-only (SHA-256) and every lifecycle event lands in an append-only
//! access log.
//!
//! The crate is a library consumed by a larger application's request
//! handlers: it ships the services, the store seams (PostgreSQL and
//! in-memory), the session cookie builder, and the delivery collaborator
//! trait, but no routes of its own.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use access_service::{
//!     config::AccessConfig,
//!     services::AccessServices,
//!     store::{self, PgAccessStore},
//! };
//!
//! # async fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AccessConfig::from_env()?;
//! let pool = store::db::create_pool(&config.database).await?;
//! store::db::run_migrations(&pool).await?;
//!
//! let store = Arc::new(PgAccessStore::new(pool));
//! let services = AccessServices::new(store.clone(), store, &config);
//!
//! let raw = services.issuance.issue(uuid::Uuid::new_v4(), None).await?;
//! let url = services.issuance.redemption_url(&raw);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod token;

pub use error::AccessError;
pub use models::{AccessAction, AccessLogEntry, ClientInfo, Grant, GrantStatus, GrantView};
pub use services::{
    AccessServices, IdentityChallengeService, RotationPolicy, SessionService,
    TokenIssuanceService, TokenRedemptionService,
};
