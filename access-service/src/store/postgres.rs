//! PostgreSQL store for grants and access logs.
//!
//! Every mutation is a single conditional UPDATE so concurrent redemption,
//! re-issuance, and rotation resolve through row-level atomicity rather than
//! read-then-write sequences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::error::AccessError;
use crate::models::{AccessAction, ClientInfo, Grant};
use crate::store::{AccessLog, GrantStore};

#[derive(Clone)]
pub struct PgAccessStore {
    pool: PgPool,
}

impl PgAccessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a grant. Grants are normally created by the surrounding
    /// business domain; this exists for provisioning and tests.
    pub async fn insert_grant(&self, grant: &Grant) -> Result<(), AccessError> {
        sqlx::query(
            r#"
            INSERT INTO grants (grant_id, resource_id, resource_label, subject_name,
                                subject_email, status_code, magic_link_verified, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(grant.grant_id)
        .bind(grant.resource_id)
        .bind(&grant.resource_label)
        .bind(&grant.subject_name)
        .bind(&grant.subject_email)
        .bind(&grant.status_code)
        .bind(grant.magic_link_verified)
        .bind(grant.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for PgAccessStore {
    async fn find_grant(&self, grant_id: Uuid) -> Result<Option<Grant>, AccessError> {
        let grant = sqlx::query_as::<_, Grant>("SELECT * FROM grants WHERE grant_id = $1")
            .bind(grant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(grant)
    }

    async fn find_by_magic_link_hash(&self, hash: &str) -> Result<Option<Grant>, AccessError> {
        let grant = sqlx::query_as::<_, Grant>("SELECT * FROM grants WHERE magic_link_hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(grant)
    }

    async fn find_by_session_hash(&self, hash: &str) -> Result<Option<Grant>, AccessError> {
        let grant = sqlx::query_as::<_, Grant>("SELECT * FROM grants WHERE session_hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(grant)
    }

    async fn set_magic_link(
        &self,
        grant_id: Uuid,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AccessError> {
        let result = sqlx::query(
            r#"
            UPDATE grants
            SET magic_link_hash = $2,
                magic_link_expires_at = $3,
                magic_link_verified = FALSE,
                session_hash = NULL
            WHERE grant_id = $1
            "#,
        )
        .bind(grant_id)
        .bind(hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_magic_link(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        let result = sqlx::query(
            r#"
            UPDATE grants
            SET magic_link_hash = NULL,
                magic_link_expires_at = NULL,
                magic_link_verified = FALSE
            WHERE grant_id = $1
            "#,
        )
        .bind(grant_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn establish_session(
        &self,
        grant_id: Uuid,
        session_hash: &str,
    ) -> Result<bool, AccessError> {
        // The magic_link_hash guard is the single-use compare-and-swap: of two
        // concurrent establishments, only one matches a row.
        let result = sqlx::query(
            r#"
            UPDATE grants
            SET session_hash = $2,
                magic_link_hash = NULL,
                magic_link_expires_at = NULL,
                last_access_at = now()
            WHERE grant_id = $1
              AND status_code = 'active'
              AND magic_link_hash IS NOT NULL
            "#,
        )
        .bind(grant_id)
        .bind(session_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_session(
        &self,
        grant_id: Uuid,
        session_hash: &str,
    ) -> Result<bool, AccessError> {
        let result = sqlx::query(
            r#"
            UPDATE grants
            SET session_hash = $2,
                last_access_at = now()
            WHERE grant_id = $1
            "#,
        )
        .bind(grant_id)
        .bind(session_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_session(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        let result = sqlx::query("UPDATE grants SET session_hash = NULL WHERE grant_id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_verified(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        let result = sqlx::query(
            r#"
            UPDATE grants
            SET magic_link_verified = TRUE,
                last_access_at = now()
            WHERE grant_id = $1
            "#,
        )
        .bind(grant_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_access(&self, grant_id: Uuid) -> Result<bool, AccessError> {
        let result = sqlx::query("UPDATE grants SET last_access_at = now() WHERE grant_id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AccessLog for PgAccessStore {
    async fn append(
        &self,
        grant_id: Option<Uuid>,
        action: AccessAction,
        client: Option<&ClientInfo>,
        failure_reason: Option<&str>,
    ) -> Result<(), AccessError> {
        sqlx::query(
            r#"
            INSERT INTO access_logs (log_id, grant_id, action, ip_address,
                                     user_agent, failure_reason, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(grant_id)
        .bind(action.as_str())
        .bind(client.and_then(|c| c.ip_address.clone()))
        .bind(client.and_then(|c| c.user_agent.clone()))
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_failures_since_last_issue(&self, grant_id: Uuid) -> Result<i64, AccessError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM access_logs
            WHERE grant_id = $1
              AND action = 'identity_verification_failed'
              AND created_utc > COALESCE(
                  (SELECT MAX(created_utc) FROM access_logs
                   WHERE grant_id = $1 AND action = 'token_generated'),
                  'epoch'::timestamptz)
            "#,
        )
        .bind(grant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
