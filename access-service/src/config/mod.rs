use crate::error::AccessError;
use std::env;

/// Service configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    /// Base URL the redemption link is built against, e.g. `https://app.example.com`.
    pub base_url: String,
    /// Path component of the redemption URL.
    pub redemption_path: String,
    /// Magic-link lifetime from issuance to expiry.
    pub magic_link_expiry_hours: i64,
    /// Absolute session lifetime, enforced by the cookie max-age (the store
    /// itself does not expire sessions).
    pub session_lifetime_hours: i64,
    /// Idle interval after which the per-request rotation policy replaces the
    /// session secret.
    pub rotation_interval_hours: i64,
    /// Failed identity-challenge attempts allowed per issuance window before
    /// `IdentityChallengeService::is_throttled` trips.
    pub identity_max_attempts: u32,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a pooled connection before giving up.
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from_email: String,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AccessError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AccessError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AccessConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("access-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
                acquire_timeout_secs: parse_env("DATABASE_ACQUIRE_TIMEOUT_SECS", Some("30"), is_prod)?,
            },
            base_url: get_env("BASE_URL", Some("http://localhost:3000"), is_prod)?,
            redemption_path: get_env("REDEMPTION_PATH", Some("/access"), is_prod)?,
            magic_link_expiry_hours: parse_env("MAGIC_LINK_EXPIRY_HOURS", Some("24"), is_prod)?,
            session_lifetime_hours: parse_env("SESSION_LIFETIME_HOURS", Some("24"), is_prod)?,
            rotation_interval_hours: parse_env("SESSION_ROTATION_HOURS", Some("4"), is_prod)?,
            identity_max_attempts: parse_env("IDENTITY_MAX_ATTEMPTS", Some("5"), is_prod)?,
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from_email: get_env("SMTP_FROM", None, is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AccessError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AccessError::ConfigError(anyhow::anyhow!(
                "BASE_URL must be an absolute http(s) URL"
            )));
        }

        if self.magic_link_expiry_hours <= 0 {
            return Err(AccessError::ConfigError(anyhow::anyhow!(
                "MAGIC_LINK_EXPIRY_HOURS must be positive"
            )));
        }

        if self.session_lifetime_hours <= 0 {
            return Err(AccessError::ConfigError(anyhow::anyhow!(
                "SESSION_LIFETIME_HOURS must be positive"
            )));
        }

        if self.rotation_interval_hours <= 0 {
            return Err(AccessError::ConfigError(anyhow::anyhow!(
                "SESSION_ROTATION_HOURS must be positive"
            )));
        }

        // The session carrier must only travel over a secure channel.
        if self.environment == Environment::Prod && !self.base_url.starts_with("https://") {
            return Err(AccessError::ConfigError(anyhow::anyhow!(
                "BASE_URL must use https in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AccessError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AccessError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AccessError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AccessError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?.parse().map_err(|e: T::Err| {
        AccessError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
