use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Where and how predictions are submitted and polled.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicateConfig {
    pub base_url: String,
    pub model: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub request_timeout_secs: u64,
}

impl ReplicateConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Longest time a single generation may spend polling, plus slack for the
    /// submit round-trip.
    pub fn poll_window(&self) -> Duration {
        self.poll_interval()
            .saturating_mul(self.max_poll_attempts)
            .saturating_add(Duration::from_secs(60))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Argon2 PHC string. `None` disables admin login.
    pub password_hash: Option<String>,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub replicate: ReplicateConfig,
    pub admin: AdminConfig,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: var_or("JWT_ISSUER", "veogen"),
            audience: var_or("JWT_AUDIENCE", "veogen-users"),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parsed_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: var_or("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: var_or("MINIO_BUCKET", "veogen"),
            access_key: var_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: var_or("MINIO_SECRET_KEY", "minioadmin"),
        };
        let replicate = ReplicateConfig {
            base_url: var_or("REPLICATE_BASE_URL", "https://api.replicate.com/v1"),
            model: var_or("REPLICATE_MODEL", "google/veo-3"),
            poll_interval_secs: parsed_or("REPLICATE_POLL_INTERVAL_SECS", 5),
            max_poll_attempts: parsed_or("REPLICATE_MAX_POLL_ATTEMPTS", 60),
            request_timeout_secs: parsed_or("REPLICATE_REQUEST_TIMEOUT_SECS", 30),
        };
        let admin = AdminConfig {
            password_hash: std::env::var("ADMIN_PASSWORD_HASH")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            token_ttl_minutes: parsed_or("ADMIN_TOKEN_TTL_MINUTES", 60),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            replicate,
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_window_covers_every_attempt() {
        let cfg = ReplicateConfig {
            base_url: "http://localhost".into(),
            model: "google/veo-3".into(),
            poll_interval_secs: 5,
            max_poll_attempts: 60,
            request_timeout_secs: 30,
        };
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.poll_window(), Duration::from_secs(360));
    }

    #[test]
    fn poll_window_saturates_on_huge_settings() {
        let cfg = ReplicateConfig {
            base_url: "http://localhost".into(),
            model: "google/veo-3".into(),
            poll_interval_secs: u64::MAX,
            max_poll_attempts: u32::MAX,
            request_timeout_secs: 30,
        };
        assert_eq!(cfg.poll_window(), Duration::MAX);
    }

    #[test]
    fn missing_required_vars_are_named() {
        std::env::remove_var("DATABASE_URL");
        let err = AppConfig::from_env().unwrap_err();
        assert!(format!("{:#}", err).contains("DATABASE_URL"));
    }

    #[test]
    fn parsed_or_falls_back_on_garbage() {
        std::env::set_var("VEOGEN_TEST_PARSED_OR", "not-a-number");
        assert_eq!(parsed_or("VEOGEN_TEST_PARSED_OR", 7u32), 7);
        std::env::set_var("VEOGEN_TEST_PARSED_OR", "12");
        assert_eq!(parsed_or("VEOGEN_TEST_PARSED_OR", 7u32), 12);
        std::env::remove_var("VEOGEN_TEST_PARSED_OR");
    }
}
