//! Configuration loading and representation.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use postguard_auth::PasswordScheme;

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_JWT_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;
/// Thirty days.
const MAX_TOKEN_TTL_MINUTES: i64 = 30 * 24 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub token_ttl: Duration,
    pub password_scheme: PasswordScheme,
    /// Drop, recreate and seed the schema when the first request arrives.
    pub seed_on_first_request: bool,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (env-like).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(s) if !s.is_empty() => s,
            Some(_) => return Err(ConfigError::invalid("JWT_SECRET", "must not be empty")),
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

        let ttl_minutes = match lookup("TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| ConfigError::invalid("TOKEN_TTL_MINUTES", e.to_string()))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(ConfigError::invalid(
                "TOKEN_TTL_MINUTES",
                format!("must be between 1 and {MAX_TOKEN_TTL_MINUTES}"),
            ));
        }
        let token_ttl = Duration::try_minutes(ttl_minutes)
            .ok_or_else(|| ConfigError::invalid("TOKEN_TTL_MINUTES", "out of range"))?;

        let password_scheme = match lookup("PASSWORD_SCHEME") {
            Some(raw) => raw
                .parse::<PasswordScheme>()
                .map_err(|e| ConfigError::invalid("PASSWORD_SCHEME", e.to_string()))?,
            None => PasswordScheme::default(),
        };

        let seed_on_first_request = match lookup("SEED_ON_FIRST_REQUEST") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::invalid("SEED_ON_FIRST_REQUEST", format!("'{raw}' is not a boolean")))?,
            None => true,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            token_ttl,
            password_scheme,
            seed_on_first_request,
        })
    }

    /// In-memory configuration used by tests.
    pub fn for_tests() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            token_ttl: Duration::minutes(10),
            password_scheme: PasswordScheme::Plaintext,
            seed_on_first_request: true,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.jwt_secret, "dev-secret");
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.token_ttl, Duration::minutes(60));
        assert_eq!(cfg.password_scheme, PasswordScheme::Pbkdf2);
        assert!(cfg.seed_on_first_request);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = load(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("TOKEN_TTL_MINUTES", "5"),
            ("PASSWORD_SCHEME", "plaintext"),
            ("SEED_ON_FIRST_REQUEST", "off"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url, "sqlite://app.db");
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.token_ttl, Duration::minutes(5));
        assert_eq!(cfg.password_scheme, PasswordScheme::Plaintext);
        assert!(!cfg.seed_on_first_request);
    }

    #[test]
    fn invalid_values_name_the_offending_key() {
        let err = load(&[("TOKEN_TTL_MINUTES", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOKEN_TTL_MINUTES", .. }));

        let err = load(&[("PASSWORD_SCHEME", "md5")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PASSWORD_SCHEME", .. }));

        let err = load(&[("SEED_ON_FIRST_REQUEST", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SEED_ON_FIRST_REQUEST", .. }));
    }

    #[test]
    fn token_ttl_is_bounded() {
        for raw in ["200000000000", "43201", "-5"] {
            let err = load(&[("TOKEN_TTL_MINUTES", raw)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "TOKEN_TTL_MINUTES", .. }), "{raw}");
        }
        let cfg = load(&[("TOKEN_TTL_MINUTES", "43200")]).unwrap();
        assert_eq!(cfg.token_ttl, Duration::days(30));
    }
}
