//! Engine configuration.
//!
//! # Responsibility
//! - Collect log, storage and token settings with working defaults.
//! - Read overrides from environment-style key lookups.
//!
//! # Invariants
//! - Every token lifetime is strictly positive.
//! - Unset or empty keys fall back to defaults; malformed numbers are errors.
//! - Secrets default to empty; `TokenConfig::ensure_secrets` gates their use.

use crate::logging::default_log_level;
use crate::repo::token_repo::TokenKind;
use chrono::Duration;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const LOG_LEVEL_KEY: &str = "RECORDKIT_LOG_LEVEL";
pub const LOG_DIR_KEY: &str = "RECORDKIT_LOG_DIR";
pub const DB_PATH_KEY: &str = "RECORDKIT_DB_PATH";
pub const ACCESS_MINUTES_KEY: &str = "JWT_ACCESS_EXPIRATION_MINUTES";
pub const REFRESH_DAYS_KEY: &str = "JWT_REFRESH_EXPIRATION_DAYS";
pub const RESET_PASSWORD_MINUTES_KEY: &str = "JWT_RESET_PASSWORD_EXPIRATION_MINUTES";
pub const VERIFY_EMAIL_MINUTES_KEY: &str = "JWT_VERIFY_EMAIL_EXPIRATION_MINUTES";
pub const ACCESS_SECRET_KEY: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_KEY: &str = "REFRESH_TOKEN_SECRET";
pub const RESET_SECRET_KEY: &str = "RESET_TOKEN_SECRET";
pub const VERIFY_EMAIL_SECRET_KEY: &str = "VERIFY_EMAIL_TOKEN_SECRET";

const DEFAULT_ACCESS_MINUTES: i64 = 30;
const DEFAULT_REFRESH_DAYS: i64 = 30;
const DEFAULT_RESET_PASSWORD_MINUTES: i64 = 10;
const DEFAULT_VERIFY_EMAIL_MINUTES: i64 = 10;
const DEFAULT_LOG_DIR_NAME: &str = "recordkit-logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is not a positive integer.
    InvalidNumber { key: &'static str, value: String },
    /// Signing secret is unset or blank.
    MissingSecret(&'static str),
    /// Two token kinds are configured with the same secret.
    SharedSecret {
        first: &'static str,
        second: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be a positive integer, got `{value}`")
            }
            Self::MissingSecret(key) => write!(f, "`{key}` must be set to a non-empty secret"),
            Self::SharedSecret { first, second } => {
                write!(f, "`{first}` and `{second}` must not share a secret")
            }
        }
    }
}

impl Error for ConfigError {}

/// Lifetimes and signing secrets per token kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_password_ttl: Duration,
    pub verify_email_ttl: Duration,
    pub access_secret: String,
    pub refresh_secret: String,
    pub reset_password_secret: String,
    pub verify_email_secret: String,
}

impl TokenConfig {
    pub fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::ResetPassword => self.reset_password_ttl,
            TokenKind::VerifyEmail => self.verify_email_ttl,
        }
    }

    pub fn secret_for(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
            TokenKind::ResetPassword => &self.reset_password_secret,
            TokenKind::VerifyEmail => &self.verify_email_secret,
        }
    }

    /// Checks that every kind has its own non-blank secret.
    ///
    /// # Errors
    /// - `MissingSecret` naming the env key of the first blank secret.
    /// - `SharedSecret` when two kinds use the same secret.
    pub fn ensure_secrets(&self) -> Result<(), ConfigError> {
        let secrets = [
            (ACCESS_SECRET_KEY, self.access_secret.as_str()),
            (REFRESH_SECRET_KEY, self.refresh_secret.as_str()),
            (RESET_SECRET_KEY, self.reset_password_secret.as_str()),
            (VERIFY_EMAIL_SECRET_KEY, self.verify_email_secret.as_str()),
        ];

        for (key, secret) in secrets {
            if secret.trim().is_empty() {
                return Err(ConfigError::MissingSecret(key));
            }
        }
        for (index, &(first, secret)) in secrets.iter().enumerate() {
            if let Some(&(second, _)) = secrets[index + 1..]
                .iter()
                .find(|&&(_, other)| other == secret)
            {
                return Err(ConfigError::SharedSecret { first, second });
            }
        }
        Ok(())
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(DEFAULT_ACCESS_MINUTES),
            refresh_ttl: Duration::days(DEFAULT_REFRESH_DAYS),
            reset_password_ttl: Duration::minutes(DEFAULT_RESET_PASSWORD_MINUTES),
            verify_email_ttl: Duration::minutes(DEFAULT_VERIFY_EMAIL_MINUTES),
            access_secret: String::new(),
            refresh_secret: String::new(),
            reset_password_secret: String::new(),
            verify_email_secret: String::new(),
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub log_level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
    /// Database file; `None` runs against an in-memory database.
    pub db_path: Option<PathBuf>,
    pub tokens: TokenConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
            db_path: None,
            tokens: TokenConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(level) = read(LOG_LEVEL_KEY) {
            config.log_level = level;
        }
        if let Some(dir) = read(LOG_DIR_KEY) {
            config.log_dir = PathBuf::from(dir);
        }
        config.db_path = read(DB_PATH_KEY).map(PathBuf::from);

        let tokens = &mut config.tokens;
        if let Some(value) = read(ACCESS_MINUTES_KEY) {
            tokens.access_ttl = Duration::minutes(parse_positive(ACCESS_MINUTES_KEY, &value)?);
        }
        if let Some(value) = read(REFRESH_DAYS_KEY) {
            tokens.refresh_ttl = Duration::days(parse_positive(REFRESH_DAYS_KEY, &value)?);
        }
        if let Some(value) = read(RESET_PASSWORD_MINUTES_KEY) {
            tokens.reset_password_ttl =
                Duration::minutes(parse_positive(RESET_PASSWORD_MINUTES_KEY, &value)?);
        }
        if let Some(value) = read(VERIFY_EMAIL_MINUTES_KEY) {
            tokens.verify_email_ttl =
                Duration::minutes(parse_positive(VERIFY_EMAIL_MINUTES_KEY, &value)?);
        }

        for (key, slot) in [
            (ACCESS_SECRET_KEY, &mut tokens.access_secret),
            (REFRESH_SECRET_KEY, &mut tokens.refresh_secret),
            (RESET_SECRET_KEY, &mut tokens.reset_password_secret),
            (VERIFY_EMAIL_SECRET_KEY, &mut tokens.verify_email_secret),
        ] {
            if let Some(secret) = read(key) {
                *slot = secret;
            }
        }

        Ok(config)
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<i64, ConfigError> {
    match value.parse::<i64>() {
        // Bounded so chrono durations cannot overflow.
        Ok(number) if number > 0 && number <= 1_000_000 => Ok(number),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, EngineConfig, ACCESS_MINUTES_KEY, ACCESS_SECRET_KEY, DB_PATH_KEY,
        REFRESH_SECRET_KEY, RESET_SECRET_KEY, VERIFY_EMAIL_SECRET_KEY,
    };
    use crate::repo::token_repo::TokenKind;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_lifetimes() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.tokens.ttl_for(TokenKind::Access), Duration::minutes(30));
        assert_eq!(config.tokens.ttl_for(TokenKind::Refresh), Duration::days(30));
        assert_eq!(config.tokens.ttl_for(TokenKind::ResetPassword), Duration::minutes(10));
        assert_eq!(config.tokens.ttl_for(TokenKind::VerifyEmail), Duration::minutes(10));
        assert!(config.db_path.is_none());
        assert!(config.log_dir.is_absolute());
    }

    #[test]
    fn overrides_are_applied_and_blank_values_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ACCESS_MINUTES_KEY, "5"),
            (DB_PATH_KEY, "/tmp/records.sqlite3"),
            ("REFRESH_TOKEN_SECRET", "r-secret"),
            ("RECORDKIT_LOG_LEVEL", "  "),
        ]))
        .unwrap();

        assert_eq!(config.tokens.access_ttl, Duration::minutes(5));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/records.sqlite3")));
        assert_eq!(config.tokens.secret_for(TokenKind::Refresh), "r-secret");
        assert_eq!(config.log_level, EngineConfig::default().log_level);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[(ACCESS_MINUTES_KEY, "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: ACCESS_MINUTES_KEY,
                value: "soon".to_string()
            }
        );
        assert!(EngineConfig::from_lookup(lookup(&[(ACCESS_MINUTES_KEY, "0")])).is_err());
    }

    #[test]
    fn default_secrets_are_rejected() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(
            config.tokens.ensure_secrets(),
            Err(ConfigError::MissingSecret(ACCESS_SECRET_KEY))
        );
    }

    #[test]
    fn secrets_must_be_distinct_per_kind() {
        let shared = EngineConfig::from_lookup(lookup(&[
            (ACCESS_SECRET_KEY, "a"),
            (REFRESH_SECRET_KEY, "r"),
            (RESET_SECRET_KEY, "a"),
            (VERIFY_EMAIL_SECRET_KEY, "v"),
        ]))
        .unwrap();
        assert_eq!(
            shared.tokens.ensure_secrets(),
            Err(ConfigError::SharedSecret {
                first: ACCESS_SECRET_KEY,
                second: RESET_SECRET_KEY
            })
        );

        let distinct = EngineConfig::from_lookup(lookup(&[
            (ACCESS_SECRET_KEY, "a"),
            (REFRESH_SECRET_KEY, "r"),
            (RESET_SECRET_KEY, "p"),
            (VERIFY_EMAIL_SECRET_KEY, "v"),
        ]))
        .unwrap();
        assert_eq!(distinct.tokens.ensure_secrets(), Ok(()));
    }
}
