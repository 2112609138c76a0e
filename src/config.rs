//! Runtime configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Everything is read once at startup. `main` loads `.env` first via
//! `dotenvy`, then calls [`Config::from_env`]. Parsing goes through
//! [`Config::from_lookup`] so tests can feed a map instead of mutating the
//! process environment.

use std::time::Duration;

use time::UtcOffset;

use crate::locale::Locale;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_APP_ID: &str = "default-app-id";
const DEFAULT_UTC_OFFSET_HOURS: i8 = 9;
const DEFAULT_TOAST_MS: u64 = 4000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("malformed BOOTSTRAP_TOKENS entry: {0:?} (expected token=uid)")]
    BootstrapEntry(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Namespace for every document this board reads or writes.
    pub app_id: String,
    /// Bootstrap token used when the page doesn't bring its own.
    pub bootstrap_token: Option<String>,
    /// Pre-provisioned `(token, uid)` pairs for the memory store.
    pub bootstrap_tokens: Vec<(String, String)>,
    pub locale: Locale,
    /// Offset used for display and export timestamps.
    pub utc_offset: UtcOffset,
    pub toast_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            app_id: DEFAULT_APP_ID.into(),
            bootstrap_token: None,
            bootstrap_tokens: Vec::new(),
            locale: Locale::default(),
            utc_offset: UtcOffset::from_hms(DEFAULT_UTC_OFFSET_HOURS, 0, 0).unwrap_or(UtcOffset::UTC),
            toast_duration: Duration::from_millis(DEFAULT_TOAST_MS),
        }
    }
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = parse_or(get("PORT"), "PORT", defaults.port)?;
        let db_max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", defaults.db_max_connections)?;
        let offset_hours = parse_or(get("BOARD_UTC_OFFSET_HOURS"), "BOARD_UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS)?;
        let utc_offset = UtcOffset::from_hms(offset_hours, 0, 0)
            .map_err(|_| ConfigError::Invalid { key: "BOARD_UTC_OFFSET_HOURS", value: offset_hours.to_string() })?;
        let toast_ms = parse_or(get("TOAST_MS"), "TOAST_MS", DEFAULT_TOAST_MS)?;

        let locale = match get("BOARD_LOCALE") {
            Some(raw) => raw
                .parse::<Locale>()
                .map_err(|_| ConfigError::Invalid { key: "BOARD_LOCALE", value: raw })?,
            None => defaults.locale,
        };

        let bootstrap_tokens = match get("BOOTSTRAP_TOKENS") {
            Some(raw) => parse_bootstrap_tokens(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            app_id: get("APP_ID").unwrap_or(defaults.app_id),
            bootstrap_token: get("BOOTSTRAP_TOKEN"),
            bootstrap_tokens,
            locale,
            utc_offset,
            toast_duration: Duration::from_millis(toast_ms),
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bootstrap_tokens(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((token, uid)) if !token.trim().is_empty() && !uid.trim().is_empty() => {
                Ok((token.trim().to_owned(), uid.trim().to_owned()))
            }
            _ => Err(ConfigError::BootstrapEntry(entry.to_owned())),
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
