//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! navigator and Telegram retry constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Base URL of the vote-listing backend (e.g. `https://haters.example.com`)
    pub backend_url: String,

    /// Comma-separated list of allowed user IDs; empty allows everyone
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Idle seconds before a navigator disables its controls
    #[serde(default = "default_nav_timeout_secs")]
    pub nav_timeout_secs: u64,

    /// Timeout for a single backend request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Default `limit` for post votes
    #[serde(default = "default_post_votes_limit")]
    pub post_votes_limit: u32,

    /// Default `limit` for comment votes
    #[serde(default = "default_comment_votes_limit")]
    pub comment_votes_limit: u32,

    /// Largest `limit` a user may request
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Send navigators silently
    #[serde(default)]
    pub ephemeral: bool,
}

const fn default_nav_timeout_secs() -> u64 {
    120
}

const fn default_http_timeout_secs() -> u64 {
    30
}

const fn default_post_votes_limit() -> u32 {
    10
}

const fn default_comment_votes_limit() -> u32 {
    20
}

const fn default_max_limit() -> u32 {
    50
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        // Start off by merging in the "default" configuration file
        .add_source(File::with_name("config/default").required(false))
        // Add in the current environment file
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__NAV_TIMEOUT_SECS=300 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain environment variables; UPPER_SNAKE_CASE maps to snake_case
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        if settings.backend_url.trim().is_empty() {
            return Err(ConfigError::Message("BACKEND_URL must not be empty".to_string()));
        }
        Ok(settings)
    }

    /// Returns a set of Telegram IDs that are allowed to use the bot
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `user_id` may use the bot (an empty allow-list admits everyone)
    #[must_use]
    pub fn is_allowed(&self, user_id: i64) -> bool {
        let allowed = self.allowed_users();
        allowed.is_empty() || allowed.contains(&user_id)
    }

    #[must_use]
    pub const fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.nav_timeout_secs)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Vote lines per Telegram message; larger batches are split across pages
/// to stay under the 4096 character message limit.
pub const MAX_RECORDS_PER_MESSAGE: usize = 20;

// Telegram API retry configuration
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum retries after the first attempt
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
