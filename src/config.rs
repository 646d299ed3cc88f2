//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::message_cache::{MESSAGE_CACHE_AGE, MESSAGE_CACHE_MAX};

/// Session engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    // =========================================================================
    // Backend
    // =========================================================================
    /// Access token for the streaming backend
    pub token: String,

    /// Stream endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name reported to the backend for this bot instance
    #[serde(default = "default_name")]
    pub name: String,

    /// Session store database path (None = keep identity in memory only)
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    // =========================================================================
    // Timing
    // =========================================================================
    /// Seconds to wait for a correlated response
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Interval of the cache read window, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Number of intervals a cache read waits for a push
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Delay before re-initializing a stored session
    #[serde(default = "default_resume_delay")]
    pub resume_delay_ms: u64,

    // =========================================================================
    // Message cache
    // =========================================================================
    #[serde(default = "default_message_cache_max")]
    pub message_cache_max: usize,

    #[serde(default = "default_message_cache_age")]
    pub message_cache_age_secs: u64,

    /// Log raw frame payloads
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_endpoint() -> String {
    "ws://padplus.juzibot.com:50051/stream".to_string()
}

fn default_name() -> String {
    "padplus-session".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    500
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_resume_delay() -> u64 {
    500
}

fn default_message_cache_max() -> usize {
    MESSAGE_CACHE_MAX
}

fn default_message_cache_age() -> u64 {
    MESSAGE_CACHE_AGE.as_secs()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl SessionConfig {
    /// Configuration with defaults for everything but the token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: default_endpoint(),
            name: default_name(),
            storage_path: None,
            request_timeout_secs: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
            poll_attempts: default_poll_attempts(),
            resume_delay_ms: default_resume_delay(),
            message_cache_max: default_message_cache_max(),
            message_cache_age_secs: default_message_cache_age(),
            debug_mode: false,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let token = std::env::var("PADPLUS_TOKEN").context(
            "PADPLUS_TOKEN is required: the backend rejects sessions without a valid token",
        )?;

        let mut config = Self::new(token);
        if let Ok(endpoint) = std::env::var("PADPLUS_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(name) = std::env::var("PADPLUS_NAME") {
            config.name = name;
        }
        config.storage_path = std::env::var("PADPLUS_STORAGE_PATH").ok().map(PathBuf::from);
        config.request_timeout_secs =
            env_parse("PADPLUS_REQUEST_TIMEOUT_SECS").unwrap_or(config.request_timeout_secs);
        config.poll_interval_ms =
            env_parse("PADPLUS_POLL_INTERVAL_MS").unwrap_or(config.poll_interval_ms);
        config.poll_attempts = env_parse("PADPLUS_POLL_ATTEMPTS").unwrap_or(config.poll_attempts);
        config.resume_delay_ms =
            env_parse("PADPLUS_RESUME_DELAY_MS").unwrap_or(config.resume_delay_ms);
        config.message_cache_max =
            env_parse("PADPLUS_MESSAGE_CACHE_MAX").unwrap_or(config.message_cache_max);
        config.message_cache_age_secs =
            env_parse("PADPLUS_MESSAGE_CACHE_AGE_SECS").unwrap_or(config.message_cache_age_secs);
        config.debug_mode = std::env::var("DEBUG_MODE").is_ok();

        Ok(config)
    }

    /// Total time a cache read waits for a push before giving up
    pub fn cache_wait(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms) * self.poll_attempts
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn message_cache_age(&self) -> Duration {
        Duration::from_secs(self.message_cache_age_secs)
    }
}
