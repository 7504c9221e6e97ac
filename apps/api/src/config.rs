use std::time::Duration;

use anyhow::{Context, Result};

use crate::reconcile::import::DEFAULT_CHUNK_SIZE;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub import_chunk_size: usize,
    /// Refuse the best-effort insert path when `attendees.submission_id` is not unique.
    pub require_unique_submission_id: bool,
    pub teammate_lookup_timeout: Duration,
    pub teammate_throttle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let database_url = require_env("DATABASE_URL")?;
        Self::with_database_url(database_url)
    }

    /// Everything except the connection string, read from the environment with defaults.
    pub fn with_database_url(database_url: String) -> Result<Self> {
        Ok(Config {
            database_url,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            import_chunk_size: parse_env("IMPORT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)
                .context("IMPORT_CHUNK_SIZE must be a positive integer")?
                .max(1),
            require_unique_submission_id: parse_flag("REQUIRE_UNIQUE_SUBMISSION_ID"),
            teammate_lookup_timeout: Duration::from_millis(
                parse_env("TEAMMATE_LOOKUP_TIMEOUT_MS", 5000)
                    .context("TEAMMATE_LOOKUP_TIMEOUT_MS must be milliseconds")?,
            ),
            teammate_throttle: Duration::from_millis(
                parse_env("TEAMMATE_THROTTLE_MS", 100)
                    .context("TEAMMATE_THROTTLE_MS must be milliseconds")?,
            ),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().parse::<T>()?),
        _ => Ok(default),
    }
}

fn parse_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
