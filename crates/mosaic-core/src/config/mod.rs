//! Runtime configuration for sync.
//!
//! Both structs load from environment variables through a lookup closure so
//! tests can feed a map instead of mutating the process environment.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{is_http_url, non_blank};
use crate::{Error, Result};

const ENV_MAX_CONCURRENCY: &str = "MOSAIC_SYNC_MAX_CONCURRENCY";
const ENV_TIMEOUT_SECS: &str = "MOSAIC_SYNC_TIMEOUT_SECS";
const ENV_MAX_ATTEMPTS: &str = "MOSAIC_SYNC_MAX_ATTEMPTS";
const ENV_BASE_BACKOFF_SECS: &str = "MOSAIC_SYNC_BASE_BACKOFF_SECS";
const ENV_MAX_BACKOFF_SECS: &str = "MOSAIC_SYNC_MAX_BACKOFF_SECS";

const ENV_SUPABASE_URL: &str = "MOSAIC_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "MOSAIC_SUPABASE_ANON_KEY";
const ENV_ACCESS_TOKEN: &str = "MOSAIC_ACCESS_TOKEN";

/// Tuning for ledger replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Lanes replayed at the same time
    pub max_concurrency: usize,
    /// Per-request deadline; expiry counts as a transient failure
    pub request_timeout: Duration,
    /// Delay after the first transient failure, doubled per attempt
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Failed attempts before an entry is parked
    pub max_attempts: u32,
    /// How often the background worker drains without a trigger
    pub poll_interval: Duration,
    /// Ledger entries read per drain
    pub batch_size: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            request_timeout: Duration::from_secs(10),
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
            max_attempts: 5,
            poll_interval: Duration::from_secs(60),
            batch_size: 256,
        }
    }
}

impl ReconcilerConfig {
    /// Defaults overridden by any `MOSAIC_SYNC_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = parse_number::<usize>(&lookup, ENV_MAX_CONCURRENCY)? {
            config.max_concurrency = value;
        }
        if let Some(value) = parse_number::<u64>(&lookup, ENV_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(value);
        }
        if let Some(value) = parse_number::<u32>(&lookup, ENV_MAX_ATTEMPTS)? {
            config.max_attempts = value;
        }
        if let Some(value) = parse_number::<u64>(&lookup, ENV_BASE_BACKOFF_SECS)? {
            config.base_backoff = Duration::from_secs(value);
        }
        if let Some(value) = parse_number::<u64>(&lookup, ENV_MAX_BACKOFF_SECS)? {
            config.max_backoff = Duration::from_secs(value);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::InvalidInput(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidInput("batch_size must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.base_backoff > self.max_backoff {
            return Err(Error::InvalidInput(
                "base_backoff must not exceed max_backoff".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = non_blank(lookup(key)) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| Error::InvalidInput(format!("{key} must be a non-negative integer, got '{raw}'")))
}

/// Credentials for the hosted backend.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project base URL, without a trailing slash
    pub url: String,
    /// Public anon key sent as `apikey`
    pub anon_key: String,
    /// User access token sent as the bearer credential
    pub access_token: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl RemoteConfig {
    /// Load remote credentials from environment variables.
    ///
    /// Returns `Ok(None)` when none are set (local-only mode).
    /// Returns an error when only some of them are provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_remote_config(|key| env::var(key).ok())
    }
}

fn parse_remote_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<RemoteConfig>> {
    let url = non_blank(lookup(ENV_SUPABASE_URL));
    let anon_key = non_blank(lookup(ENV_SUPABASE_ANON_KEY));
    let access_token = non_blank(lookup(ENV_ACCESS_TOKEN));

    let (url, anon_key, access_token) = match (url, anon_key, access_token) {
        (None, None, None) => return Ok(None),
        (Some(url), Some(anon_key), Some(access_token)) => (url, anon_key, access_token),
        (url, anon_key, access_token) => {
            let mut missing = Vec::new();
            if url.is_none() {
                missing.push(ENV_SUPABASE_URL);
            }
            if anon_key.is_none() {
                missing.push(ENV_SUPABASE_ANON_KEY);
            }
            if access_token.is_none() {
                missing.push(ENV_ACCESS_TOKEN);
            }
            return Err(Error::InvalidInput(format!(
                "Remote configuration is incomplete. Missing: {}",
                missing.join(", ")
            )));
        }
    };

    if !is_http_url(&url) {
        return Err(Error::InvalidInput(format!(
            "{ENV_SUPABASE_URL} must start with http:// or https://"
        )));
    }

    Ok(Some(RemoteConfig {
        url: url.trim_end_matches('/').to_string(),
        anon_key,
        access_token,
    }))
}
