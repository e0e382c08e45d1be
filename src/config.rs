use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sync::Consistency;

pub const DEFAULT_API_BASE_URL: &str = "https://property-management-server-ln36.onrender.com/api";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Where persisted blobs and the token are kept
    pub state_dir: PathBuf,
    /// `None` leaves the transport default in place
    pub request_timeout: Option<Duration>,
    pub property_stale_after: Duration,
    pub session_stale_after: Duration,
    pub consistency: Consistency,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            state_dir: PathBuf::from(".property-desk"),
            request_timeout: None,
            property_stale_after: Duration::from_secs(5 * 60),
            session_stale_after: Duration::from_secs(10 * 60),
            consistency: Consistency::LastWriteWins,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Read `.env` (if any) and the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |key: &str| -> Result<Option<Duration>> {
            lookup(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .with_context(|| format!("{key} must be a whole number of seconds"))
                })
                .transpose()
        };

        let consistency = match lookup("FETCH_CONSISTENCY") {
            Some(v) => Consistency::from_str(&v).map_err(anyhow::Error::msg)?,
            None => defaults.consistency,
        };

        Ok(Self {
            api_base_url: lookup("API_BASE_URL").unwrap_or(defaults.api_base_url),
            state_dir: lookup("STATE_DIR").map(PathBuf::from).unwrap_or(defaults.state_dir),
            request_timeout: secs("REQUEST_TIMEOUT_SECS")?,
            property_stale_after: secs("PROPERTY_STALE_SECS")?.unwrap_or(defaults.property_stale_after),
            session_stale_after: secs("SESSION_STALE_SECS")?.unwrap_or(defaults.session_stale_after),
            consistency,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}
