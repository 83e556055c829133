// Runtime configuration, read from the environment

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;

pub const DB_PATH_VAR: &str = "FRANCHISE_DB";
pub const CACHE_TTL_VAR: &str = "FRANCHISE_CACHE_TTL_SECS";
pub const BUSY_TIMEOUT_VAR: &str = "FRANCHISE_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// How long loaded results are served from the cache
    pub cache_ttl: Duration,
    /// How long a query waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("franchises.db"),
            cache_ttl: DEFAULT_TTL,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_VAR).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup(CACHE_TTL_VAR) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds, got {:?}", CACHE_TTL_VAR, secs))?;
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = lookup(BUSY_TIMEOUT_VAR) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of milliseconds, got {:?}", BUSY_TIMEOUT_VAR, ms))?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}
