//! Deployment settings read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use boursomatic_core::ingest::DEFAULT_MAX_CONSECUTIVE_STORE_FAILURES;
use boursomatic_market_data::registry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};

const DEFAULT_DB_PATH: &str = "./data/boursomatic.db";
const DEFAULT_UNIVERSE_FILE: &str = "config/universe.csv";
const DEFAULT_CHECKPOINT_DIR: &str = ".";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: String,
    pub universe_file: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub http_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub max_store_failures: u32,
}

impl Config {
    /// Read `BOURSO_*` variables, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let base_ms = parse(&lookup, "BOURSO_RETRY_BASE_MS", DEFAULT_BASE_DELAY.as_millis() as u64)?;
        let max_ms = parse(&lookup, "BOURSO_RETRY_MAX_MS", DEFAULT_MAX_DELAY.as_millis() as u64)?;

        Ok(Self {
            db_path: text("BOURSO_DB_PATH", DEFAULT_DB_PATH),
            universe_file: text("BOURSO_UNIVERSE_FILE", DEFAULT_UNIVERSE_FILE).into(),
            checkpoint_dir: text("BOURSO_CHECKPOINT_DIR", DEFAULT_CHECKPOINT_DIR).into(),
            http_timeout: Duration::from_secs(parse(
                &lookup,
                "BOURSO_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            retry_attempts: parse(&lookup, "BOURSO_RETRY_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            retry_base_delay: Duration::from_millis(base_ms),
            retry_max_delay: Duration::from_millis(max_ms.max(base_ms)),
            max_store_failures: parse(
                &lookup,
                "BOURSO_MAX_STORE_FAILURES",
                DEFAULT_MAX_CONSECUTIVE_STORE_FAILURES,
            )?,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
