//! Process configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. the TOML file named by `GREENRECYCLE_CONFIG` (default `greenrecycle.toml`), if present
//! 3. `DATABASE_URL` and `DB_*` environment variables

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use greenrecycle_ledger::PgConnectOptions;
use greenrecycle_types::LedgerConfig;
use serde::Deserialize;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "GREENRECYCLE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "greenrecycle.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub log_format: LogFormat,
    /// Queue depth of the notification outbox.
    pub notification_queue: Option<usize>,
}

impl NodeConfig {
    /// Load from the configured file and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            Self::from_toml(&raw).with_context(|| format!("parsing {path}"))?
        } else if explicit.is_some() {
            bail!("config file {path} named by {CONFIG_PATH_ENV} does not exist");
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Override database settings from `lookup` (the process environment
    /// in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            self.database.max_connections = v
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS={v}"))?;
        }
        if let Some(v) = lookup("DB_MIN_CONNECTIONS") {
            self.database.min_connections = v
                .parse()
                .with_context(|| format!("DB_MIN_CONNECTIONS={v}"))?;
        }
        if let Some(v) = lookup("DB_ACQUIRE_TIMEOUT") {
            self.database.acquire_timeout_secs = v
                .parse()
                .with_context(|| format!("DB_ACQUIRE_TIMEOUT={v}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            bail!("database url is not set (DATABASE_URL or [database].url)");
        }
        if self.database.min_connections > self.database.max_connections {
            bail!(
                "database min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }
        self.ledger.validate()?;
        Ok(())
    }
}
