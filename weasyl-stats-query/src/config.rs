use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use weasyl_stats_core::{AnalyticsConfig, PostgresConfig};

/// Configuration for the stats query service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Backing database connection
    pub postgres: PostgresConfig,

    /// Piwik reporting API
    pub analytics: AnalyticsConfig,

    /// Caching and producer settings
    pub query: QuerySettings,

    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

/// Caching and producer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// How long a produced result is served from cache
    pub cache_ttl_seconds: u64,

    /// Upper bound on one producer run
    pub producer_timeout_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            postgres: PostgresConfig::default(),
            analytics: AnalyticsConfig::default(),
            query: QuerySettings::default(),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 86_400,
            producer_timeout_ms: 120_000,
        }
    }
}

impl StatsConfig {
    /// Load configuration from an optional file, then environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a YAML (or JSON) file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply `WEASYL_STATS_*` overrides looked up through `var`
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = var("WEASYL_STATS_BIND_ADDRESS") {
            self.bind_address = bind_addr;
        }

        if let Some(host) = var("WEASYL_STATS_PG_HOST") {
            self.postgres.host = host;
        }

        if let Some(port) = var("WEASYL_STATS_PG_PORT") {
            self.postgres.port = parse_override("WEASYL_STATS_PG_PORT", &port)?;
        }

        if let Some(dbname) = var("WEASYL_STATS_PG_DBNAME") {
            self.postgres.dbname = dbname;
        }

        if let Some(user) = var("WEASYL_STATS_PG_USER") {
            self.postgres.user = user;
        }

        if let Some(password) = var("WEASYL_STATS_PG_PASSWORD") {
            self.postgres.password = Some(password);
        }

        if let Some(base_url) = var("WEASYL_STATS_PIWIK_URL") {
            self.analytics.base_url = base_url;
        }

        if let Some(token) = var("WEASYL_STATS_PIWIK_TOKEN") {
            self.analytics.token = token;
        }

        if let Some(ttl) = var("WEASYL_STATS_CACHE_TTL_SECONDS") {
            self.query.cache_ttl_seconds = parse_override("WEASYL_STATS_CACHE_TTL_SECONDS", &ttl)?;
        }

        if let Some(timeout) = var("WEASYL_STATS_PRODUCER_TIMEOUT_MS") {
            self.query.producer_timeout_ms =
                parse_override("WEASYL_STATS_PRODUCER_TIMEOUT_MS", &timeout)?;
        }

        if let Some(static_dir) = var("WEASYL_STATS_STATIC_DIR") {
            self.static_dir = PathBuf::from(static_dir);
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.postgres.host.is_empty() {
            return Err(anyhow::anyhow!("Database host cannot be empty"));
        }

        if self.postgres.dbname.is_empty() {
            return Err(anyhow::anyhow!("Database name cannot be empty"));
        }

        if self.postgres.max_connections == 0 {
            return Err(anyhow::anyhow!("Max connections must be greater than 0"));
        }

        if self.analytics.base_url.is_empty() {
            return Err(anyhow::anyhow!("Analytics base URL cannot be empty"));
        }

        if self.query.cache_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("Cache TTL must be greater than 0"));
        }

        if self.query.producer_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Producer timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Get the cache TTL as a Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.query.cache_ttl_seconds)
    }

    /// Get the producer timeout as a Duration
    pub fn producer_timeout(&self) -> Duration {
        Duration::from_millis(self.query.producer_timeout_ms)
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid {}: {}", key, value))
}
