use serde::Deserialize;

use crate::engine::WindowWidth;
use crate::sample_repo::MAX_RETENTION_DAYS;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    /// Buffered ingest items that trigger a write.
    pub flush_rate: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// How often the writer logs ingest counters at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    3
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_prune_interval_secs() -> u64 {
    3600
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Default window width when a query does not pass `windowSecs`.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Scans with at least this many samples are reduced in parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_window_secs() -> u64 {
    10
}

fn default_parallel_threshold() -> usize {
    100_000
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl AggregationConfig {
    pub fn window(&self) -> anyhow::Result<WindowWidth> {
        Ok(WindowWidth::from_secs(self.window_secs)?)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.flush_rate > 0,
            "database.flush_rate must be > 0, got {}",
            self.database.flush_rate
        );
        anyhow::ensure!(
            self.database.retention_days > 0 && self.database.retention_days <= MAX_RETENTION_DAYS,
            "database.retention_days must be between 1 and {}, got {}",
            MAX_RETENTION_DAYS,
            self.database.retention_days
        );
        anyhow::ensure!(
            self.database.flush_interval_secs > 0,
            "database.flush_interval_secs must be > 0, got {}",
            self.database.flush_interval_secs
        );
        anyhow::ensure!(
            self.database.prune_interval_secs > 0,
            "database.prune_interval_secs must be > 0, got {}",
            self.database.prune_interval_secs
        );
        anyhow::ensure!(
            self.database.stats_log_interval_secs > 0,
            "database.stats_log_interval_secs must be > 0, got {}",
            self.database.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.aggregation.parallel_threshold > 0,
            "aggregation.parallel_threshold must be > 0, got {}",
            self.aggregation.parallel_threshold
        );
        self.aggregation
            .window()
            .map_err(|e| anyhow::anyhow!("aggregation.window_secs: {e}"))?;
        Ok(())
    }
}
