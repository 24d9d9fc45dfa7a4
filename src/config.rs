use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    pub labels: LabelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for graceful HTTP shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9099,
            shutdown_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Pacing of each container's stats read loop.
    pub read_interval_ms: u64,
    /// Minimum time between two discovery passes.
    pub refresh_interval_ms: u64,
    /// How often the discovery loop wakes up to check for shutdown and due passes.
    pub refresh_tick_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: 1000,
            refresh_interval_ms: 2000,
            refresh_tick_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// Container labels exported as metric labels.
    pub scrape: Vec<String>,
    /// Docker `label` filters (`key` or `key=value`) applied to discovery.
    pub filter: Vec<String>,
}

/// Comma-separated list, e.g. `DOCKER_STATS_LABELS_SCRAPE=com.example.team,env`.
pub fn parse_scrape_labels(s: &str) -> Vec<String> {
    s.trim()
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Space-separated list, e.g. `DOCKER_STATS_FILTER_LABELS="monitor=true env=prod"`.
pub fn parse_filter_labels(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

impl AppConfig {
    /// Load from `CONFIG_FILE` (default `config.toml`), then apply env overrides.
    /// A missing default file means built-in defaults; a missing `CONFIG_FILE` is an error.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::read_file(Path::new(&path))?,
            Err(_) => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                Ok(s) => Self::parse(&s)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(e) => return Err(e.into()),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate one file, without env overrides.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config = Self::parse(s)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parsing config file {}", path.display()))
    }

    fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Override from `DOCKER_STATS_LABELS_SCRAPE`, `DOCKER_STATS_FILTER_LABELS`
    /// and `DOCKER_STATS_PORT` when set.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("DOCKER_STATS_LABELS_SCRAPE") {
            self.labels.scrape = parse_scrape_labels(&v);
        }
        if let Some(v) = var("DOCKER_STATS_FILTER_LABELS") {
            self.labels.filter = parse_filter_labels(&v);
        }
        if let Some(v) = var("DOCKER_STATS_PORT") {
            match v.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %v, error = %e, "Ignoring invalid DOCKER_STATS_PORT"),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.server.shutdown_timeout_secs > 0,
            "server.shutdown_timeout_secs must be > 0, got {}",
            self.server.shutdown_timeout_secs
        );
        anyhow::ensure!(
            self.monitoring.read_interval_ms > 0,
            "monitoring.read_interval_ms must be > 0, got {}",
            self.monitoring.read_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.refresh_interval_ms > 0,
            "monitoring.refresh_interval_ms must be > 0, got {}",
            self.monitoring.refresh_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.refresh_tick_ms > 0,
            "monitoring.refresh_tick_ms must be > 0, got {}",
            self.monitoring.refresh_tick_ms
        );
        Ok(())
    }
}
