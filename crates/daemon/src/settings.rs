//! Daemon settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `BGSYNC__SECTION__KEY` environment variables.

use anyhow::{bail, Context, Result};
use bgsync_api_http::HttpServerConfig;
use bgsync_core::application::worker::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRY_DELAY_MS, DEFAULT_RETENTION,
    DEFAULT_RETENTION_INTERVAL, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_SYNC_DELAY,
};
use bgsync_core::domain::QueueConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Names the TOML file to read; unset means `bgsync.toml` in the working dir
pub const CONFIG_PATH_ENV: &str = "BGSYNC_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "bgsync.toml";
const ENV_PREFIX: &str = "BGSYNC";
const ENV_SEPARATOR: &str = "__";

const MEMORY_URL: &str = "memory://";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub queue: QueueSettings,
    pub worker: WorkerSettings,
    pub sync: SyncSettings,
    pub retention: RetentionSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// `memory://` or `sqlite://<path>`
    pub url: String,
    pub name: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
            name: bgsync_core::domain::DEFAULT_QUEUE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub max_attempts: i32,
    pub retry_base_delay_ms: i64,
    pub max_retry_delay_ms: i64,
    pub shutdown_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: QueueConfig::default().concurrency,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_SYNC_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub finished_job_hours: u64,
    pub interval_secs: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            finished_job_hours: DEFAULT_RETENTION.as_secs() / 3600,
            interval_secs: DEFAULT_RETENTION_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Also write daily-rolling log files here when set
    pub dir: Option<PathBuf>,
}

/// Where jobs are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    Memory,
    Sqlite { url: String },
}

impl QueueBackend {
    /// Parse `memory://`, `sqlite://<path>` or `sqlite:<path>`; `~` in the
    /// path is expanded
    pub fn parse(url: &str) -> Result<Self> {
        if url == MEMORY_URL {
            return Ok(QueueBackend::Memory);
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .with_context(|| {
                format!("Unsupported queue url '{}' (expected memory:// or sqlite://<path>)", url)
            })?;
        if path.is_empty() {
            bail!("Queue url '{}' has no database path", url);
        }
        let expanded = shellexpand::tilde(path);
        Ok(QueueBackend::Sqlite {
            url: format!("sqlite://{}", expanded),
        })
    }
}

impl Settings {
    /// Load from `BGSYNC_CONFIG` (or `bgsync.toml`) and the process environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let required = path.is_some();
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some((path, required)), None)
    }

    /// Build settings from an optional file and an explicit environment map
    ///
    /// `env: None` reads the process environment.
    pub fn from_sources(
        file: Option<(PathBuf, bool)>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some((path, required)) = file {
            builder = builder.add_source(File::from(path).required(required));
        }
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env.map(|vars| vars.into_iter().collect()));

        let settings: Settings = builder
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.worker.concurrency == 0 {
            bail!("worker.concurrency must be at least 1");
        }
        if self.worker.max_attempts < 1 {
            bail!("worker.max_attempts must be at least 1");
        }
        if self.worker.retry_base_delay_ms < 0 {
            bail!("worker.retry_base_delay_ms must not be negative");
        }
        if self.worker.max_retry_delay_ms < 0 {
            bail!("worker.max_retry_delay_ms must not be negative");
        }
        if self.retention.interval_secs == 0 {
            bail!("retention.interval_secs must be at least 1");
        }
        if self.queue.name.trim().is_empty() {
            bail!("queue.name must not be empty");
        }
        self.queue_backend()?;
        Ok(())
    }

    pub fn queue_backend(&self) -> Result<QueueBackend> {
        QueueBackend::parse(&self.queue.url)
    }

    /// Queue to consume and number of worker loops on it
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.queue.name.clone(), self.worker.concurrency)
    }

    pub fn http_server_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http.host.clone(),
            port: self.http.port,
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
        }
    }

    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync.delay_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention.finished_job_hours * 3600)
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention.interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(None, env(&[])).unwrap();

        assert_eq!(settings.http.host, "127.0.0.1");
        assert_eq!(settings.http.port, 8000);
        assert_eq!(settings.queue_config(), QueueConfig::default());
        assert_eq!(settings.queue_backend().unwrap(), QueueBackend::Memory);
        assert_eq!(settings.worker.concurrency, 1);
        assert_eq!(settings.worker.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(settings.worker.retry_base_delay_ms, DEFAULT_RETRY_BASE_DELAY_MS);
        assert_eq!(settings.worker.max_retry_delay_ms, DEFAULT_MAX_RETRY_DELAY_MS);
        assert_eq!(settings.shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(settings.sync_delay(), DEFAULT_SYNC_DELAY);
        assert_eq!(settings.retention(), DEFAULT_RETENTION);
        assert_eq!(settings.retention_interval(), DEFAULT_RETENTION_INTERVAL);
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert!(settings.log.dir.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_sources(
            None,
            env(&[
                ("BGSYNC__HTTP__PORT", "9090"),
                ("BGSYNC__WORKER__CONCURRENCY", "4"),
                ("BGSYNC__SYNC__DELAY_MS", "250"),
                ("BGSYNC__LOG__FORMAT", "json"),
                ("BGSYNC__QUEUE__URL", "sqlite:///var/lib/bgsync/queue.db"),
                ("UNRELATED", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.http.port, 9090);
        assert_eq!(settings.worker.concurrency, 4);
        assert_eq!(settings.sync_delay(), Duration::from_millis(250));
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(
            settings.queue_backend().unwrap(),
            QueueBackend::Sqlite {
                url: "sqlite:///var/lib/bgsync/queue.db".to_string()
            }
        );
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgsync.toml");
        std::fs::write(
            &path,
            "[http]\nport = 7000\n\n[worker]\nmax_attempts = 3\n\n[sync]\ndelay_ms = 10\n",
        )
        .unwrap();

        let settings = Settings::from_sources(
            Some((path, true)),
            env(&[("BGSYNC__SYNC__DELAY_MS", "20")]),
        )
        .unwrap();

        assert_eq!(settings.http.port, 7000);
        assert_eq!(settings.worker.max_attempts, 3);
        assert_eq!(settings.sync.delay_ms, 20);
    }

    #[test]
    fn test_missing_optional_file_is_fine() {
        let settings = Settings::from_sources(
            Some((PathBuf::from("/nonexistent/bgsync.toml"), false)),
            env(&[]),
        );
        assert!(settings.is_ok());

        let required = Settings::from_sources(
            Some((PathBuf::from("/nonexistent/bgsync.toml"), true)),
            env(&[]),
        );
        assert!(required.is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for pairs in [
            [("BGSYNC__WORKER__CONCURRENCY", "0")],
            [("BGSYNC__WORKER__MAX_ATTEMPTS", "0")],
            [("BGSYNC__WORKER__MAX_RETRY_DELAY_MS", "-1")],
            [("BGSYNC__RETENTION__INTERVAL_SECS", "0")],
            [("BGSYNC__QUEUE__URL", "redis://localhost")],
            [("BGSYNC__LOG__FORMAT", "xml")],
            [("BGSYNC__HTTP__PORT", "not-a-port")],
        ] {
            assert!(
                Settings::from_sources(None, env(&pairs)).is_err(),
                "expected {:?} to be rejected",
                pairs
            );
        }
    }

    #[test]
    fn test_queue_url_parsing() {
        assert_eq!(QueueBackend::parse("memory://").unwrap(), QueueBackend::Memory);
        assert_eq!(
            QueueBackend::parse("sqlite:queue.db").unwrap(),
            QueueBackend::Sqlite {
                url: "sqlite://queue.db".to_string()
            }
        );
        assert!(QueueBackend::parse("sqlite://").is_err());
        assert!(QueueBackend::parse("").is_err());

        if std::env::var_os("HOME").is_some() {
            match QueueBackend::parse("sqlite://~/bgsync/queue.db").unwrap() {
                QueueBackend::Sqlite { url } => assert!(!url.contains('~')),
                other => panic!("unexpected backend {:?}", other),
            }
        }
    }
}
