use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use strum::{Display, EnumString};

use crate::domain::cache::{CacheConfig, RetryPolicy};
use crate::domain::search::SearchConfig;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub ingest: IngestSettings,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    /// Origin allowed by CORS; any origin when unset
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct IngestSettings {
    /// JSON array of sections indexed at startup and on every refresh
    pub seed_path: PathBuf,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Remote JSON feed of sections, fetched through the resilient cache
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub refresh_interval_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub origin_timeout_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub retry_attempts: u32,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub initial_backoff_ms: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_backoff_ms: u64,
}

impl IngestSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.origin_timeout_secs),
            max_attempts: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

pub fn read_config() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {}", e)))?;
    let config_directory = base_path.join("config");

    let environment = Environment::from_str(
        std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .as_str(),
    )
    .map_err(|e| config::ConfigError::Message(format!("Invalid APP_ENVIRONMENT: {}", e)))?;
    let environment_filename = format!("{}.yaml", environment);

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(
            config_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("HIG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[derive(Display, Debug, EnumString)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "local")]
    Local,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}
