use crate::cli::command::RunArgs;
use crate::operations::heartbeat::service::DEFAULT_HEARTBEAT_INTERVAL;
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub(crate) const DEFAULT_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LEDGER_MAX_RETRIES: u32 = 3;
const IDENTITY_FILENAME: &str = "host_identity.json";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    #[default]
    Docker,
    Simulated,
}

/// Settings accepted from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) resource_id: Option<u64>,
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) heartbeat_interval_secs: Option<u64>,
    pub(crate) ledger_url: Option<String>,
    pub(crate) ledger_api_key: Option<String>,
    pub(crate) identity_path: Option<PathBuf>,
    pub(crate) runner: Option<RunnerKind>,
    pub(crate) price_per_hour: Option<u64>,
    pub(crate) ledger_timeout_secs: Option<u64>,
    pub(crate) ledger_max_retries: Option<u32>,
}

impl FileConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved agent configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AgentConfig {
    pub(crate) resource_id: u64,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) ledger_url: Url,
    pub(crate) ledger_api_key: String,
    pub(crate) identity_path: PathBuf,
    pub(crate) runner: RunnerKind,
    pub(crate) price_per_hour: Option<u64>,
    pub(crate) ledger_timeout: Duration,
    pub(crate) ledger_max_retries: u32,
}

impl AgentConfig {
    pub(crate) fn load(args: &RunArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file, |key| std::env::var(key).ok())
    }

    /// Merges sources with precedence CLI > environment > file > defaults.
    pub(crate) fn resolve(
        args: &RunArgs,
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env_resource_id = env("RESOURCE_ID")
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    field: "RESOURCE_ID",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let resource_id = args
            .resource_id
            .or(env_resource_id)
            .or(file.resource_id)
            .ok_or(ConfigError::Missing("resource id"))?;
        if resource_id == 0 {
            return Err(ConfigError::Invalid {
                field: "resource id",
                reason: "must be non-zero".to_string(),
            });
        }

        let raw_ledger_url = args
            .ledger_url
            .clone()
            .or_else(|| env("LEDGER_URL"))
            .or(file.ledger_url)
            .ok_or(ConfigError::Missing("ledger url"))?;
        let ledger_url = Url::parse(&raw_ledger_url).map_err(|e| ConfigError::Invalid {
            field: "ledger url",
            reason: e.to_string(),
        })?;

        let ledger_api_key = args
            .ledger_api_key
            .clone()
            .or_else(|| env("LEDGER_API_KEY"))
            .or(file.ledger_api_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("ledger api key"))?;

        let heartbeat_secs = args
            .heartbeat_interval_secs
            .or(file.heartbeat_interval_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL.as_secs());
        if heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat interval",
                reason: "must be greater than zero".to_string(),
            });
        }

        let identity_path = args
            .identity_path
            .clone()
            .or(file.identity_path)
            .unwrap_or_else(default_identity_path);

        Ok(Self {
            resource_id,
            host: args
                .host
                .clone()
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            ledger_url,
            ledger_api_key,
            identity_path,
            runner: args.runner.or(file.runner).unwrap_or_default(),
            price_per_hour: args.price_per_hour.or(file.price_per_hour),
            ledger_timeout: args
                .ledger_timeout_secs
                .or(file.ledger_timeout_secs)
                .map_or(DEFAULT_LEDGER_TIMEOUT, Duration::from_secs),
            ledger_max_retries: args
                .ledger_max_retries
                .or(file.ledger_max_retries)
                .unwrap_or(DEFAULT_LEDGER_MAX_RETRIES),
        })
    }
}

pub(crate) fn default_identity_path() -> PathBuf {
    ProjectDirs::from("com", "flux", "worker")
        .map(|dirs| dirs.data_local_dir().join(IDENTITY_FILENAME))
        .unwrap_or_else(|| PathBuf::from("config").join(IDENTITY_FILENAME))
}
