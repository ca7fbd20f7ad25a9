//! Configuration loading for the tikprobe exporter.
//!
//! A YAML file merged over built-in defaults and `TIKPROBE_`-prefixed
//! environment variables, validated and translated into
//! `tikprobe_core::ExporterConfig`. Top-level keys are case-insensitive,
//! so files written with `USERNAME` / `PING_ADDRESSES` style keys load
//! unchanged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment, Profile, Provider,
    providers::{Env, Format, Serialized, Yaml},
    value::Dict,
};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use tikprobe_api::{DEFAULT_API_PORT, TransportConfig};
use tikprobe_core::{
    ConfigSource, Credentials, DEFAULT_LISTEN_PORT, DEFAULT_MAX_PARALLEL, ExporterConfig,
    Schedule, parse_target_list,
};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Prefix of environment overrides, e.g. `TIKPROBE_LISTEN_PORT`.
pub const ENV_PREFIX: &str = "TIKPROBE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config file is empty: {}", path.display())]
    Empty { path: PathBuf },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── File layout ─────────────────────────────────────────────────────

/// Probe targets, either one comma-joined string or a YAML list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TargetList {
    Joined(String),
    List(Vec<String>),
}

impl Default for TargetList {
    fn default() -> Self {
        Self::Joined(String::new())
    }
}

impl TargetList {
    /// Trimmed, deduplicated targets in first-seen order.
    pub fn resolve(&self) -> Vec<String> {
        match self {
            Self::Joined(raw) => parse_target_list(raw),
            Self::List(items) => parse_target_list(&items.join(",")),
        }
    }
}

/// On-disk configuration, before validation.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(deserialize_with = "scalar_string")]
    pub username: String,
    #[serde(deserialize_with = "scalar_string")]
    pub password: String,
    pub api_port: u16,
    pub listen_port: u16,
    pub ping_addresses: TargetList,
    pub routers: BTreeMap<String, String>,
    pub poll_interval_secs: u64,
    pub reload_interval_secs: u64,
    pub max_parallel_probes: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        let schedule = Schedule::default();
        let transport = TransportConfig::default();
        Self {
            username: "admin".into(),
            password: String::new(),
            api_port: DEFAULT_API_PORT,
            listen_port: DEFAULT_LISTEN_PORT,
            ping_addresses: TargetList::default(),
            routers: BTreeMap::new(),
            poll_interval_secs: schedule.poll_interval.as_secs(),
            reload_interval_secs: schedule.reload_interval.as_secs(),
            max_parallel_probes: DEFAULT_MAX_PARALLEL,
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            request_timeout_secs: transport.request_timeout.as_secs(),
        }
    }
}

impl std::fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_port", &self.api_port)
            .field("listen_port", &self.listen_port)
            .field("ping_addresses", &self.ping_addresses)
            .field("routers", &self.routers)
            .finish_non_exhaustive()
    }
}

/// YAML and env scalars arrive typed; a numeric password is still a
/// password.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Str(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::UInt(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

impl FileConfig {
    /// Validate and convert into the shape the exporter runs on.
    pub fn into_exporter_config(self) -> Result<ExporterConfig, ConfigError> {
        if self.username.trim().is_empty() {
            return Err(invalid("username", "must not be empty"));
        }
        if self.api_port == 0 {
            return Err(invalid("api_port", "must be a non-zero port"));
        }
        if self.listen_port == 0 {
            return Err(invalid("listen_port", "must be a non-zero port"));
        }
        for (field, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("reload_interval_secs", self.reload_interval_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be at least 1 second"));
            }
        }
        if self.max_parallel_probes == 0 {
            return Err(invalid("max_parallel_probes", "must be at least 1"));
        }

        let mut routers = BTreeMap::new();
        for (name, address) in self.routers {
            let name = name.trim().to_owned();
            let address = address.trim().to_owned();
            if name.is_empty() {
                return Err(invalid("routers", "router names must not be empty"));
            }
            if address.is_empty() {
                return Err(invalid("routers", format!("router '{name}' has no address")));
            }
            routers.insert(name, address);
        }

        Ok(ExporterConfig {
            credentials: Credentials::new(self.username, self.password),
            api_port: self.api_port,
            listen_port: self.listen_port,
            targets: self.ping_addresses.resolve(),
            routers,
            schedule: Schedule {
                poll_interval: Duration::from_secs(self.poll_interval_secs),
                reload_interval: Duration::from_secs(self.reload_interval_secs),
                max_parallel: self.max_parallel_probes,
            },
            transport: TransportConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file: an explicit path wins, then `config.yaml` in
/// the working directory, then the platform config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    ProjectDirs::from("io", "tikprobe", "tikprobe")
        .map_or(local, |dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
}

// ── Config loading ──────────────────────────────────────────────────

/// Load, validate and convert the config at `path`.
pub fn load(path: &Path) -> Result<ExporterConfig, ConfigError> {
    load_with_env(path, ENV_PREFIX)
}

fn load_with_env(path: &Path, env_prefix: &str) -> Result<ExporterConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let raw: FileConfig = Figment::new()
        .merge(Serialized::defaults(FileConfig::default()))
        .merge(Serialized::defaults(file_layer(path)?))
        .merge(Env::prefixed(env_prefix))
        .extract()?;
    debug!(path = %path.display(), config = ?raw, "configuration loaded");

    raw.into_exporter_config()
}

/// Top-level keys of the YAML file, lower-cased. Nested keys (router
/// names) keep their case.
///
/// A file without any keys is rejected rather than read as all defaults;
/// editors and deploy tools truncate before rewriting.
fn file_layer(path: &Path) -> Result<Dict, ConfigError> {
    let mut profiles = Figment::from(Yaml::file(path)).data()?;
    let dict = profiles.remove(&Profile::Default).unwrap_or_default();
    if dict.is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(dict
        .into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect())
}

/// Re-reads one config file on every reload.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    env_prefix: String,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_prefix: ENV_PREFIX.to_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    type Error = ConfigError;

    fn load(&self) -> Result<ExporterConfig, ConfigError> {
        load_with_env(&self.path, &self.env_prefix)
    }
}
