//! Startup error types with miette diagnostics.
//!
//! Only startup can fail: once the exporter loop runs, every device and
//! reload failure is logged and survived.

use std::net::SocketAddr;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use tikprobe_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {}", path.display())]
    #[diagnostic(
        code(tikprobe::no_config),
        help(
            "Create config.yaml in the working directory or pass --config <path>.\n\
             Minimal example:\n  \
             username: admin\n  \
             password: secret\n  \
             ping_addresses: 8.8.8.8,1.1.1.1\n  \
             routers:\n    \
             office: 192.168.88.1"
        )
    )]
    NoConfig { path: PathBuf },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tikprobe::validation))]
    Validation { field: String, reason: String },

    #[error("Could not load configuration from {}", path.display())]
    #[diagnostic(
        code(tikprobe::config),
        help("Check the YAML syntax and the TIKPROBE_* environment variables.")
    )]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    // ── Serving ──────────────────────────────────────────────────────
    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(tikprobe::bind),
        help("Is another exporter already running? Change listen_port or pass --listen-port.")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Metrics server failed")]
    #[diagnostic(code(tikprobe::server))]
    Server(#[source] std::io::Error),

    #[error("Metrics registry error: {0}")]
    #[diagnostic(code(tikprobe::metrics))]
    Metrics(#[from] prometheus::Error),

    // ── Logging ──────────────────────────────────────────────────────
    #[error("Cannot open log file {}: {reason}", path.display())]
    #[diagnostic(
        code(tikprobe::log_file),
        help("Pass --log-file with a writable path, or --no-log-file.")
    )]
    LogFile { path: PathBuf, reason: String },
}

impl CliError {
    /// Translate a config loading failure for `path`.
    pub fn from_config(err: ConfigError, path: PathBuf) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig { path },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            source @ (ConfigError::Empty { .. } | ConfigError::Figment(_)) => {
                Self::Config { path, source }
            }
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::Bind { .. } => exit_code::CONNECTION,
            Self::Server(_) | Self::Metrics(_) | Self::LogFile { .. } => exit_code::GENERAL,
        }
    }
}
