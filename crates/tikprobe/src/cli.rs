//! Clap derive structures for the `tikprobe` binary.

use std::path::{Path, PathBuf};

use clap::Parser;

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "tikprobe.log";

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tikprobe -- ping latency and loss from MikroTik routers, as Prometheus metrics
#[derive(Debug, Parser)]
#[command(
    name = "tikprobe",
    version,
    about = "Export ping latency and loss measured by MikroTik routers",
    long_about = "Logs in to every configured RouterOS device over its API, pings each\n\
        target from every router, and serves the results on /metrics.\n\n\
        The configuration file is re-read periodically; routers, targets and\n\
        credentials can change without a restart."
)]
pub struct Cli {
    /// Configuration file (defaults to ./config.yaml, then the platform config dir)
    #[arg(long, short = 'c', env = "TIKPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port for the metrics endpoint (overrides listen_port)
    #[arg(long, short = 'l', env = "TIKPROBE_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// Log file path
    #[arg(long, default_value = DEFAULT_LOG_FILE, conflicts_with = "no_log_file")]
    pub log_file: PathBuf,

    /// Log to stderr only
    #[arg(long)]
    pub no_log_file: bool,

    /// Emit stderr logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run a single polling cycle, print the metrics and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// The log file to write, unless file logging is disabled.
    pub fn log_file(&self) -> Option<&Path> {
        (!self.no_log_file).then_some(self.log_file.as_path())
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
