//! `tikprobe`: Prometheus exporter for ping latency and loss measured by
//! MikroTik routers.
//!
//! Entry point: CLI parsing, tracing setup, configuration loading, the
//! metrics server and the polling loop. Ctrl-C or SIGTERM stops the loop
//! between cycles, closes every router session and drains the server.

mod cli;
mod error;
mod metrics;
mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tikprobe_config::FileConfigSource;
use tikprobe_core::{Exporter, RouterOsConnector};

use crate::cli::Cli;
use crate::error::CliError;
use crate::metrics::PrometheusSink;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Hold the guard until exit so buffered file logs are flushed.
    let guard = match init_tracing(&cli) {
        Ok(guard) => guard,
        Err(err) => exit_with(err),
    };

    let result = run(cli).await;
    drop(guard);
    if let Err(err) = result {
        exit_with(err);
    }
}

fn exit_with(err: CliError) -> ! {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) -> Result<Option<WorkerGuard>, CliError> {
    let level = cli.log_level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,tikprobe={level},tikprobe_core={level},tikprobe_api={level},tikprobe_config={level}"
        ))
    });

    let stderr_layer = if cli.log_json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let (file_layer, guard) = match cli.log_file() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(cli::DEFAULT_LOG_FILE);
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(dir)
                .map_err(|e| CliError::LogFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let path = tikprobe_config::resolve_config_path(cli.config.as_deref());
    let mut config =
        tikprobe_config::load(&path).map_err(|e| CliError::from_config(e, path.clone()))?;
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    info!(
        path = %path.display(),
        routers = config.routers.len(),
        targets = config.targets.len(),
        "configuration loaded"
    );

    let sink = Arc::new(PrometheusSink::new()?);
    let connector = Arc::new(RouterOsConnector::new(config.transport));
    let source = FileConfigSource::new(path);

    if cli.once {
        let mut exporter = Exporter::start(&config, source, connector, Arc::clone(&sink)).await;
        let report = exporter.run_once().await;
        exporter.shutdown().await;
        info!(
            up = report.up.len(),
            down = report.down.len(),
            failed = report.failed.len(),
            "single cycle finished"
        );
        print!("{}", sink.render()?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind { addr, source })?;
    let server = tokio::spawn(server::serve(listener, Arc::clone(&sink), cancel.clone()));
    info!(%addr, "serving metrics on /metrics");

    let mut exporter = Exporter::start(&config, source, connector, sink).await;
    exporter.run(&cancel).await;

    info!("shutting down");
    cancel.cancel();
    exporter.shutdown().await;
    match server.await {
        Ok(result) => result.map_err(CliError::Server),
        Err(e) => {
            error!(error = %e, "metrics server task failed");
            Ok(())
        }
    }
}

/// Cancel `token` on Ctrl-C or, on Unix, SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
    token.cancel();
}
