//! Nano Banana studio - backend for the Arabic AI photo studio.
//!
//! This binary runs the HTTP API over the studio's persistent store, with
//! the image API and identity provider configured from the environment.

use std::path::PathBuf;

use clap::Parser;
use studio_app::EnvConfig;
use studio_server::{Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use studio_storage::Database;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Nano Banana studio backend
#[derive(Parser, Debug)]
#[command(name = "studio", version, about)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Data directory (database, local state and logs)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory; nothing survives a restart
    #[arg(long, conflicts_with = "data_dir")]
    in_memory: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| Database::default_data_dir().ok())
    }

    fn server_config(&self) -> ServerConfig {
        let config = if self.in_memory {
            ServerConfig::in_memory()
        } else {
            match self.data_dir() {
                Some(dir) => ServerConfig::with_data_dir(dir),
                None => ServerConfig::default(),
            }
        };
        config.with_host(self.host.clone()).with_port(self.port)
    }
}

/// Daily log files under `<data_dir>/logs`, none for an in-memory run.
fn log_files(args: &Args) -> Option<(PathBuf, RollingFileAppender)> {
    if args.in_memory {
        return None;
    }
    let dir = args.data_dir()?.join("logs");
    std::fs::create_dir_all(&dir).ok()?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix("studio")
        .filename_suffix("log")
        .build(&dir)
        .ok()?;
    Some((dir, appender))
}

/// Console logging, mirrored to rolling files when the data dir allows it.
///
/// The returned guard flushes the file writer and must outlive `main`.
fn init_logging(args: &Args) -> Option<WorkerGuard> {
    let level = if args.debug { "debug" } else { args.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("studio={level},warn")));
    let console = fmt::layer().with_writer(std::io::stdout);

    let Some((dir, appender)) = log_files(args) else {
        tracing_subscriber::registry().with(filter).with(console).init();
        tracing::warn!("No log directory, logging to the console only");
        return None;
    };

    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    tracing::info!("Writing logs to {}", dir.display());
    Some(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _log_guard = init_logging(&args);
    tracing::debug!(?args, "Starting Nano Banana studio");

    let env = EnvConfig::from_env();
    let api = env.image_api()?;
    let identity = env.identity_provider()?;

    let server = Server::new(args.server_config(), api, identity).await?;
    tracing::info!("Listening on http://{}", server.addr());

    server.run().await?;
    tracing::info!("Studio stopped");
    Ok(())
}
