//! `transcoder-worker` entry point.
//!
//! Without a subcommand the transcoding daemon runs until SIGINT/SIGTERM.
//! `list`, `delete` and `clear-db` are one-shot maintenance commands.
//! Configuration comes from the environment, see [`WorkerConfig::from_env`].

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcoder_db::DbPool;
use transcoder_worker::cli::{Cli, Command};
use transcoder_worker::config::WorkerConfig;
use transcoder_worker::error::WorkerResult;
use transcoder_worker::metrics::TranscodeMetrics;
use transcoder_worker::server::{self, ServerState};
use transcoder_worker::skip::FfprobeProber;
use transcoder_worker::worker::{self, Worker};
use transcoder_worker::{commands, shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcoder_worker=info,transcoder_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    match execute(cli.subcommand(), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "transcoder-worker failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command, config: WorkerConfig) -> WorkerResult<()> {
    match command {
        Command::Run => run_daemon(config).await,
        Command::List => {
            commands::list(&config.input_dir, &mut io::stdout())?;
            Ok(())
        }
        Command::Delete(args) => {
            commands::delete(
                &config.input_dir,
                args.yes,
                &mut io::stdin().lock(),
                &mut io::stdout(),
            )?;
            Ok(())
        }
        Command::ClearDb(args) => {
            let pool = open_skip_db(&config).await?;
            let result = commands::clear_db(
                &pool,
                &config.skip_db_path,
                args.yes,
                &mut io::stdin().lock(),
                &mut io::stdout(),
            )
            .await;
            pool.close().await;
            result.map(|_| ())
        }
    }
}

async fn open_skip_db(config: &WorkerConfig) -> WorkerResult<DbPool> {
    let pool = transcoder_db::create_pool(&config.skip_db_path).await?;
    transcoder_db::run_migrations(&pool).await?;
    tracing::info!(path = %config.skip_db_path.display(), "Skip tracker ready");
    Ok(pool)
}

async fn run_daemon(config: WorkerConfig) -> WorkerResult<()> {
    tracing::info!(
        input_dir = %config.input_dir.display(),
        render_device = %config.render_device.display(),
        subtitle_limit = config.subtitle_limit,
        jellyfin = config.jellyfin_enabled(),
        "Starting transcoder",
    );

    let cancel = CancellationToken::new();
    let signal_handle = shutdown::cancel_on_signal(cancel.clone());

    worker::preflight(&config).await?;
    tracing::info!("VAAPI render device and FFmpeg are available");

    let pool = open_skip_db(&config).await?;
    let metrics = Arc::new(TranscodeMetrics::new());

    let server_handle = match config.metrics_port() {
        Some(port) => {
            let state = ServerState {
                metrics: Arc::clone(&metrics),
                pool: pool.clone(),
            };
            Some(server::spawn(port, state, cancel.clone()).await?)
        }
        None => {
            tracing::info!("Metrics server disabled (METRICS_PORT <= 0)");
            None
        }
    };

    let worker = Worker::new(config, pool.clone(), metrics, FfprobeProber, cancel.clone())?;
    worker.run().await;

    cancel.cancel();
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }
    signal_handle.abort();
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}
