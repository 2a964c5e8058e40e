use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use clipvault::api::router::{self, AppState};
use clipvault::core::auth::AuthProvider;
use clipvault::core::config::AppConfig;
use clipvault::core::shutdown::{ShutdownCoordinator, SHUTDOWN_TIMEOUT_SECS};
use clipvault::ingest::pipeline::IngestPipeline;
use clipvault::ingest::probe::FfprobeProber;
use clipvault::ingest::transcode::FfmpegRemuxer;
use clipvault::observability::metrics as obs_metrics;
use clipvault::records::{InMemoryVideoStore, VideoStore};
use clipvault::storage::memory::InMemoryMediaStore;
use clipvault::storage::s3::S3MediaStore;
use clipvault::storage::MediaStore;

#[tokio::main]
async fn main() -> ExitCode {
    // Must be installed before any metrics are recorded.
    let metrics_handle = obs_metrics::install_prometheus_recorder();

    // Panic hook: log panics with full backtrace and increment the counter.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        obs_metrics::inc_panic_total();
        let backtrace = std::backtrace::Backtrace::force_capture();
        eprintln!("PANIC: {info}\nBacktrace:\n{backtrace}");
        default_hook(info);
    }));

    // Load configuration (layered: default.toml → {env}.toml → env vars)
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!(version = env!("CARGO_PKG_VERSION"), "clipvault starting");

    obs_metrics::describe_all_metrics();

    let shutdown = ShutdownCoordinator::new();
    let auth = Arc::new(AuthProvider::new(&config.auth));

    let store: Arc<dyn MediaStore> = match config.storage.backend.as_str() {
        "memory" => Arc::new(InMemoryMediaStore::new(
            &config.storage.bucket,
            &config.storage.region,
        )),
        _ => Arc::new(S3MediaStore::new(&config.storage)),
    };
    let videos: Arc<dyn VideoStore> = Arc::new(InMemoryVideoStore::new());

    let pipeline = Arc::new(IngestPipeline::new(
        config.upload.clone(),
        Arc::new(FfmpegRemuxer::new(&config.upload)),
        Arc::new(FfprobeProber::new(&config.upload)),
        store,
        videos.clone(),
    ));

    let start_time = std::time::Instant::now();
    let app_state = AppState {
        config: config.clone(),
        auth,
        videos,
        pipeline,
        start_time,
        metrics_handle,
    };
    let app = router::build_router(app_state);

    let uptime_cancel = shutdown.token().clone();
    tokio::spawn(async move {
        obs_metrics::run_uptime_task(start_time, uptime_cancel).await;
    });

    let http_addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port)
        .parse()
    {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "invalid HTTP bind address");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%http_addr, error = %e, "failed to bind HTTP listener");
            return ExitCode::FAILURE;
        }
    };

    info!(%http_addr, "HTTP server listening");

    let shutdown_token = shutdown.token().clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            })
            .await
    });

    // Wait for SIGINT/SIGTERM, then drain with a total timeout.
    shutdown.wait_for_signal_and_shutdown().await;

    info!("initiating graceful shutdown");
    let drained = tokio::time::timeout(
        std::time::Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        server,
    )
    .await;

    match drained {
        Ok(Ok(Ok(()))) => {
            info!("graceful shutdown completed");
            ExitCode::SUCCESS
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "HTTP server error during shutdown");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            error!(error = %e, "HTTP server task panicked");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("shutdown timed out after {SHUTDOWN_TIMEOUT_SECS}s, forcing exit");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
