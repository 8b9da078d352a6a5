//! tutor-gate - quota-gated homework tutor service
//!
//! Startup order: arguments, TOML config, tracing, banner, API key check,
//! database, HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tutor_common::config::{
    database_path, ensure_root_folder, load_config_or_default, resolve_admin_email,
    resolve_gemini_api_key, resolve_root_folder, LoggingConfig,
};
use tutor_common::db::init_database;
use tutor_common::SystemClock;
use tutor_gate::models::Identity;
use tutor_gate::services::generation::{GeminiBackend, RetryPolicy};
use tutor_gate::store::SqliteEntitlementStore;
use tutor_gate::{build_router, AppState, GateSettings};

/// Command-line arguments for tutor-gate
#[derive(Parser, Debug)]
#[command(name = "tutor-gate")]
#[command(about = "Quota-gated tutoring service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "TUTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database (overrides TUTOR_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "TUTOR_PORT")]
    port: Option<u16>,

    /// Bind address (overrides TOML)
    #[arg(long, env = "TUTOR_BIND_ADDRESS")]
    bind: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    // Banner first, before any slow startup step
    info!(
        "Starting tutor-gate v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // A missing key is fatal here rather than on the first question
    let api_key = match resolve_gemini_api_key(&config) {
        Ok(key) => key,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    let backend = GeminiBackend::new(
        config.gemini.api_url.clone(),
        api_key,
        Duration::from_secs(config.gemini.request_timeout_secs),
    )?;

    let admin = match resolve_admin_email(&config).map(|e| Identity::parse(&e)) {
        Some(Ok(id)) => {
            info!("Admin dashboard enabled for {}", id);
            Some(id)
        }
        Some(Err(e)) => {
            warn!("Ignoring invalid admin email: {}", e);
            None
        }
        None => {
            info!("No admin email configured; admin dashboard disabled");
            None
        }
    };

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    ensure_root_folder(&root_folder)?;
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let settings = GateSettings {
        daily_base_allowance: config.quota.daily_base_allowance,
        referral_bonus: config.quota.referral_bonus,
        public_base_url: config.public_base_url.clone(),
        admin,
        retry: RetryPolicy::new(
            config.gemini.max_retries,
            Duration::from_millis(config.gemini.backoff_base_ms),
        ),
        session_idle_timeout: Duration::from_secs(config.session_idle_minutes.saturating_mul(60)),
    };
    info!(
        base = settings.daily_base_allowance,
        referral_bonus = settings.referral_bonus,
        max_attempts = settings.retry.max_attempts(),
        "Quota policy loaded"
    );

    let state = AppState::new(
        Arc::new(SqliteEntitlementStore::new(pool)),
        Arc::new(backend),
        Arc::new(SystemClock),
        settings,
    );
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
