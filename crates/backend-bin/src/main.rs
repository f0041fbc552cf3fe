// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the `authgate` server.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use authgate_lib::{
    config::{Settings, DEFAULT_CONFIG_PATH},
    create_router,
    kv::MemoryKvStore,
    AppState, Backends,
};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Authentication and session server
#[derive(Debug, Parser)]
#[command(name = "authgate", version)]
struct Args {
    /// TOML config file; `AUTHGATE_*` variables override it
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overriding `server.bind_addr`
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config)
        .with_context(|| format!("failed to load settings from {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        settings.server.bind_addr = bind;
    }

    init_tracing(&settings.log_level, args.json_logs);

    let kv = Arc::new(MemoryKvStore::new());
    let reaper = kv.start_reaper(settings.kv.reap_interval());

    let mut backends = Backends {
        kv,
        ..Backends::in_memory(&settings)
    };
    attach_database(&settings, &mut backends).await?;

    let bind_addr = settings.server.bind_addr;
    let state = AppState::new(settings, backends).context("failed to build application state")?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(state).layer(cors);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    reaper.abort();
    tracing::info!("server shutdown complete");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn attach_database(settings: &Settings, backends: &mut Backends) -> anyhow::Result<()> {
    use authgate_lib::auth::PgVerificationTokenStore;

    let Some(url) = settings.database.url.as_deref() else {
        tracing::warn!("database.url not set, verification tokens are kept in memory");
        return Ok(());
    };
    let store = PgVerificationTokenStore::connect(url)
        .await
        .context("failed to connect to postgres")?;
    store.migrate().await.context("failed to apply migrations")?;
    backends.tokens = Arc::new(store);
    tracing::info!("verification tokens stored in postgres");
    Ok(())
}

#[cfg(not(feature = "postgres"))]
async fn attach_database(settings: &Settings, _backends: &mut Backends) -> anyhow::Result<()> {
    if settings.database.url.is_some() {
        tracing::warn!("database.url ignored: built without the `postgres` feature");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
