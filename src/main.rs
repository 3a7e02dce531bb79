use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courtside::auth::TokenDirectory;
use courtside::booking::BookingService;
use courtside::config::Config;
use courtside::engine::Engine;
use courtside::http::{build_router, AppState};
use courtside::notify::{self, Notifier, NotifyHub};
use courtside::reminder::{self, ReminderSweep};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    courtside::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::new(config.journal_path())?);

    let tokens = Arc::new(TokenDirectory::new());
    if let Some(seed) = &config.seed {
        courtside::seed::load_file(seed, &engine, &tokens).await?;
    }
    if tokens.is_empty() {
        tracing::warn!("no accounts provisioned; every /api request will be rejected");
    }

    let hub = Arc::new(NotifyHub::new());
    tokio::spawn(notify::run_log_delivery(hub.subscribe()));
    let notifier: Arc<dyn Notifier> = hub;
    let service = Arc::new(BookingService::new(
        engine.clone(),
        notifier.clone(),
        config.venue_offset,
    ));

    let sweep = ReminderSweep::new(
        engine.clone(),
        notifier,
        config.venue_offset,
        config.reminder_lead,
    );
    tokio::spawn(reminder::run_reminder_sweep(sweep, config.reminder_interval));
    tokio::spawn(reminder::run_compactor(engine.clone(), config.compact_threshold));

    let app = build_router(AppState { service, tokens });

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("courtside listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  venue offset: {}", config.venue_offset);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("courtside stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM; in-flight requests are drained by axum.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("cannot register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
