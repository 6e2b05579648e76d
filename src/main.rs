//! Badge Timers - A state-managed HTTP server for per-badge countdown timers
//! 
//! This is the main entry point for the badge-timers application.

use std::sync::Arc;
use anyhow::Context;
use tokio::{net::TcpListener, sync::watch};
use tracing::info;

use badge_timers::{
    config::Config,
    engine::{BroadcastSink, Engine},
    state::AppState,
    api::create_router,
    store,
    tasks::tick_task,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("badge_timers={},tower_http=info", config.log_level()))
        .init();

    info!("Starting badge-timers server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, tick={}ms, data_dir={}",
          config.host, config.port, config.tick_ms,
          config.data_dir.as_ref().map_or("<memory>".to_string(), |d| d.display().to_string()));

    let report_offset = config
        .report_offset()
        .with_context(|| format!("UTC offset of {} minutes is out of range", config.utc_offset_minutes))?;

    // Open stores and build the engine
    let (timers, archive) = store::open(config.data_dir.as_deref())
        .context("Failed to open timer stores")?;
    let sink = BroadcastSink::new(config.event_buffer);
    let events_tx = sink.sender();
    let engine = Arc::new(
        Engine::new(timers, archive, Arc::new(SystemClock), Arc::new(sink))
            .with_report_offset(report_offset),
    );
    engine.init()?;

    // Start the tick background task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tick_handle = tokio::spawn(tick_task(
        Arc::clone(&engine),
        config.tick_interval(),
        shutdown_rx,
    ));

    // Create HTTP router with all endpoints
    let state = Arc::new(AppState::new(Arc::clone(&engine), events_tx, config.port, config.host.clone()));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    
    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers             - List timers");
    info!("  POST   /timers             - Create a timer");
    info!("  DELETE /timers/completed   - Clear completed timers");
    info!("  GET    /timers/:id         - Get a timer");
    info!("  DELETE /timers/:id         - Delete a timer");
    info!("  POST   /timers/:id/start   - Start or resume");
    info!("  POST   /timers/:id/pause   - Pause");
    info!("  POST   /timers/:id/stop    - Cancel");
    info!("  POST   /timers/:id/reset   - Reset");
    info!("  GET    /stats              - Live statistics");
    info!("  GET    /archive            - Completed-timer report");
    info!("  GET    /events             - Server-sent events");
    info!("  GET    /health             - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);
    
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Stop ticking without closing open history blocks
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Tick task already stopped");
    }
    if let Err(e) = tick_handle.await {
        tracing::error!("Tick task panicked: {}", e);
    }
    engine.close()?;

    info!("Server shutdown complete");
    Ok(())
}
