//! Stage Timer - a staged interval timer engine
//!
//! This is the main entry point for the stage-timer server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use stage_timer::{
    api::create_router,
    config::Config,
    state::AppState,
    tasks::channel_refresh_task,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("stage_timer={},tower_http=info", config.log_level()))
        .init();

    let stages = config.stages()?;
    info!("Starting stage-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, stages={}, tick={}ms",
        config.host, config.port, config.stages, config.tick_ms
    );

    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        stages,
        config.timer_options(),
        Arc::new(SystemClock),
    ));

    // Start the status board refresh task
    let refresh_state = Arc::clone(&state);
    let refresh_interval = config.refresh_interval();
    tokio::spawn(async move {
        channel_refresh_task(refresh_state, refresh_interval).await;
    });

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers/:name                        - Create a timer");
    info!("  POST   /timers/:name/{{start,pause,resume,stop,skip}}");
    info!("  POST   /timers/:name/stage/:index           - Jump to a stage");
    info!("  POST   /timers/:name/subscribers            - Subscribe");
    info!("  DELETE /timers/:name/subscribers/:id        - Unsubscribe");
    info!("  GET    /channels/:channel                   - Status board");
    info!("  GET    /health                              - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        result = shutdown_signal() => {
            if let Err(e) = result {
                tracing::error!("Signal handler error: {}", e);
            }
            info!("Shutdown signal received");
        }
    }

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
