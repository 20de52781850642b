//! Binary entrypoint for the trace server.
//!
//! Configuration comes from environment variables, see [`Settings`].

use sdntrace_server::config::Settings;
use sdntrace_server::router::build_router;
use sdntrace_server::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().expect("invalid configuration");
    let addr = settings.listen_addr();

    let state = AppState::from_settings(settings).expect("failed to initialize collaborators");
    state.start_jobs();

    if let Err(err) = state.engine.find_circuits().await {
        tracing::warn!(error = %err, "initial circuit discovery failed");
    }

    let app = build_router(state.clone());

    tracing::info!("sdntrace server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    state.scheduler.shutdown();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
