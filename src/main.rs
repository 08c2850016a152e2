use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinesphere::api::{create_router, AppState};
use cinesphere::config::Config;
use cinesphere::context::ServiceContext;
use cinesphere::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinesphere=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Collaborators are built once and shared by the session
    let ctx = ServiceContext::from_config(&config);
    let session = Session::start(ctx.clone()).await;

    let app = create_router(AppState::new(session.clone()));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "CineSphere listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown().await;
    ctx.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
