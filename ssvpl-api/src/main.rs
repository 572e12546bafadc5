use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use ssvpl_api::{app, AppState};
use ssvpl_core::SystemClock;
use ssvpl_store::{app_config::Config, Repositories};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ssvpl_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting SSVPL admin API on port {}", config.server.port);

    let repos = Repositories::connect(&config.database)
        .await
        .context("Failed to initialise the store")?;

    let app_state = AppState::new(&config, repos, Arc::new(SystemClock))?;

    // Bootstrap admin
    if let (Some(email), Some(password)) = (
        config.auth.bootstrap_admin_email.as_deref(),
        config.auth.bootstrap_admin_password.as_ref(),
    ) {
        let admin = app_state
            .auth
            .provision_admin(email, password)
            .await
            .context("Failed to provision bootstrap admin")?;
        tracing::info!("Bootstrap admin ready: {}", admin.email);
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
