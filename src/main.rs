use std::net::SocketAddr;

use gp_compliance_api::config;
use gp_compliance_api::database::DatabaseManager;
use gp_compliance_api::handlers::Integrations;
use gp_compliance_api::jobs::{ai, mailer, scheduler, AiError};
use gp_compliance_api::router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gp_compliance_api=info,tower_http=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::config();
    tracing::info!("Starting GP Compliance API in {:?} mode", config.environment);

    if config.database.run_migrations {
        if let Err(e) = DatabaseManager::migrate().await {
            tracing::error!("Migrations failed: {}", e);
        }
    }

    let mailer = mailer::from_config(&config.email)?;
    let ai = match ai::from_config(&config.ai) {
        Ok(client) => Some(client),
        Err(AiError::NotConfigured) => {
            tracing::info!("AI assistance disabled: no API key configured");
            None
        }
        Err(e) => {
            tracing::warn!("AI assistance disabled: {}", e);
            None
        }
    };

    let scheduler = match (config.scheduler.enabled, DatabaseManager::pool()) {
        (true, Ok(pool)) => Some(scheduler::spawn(pool, mailer.clone(), config)),
        (true, Err(e)) => {
            tracing::warn!("Scheduler not started: {}", e);
            None
        }
        (false, _) => None,
    };

    let app = router::app(config, Integrations { mailer, ai });

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("GP Compliance API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    DatabaseManager::close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
