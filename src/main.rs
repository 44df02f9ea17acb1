//! rsvp-gateway server entry point.
//!
//! Loads configuration, selects the datastore, and starts the Axum HTTP
//! server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rsvp_gateway::api;
use rsvp_gateway::app_state::AppState;
use rsvp_gateway::config::{AppConfig, LogFormat};
use rsvp_gateway::domain::{EventBus, NotificationDispatcher, RegistrationEvent};
use rsvp_gateway::persistence::{MemoryStore, PgStore};
use rsvp_gateway::service::{RegistrationApi, RegistrationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting rsvp-gateway");

    let event_bus = EventBus::new(config.event_bus_capacity);
    let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(event_bus.clone());
    tokio::spawn(log_notifications(event_bus.subscribe()));

    let registrations: Arc<dyn RegistrationApi> = if config.persistence_enabled {
        let store = PgStore::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        if config.run_migrations {
            store
                .migrate(&config.migrations_dir)
                .await
                .context("applying migrations")?;
            tracing::info!(dir = %config.migrations_dir.display(), "migrations applied");
        }
        Arc::new(RegistrationService::new(store, dispatcher))
    } else {
        tracing::warn!("persistence disabled; registrations are kept in memory only");
        Arc::new(RegistrationService::new(MemoryStore::new(), dispatcher))
    };

    let app_state = AppState {
        registrations,
        event_bus,
    };

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs));

    let app = Router::new()
        .merge(api::build_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(timeout),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Default delivery worker: records every notification in the log.
async fn log_notifications(mut rx: broadcast::Receiver<RegistrationEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::info!(
                kind = event.event_type_str(),
                event_id = %event.event_id(),
                user_id = %event.user_id(),
                "notification"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
