use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod calendar;
mod config;
mod db;
pub mod error;
mod handlers;
mod identity;
mod models;
mod schema;
mod services;
mod store;

use crate::config::AppConfig;
use crate::services::EventService;
use crate::store::PgEventStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub events: EventService,
    /// Header carrying the caller's email.
    pub identity_header: HeaderName,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scheduler=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::parse();

    let tz = config.time_zone()?;
    let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
        .with_context(|| format!("IDENTITY_HEADER '{}' is not a valid header name", config.identity_header))?;

    let pool = db::establish_connection_pool(&config).context("Failed to create database pool")?;
    tracing::info!(
        timezone = %tz,
        cascade_scope = ?config.cascade_scope,
        "Database connection pool initialized"
    );

    let state = AppState {
        events: EventService::new(Arc::new(PgEventStore::new(pool)), tz, config.cascade_scope),
        identity_header: identity_header.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config.cors_allowed_origins.as_deref(), identity_header));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // User routes
        .route("/api/users", post(handlers::upsert_user))
        // Event routes
        .route(
            "/api/events",
            get(handlers::list_month_events).post(handlers::create_event),
        )
        .route("/api/events/day", get(handlers::list_day_events))
        .route("/api/events/search", get(handlers::search_events))
        .route(
            "/api/events/:id",
            get(handlers::get_event)
                .put(handlers::update_event)
                .delete(handlers::delete_event),
        )
        .route("/api/events/:id/date", post(handlers::change_event_date))
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Build CORS layer from the configured origin list.
///
/// If origins are configured, only those origins are allowed.
/// If not, defaults to permissive CORS (for development only).
fn build_cors_layer(allowed_origins: Option<&str>, identity_header: HeaderName) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, identity_header])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
