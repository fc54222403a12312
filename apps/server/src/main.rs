mod alert_layer;
mod auth;
mod db;
mod error;
mod handlers;
mod models;
mod notify;
mod rate_limit;
mod schedule;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rate_limit::{rate_limit_admin, rate_limit_booking, rate_limit_public, RateLimiter};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: db::Store,
    pub mailer: notify::Mailer,
    pub admin_email: String,
    pub admin_password: String,
    pub secret_key: String,
    pub started_at: Instant,
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Required env vars ──
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:barber.db?mode=rwc".into());
    let secret_key = std::env::var("SECRET_KEY").expect("SECRET_KEY must be set");
    let admin_password = std::env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set");

    // ── Optional env vars ──
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".into());
    let mail_api_url = std::env::var("MAIL_API_URL").unwrap_or_default();
    let mail_api_key = std::env::var("MAIL_API_KEY").unwrap_or_default();
    let from_email = std::env::var("FROM_EMAIL").unwrap_or_default();
    let admin_email = std::env::var("ADMIN_EMAIL").unwrap_or_default();

    let mailer = notify::Mailer::new(mail_api_url, mail_api_key, from_email);

    // ── Tracing: console + optional error alerts to the admin mailbox ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    if mailer.enabled() && !admin_email.is_empty() {
        registry
            .with(alert_layer::MailAlertLayer::new(
                mailer.clone(),
                admin_email.clone(),
            ))
            .init();
    } else {
        registry.init();
        tracing::warn!("MAIL_API_URL or ADMIN_EMAIL not set, notifications disabled");
    }

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    db::run_migrations(&pool).await?;

    let state = Arc::new(AppState {
        store: db::Store::new(pool),
        mailer,
        admin_email,
        admin_password,
        secret_key,
        started_at: Instant::now(),
    });

    // ── Rate limiter + background cleanup ──
    let rate_limiter = RateLimiter::new();
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // ── Router (grouped by rate limit tier) ──

    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    let public_routes = Router::new()
        .route("/api/services", get(handlers::client::list_services))
        .route("/api/stylists", get(handlers::client::list_stylists))
        .route("/api/availability", get(handlers::client::availability))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_public));

    let booking_routes = Router::new()
        .route("/api/bookings", post(handlers::client::create_booking))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_booking));

    let admin_routes = Router::new()
        .route("/api/admin/login", post(handlers::admin::login))
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/{id}",
            delete(handlers::admin::delete_booking),
        )
        .route("/api/admin/services", post(handlers::admin::create_service))
        .route(
            "/api/admin/services/{id}",
            delete(handlers::admin::delete_service),
        )
        .route("/api/admin/stylists", post(handlers::admin::create_stylist))
        .route(
            "/api/admin/stylists/{id}",
            delete(handlers::admin::delete_stylist),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_admin));

    let app = Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("Barber booking server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
