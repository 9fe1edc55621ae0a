//! Booking backend for a wellness practice: service catalog, appointment
//! slots, client bookings and the admin schedule.
//!
//! # Booking flow
//! - The site asks `/api/availability` for the slots of a service on a date,
//!   or `/api/schedule` for the working days of the coming week
//! - The visitor picks a slot and posts it to `/api/bookings`
//! - The server re-reads the day's bookings inside an immediate SQLite
//!   transaction and runs the conflict check before inserting, so the slot
//!   list the visitor saw is never trusted
//! - If the booking cannot be stored at all, the error carries a `mailto:`
//!   link so the request can still be sent by e-mail
//!
//! # Configuration
//! - `RUST_PORT` listen port, default 8080
//! - `DATABASE_PATH` SQLite file, default `booking.db`
//! - `ADMIN_TOKEN` bearer token for `/api/admin/*` (also read from
//!   `/run/secrets/ADMIN_TOKEN`)
//! - `BOOKING_EMAIL` mailbox used in the e-mail fallback
//! - `RUST_LOG` log filter

use std::time::Duration;

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{signal, SignalKind};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod fallback;
pub mod models;
pub mod routes;
pub mod scheduling;
pub mod state;

#[cfg(test)]
mod tests;

use config::Config;
use state::AppState;

pub async fn start_server() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60 * 24));

    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
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
}
