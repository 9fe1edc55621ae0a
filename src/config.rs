use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Invalid {key} value: {reason}")]
pub struct ConfigError {
    key: String,
    reason: String,
}

pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Bearer token for the admin API. The admin API refuses every request
    /// when unset.
    pub admin_token: Option<String>,
    /// Mailbox offered to clients when booking through the API fails.
    pub booking_email: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let admin_token = var("ADMIN_TOKEN").ok().or_else(|| read_secret("ADMIN_TOKEN"));
        if admin_token.is_none() {
            warn!("ADMIN_TOKEN not configured, admin API is disabled");
        }

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            database_path: try_load("DATABASE_PATH", "booking.db")?,
            admin_token,
            booking_email: try_load("BOOKING_EMAIL", "bookings@example.com")?,
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret file: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
