//! Configuration for the notification service, loaded from the environment.

use anyhow::{Context, Result};
use std::env;

pub const CONSUMER_GROUP: &str = "notification-service-group";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub brokers: String,
    pub server_host: String,
    pub server_port: u16,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        Ok(Settings {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            brokers: env::var("BROKER_BOOTSTRAP").unwrap_or_else(|_| "kafka:9092".to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8003".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}
