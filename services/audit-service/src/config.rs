//! Configuration for the audit consumer, loaded from the environment.

use anyhow::{Context, Result};
use std::env;

pub const CONSUMER_GROUP: &str = "audit-service-group";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub brokers: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        Ok(Settings {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            brokers: env::var("BROKER_BOOTSTRAP").unwrap_or_else(|_| "kafka:9092".to_string()),
        })
    }
}
