//! Configuration for the geocode worker, loaded from the environment.

use anyhow::Result;
use std::env;

pub const CONSUMER_GROUP: &str = "geocode-worker-group";

#[derive(Debug, Clone)]
pub struct Settings {
    pub brokers: String,
    pub crm_internal_url: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        Ok(Settings {
            brokers: env::var("BROKER_BOOTSTRAP").unwrap_or_else(|_| "kafka:9092".to_string()),
            crm_internal_url: env::var("CRM_INTERNAL_URL")
                .unwrap_or_else(|_| "http://crm-service:8002".to_string()),
        })
    }
}
