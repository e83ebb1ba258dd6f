//! Configuration for the identity service, loaded from the environment.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub kafka: KafkaSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            kafka: KafkaSettings::from_env(),
            server: ServerSettings::from_env()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
}

impl KafkaSettings {
    fn from_env() -> Self {
        Self {
            brokers: env::var("BROKER_BOOTSTRAP").unwrap_or_else(|_| "kafka:9092".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8001".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn kafka_brokers_default_to_the_compose_host() {
        env::remove_var("BROKER_BOOTSTRAP");
        assert_eq!(KafkaSettings::from_env().brokers, "kafka:9092");

        env::set_var("BROKER_BOOTSTRAP", "localhost:19092");
        assert_eq!(KafkaSettings::from_env().brokers, "localhost:19092");
        env::remove_var("BROKER_BOOTSTRAP");
    }

    #[test]
    #[serial]
    fn database_url_is_required() {
        env::remove_var("DATABASE_URL");
        assert!(DatabaseSettings::from_env().is_err());
    }
}
