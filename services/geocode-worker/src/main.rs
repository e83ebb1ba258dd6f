mod config;
mod geocoding;
mod handler;

use std::sync::Arc;

use anyhow::Context;
use event_bus::{topics, ConsumerConfig, DlqProducer, EventConsumer};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::geocoding::MockGeocodingClient;
use crate::handler::GeocodeHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load()?;

    let geocoder = Arc::new(MockGeocodingClient::new());
    let handler = Arc::new(
        GeocodeHandler::new(geocoder, settings.crm_internal_url.clone())
            .context("failed to create geocode handler")?,
    );
    let dlq = Arc::new(
        DlqProducer::new(&settings.brokers).context("failed to create DLQ producer")?,
    );

    let consumer = Arc::new(
        EventConsumer::new(
            ConsumerConfig::new(
                settings.brokers.clone(),
                config::CONSUMER_GROUP,
                vec![topics::CUSTOMER_CREATED.to_string()],
            ),
            handler,
            dlq,
        )
        .context("failed to create consumer")?,
    );

    let stopper = consumer.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        stopper.stop();
    });

    consumer.start().await.context("consumer loop failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
