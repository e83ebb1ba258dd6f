mod config;
mod db;
mod handler;
mod http;
mod models;
mod store;

use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use auth_core::TokenService;
use event_bus::{topics, ConsumerConfig, DlqProducer, EventConsumer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::handler::NotificationHandler;
use crate::store::PgNotificationStore;

pub struct AppState {
    pub db: PgPool,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load()?;
    let tokens = TokenService::from_env().context("token configuration")?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run migrations")?;

    // Consumer runs alongside the HTTP server; it owns its own lifecycle and
    // stops with the process.
    let consumer_store = Arc::new(PgNotificationStore::new(db.clone()));
    let consumer_handler = Arc::new(NotificationHandler::new(consumer_store));
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
            consumer_handler,
            dlq,
        )
        .context("failed to create consumer")?,
    );

    let running_consumer = consumer.clone();
    tokio::spawn(async move {
        if let Err(err) = running_consumer.start().await {
            tracing::error!(error = %err, "consumer loop failed");
        }
    });

    let stopper = consumer.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        stopper.stop();
    });

    let state = web::Data::new(AppState { db });
    let tokens = web::Data::new(tokens);

    let bind = (settings.server_host.clone(), settings.server_port);
    tracing::info!(
        host = %settings.server_host,
        port = settings.server_port,
        "starting notification service"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(tokens.clone())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .service(
                web::scope("/notifications")
                    .route("", web::get().to(http::list_notifications))
                    .route("/{id}/read", web::post().to(http::mark_notification_read)),
            )
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
