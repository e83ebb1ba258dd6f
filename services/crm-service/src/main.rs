mod config;
mod db;
mod error;
mod events;
mod handlers;
mod models;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use auth_core::TokenService;
use event_bus::EventProducer;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::events::CustomerEventPublisher;

pub struct AppState {
    pub db: PgPool,
    pub events: CustomerEventPublisher,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load()?;
    let tokens = TokenService::from_env().context("token configuration")?;

    let db = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run migrations")?;

    let producer = EventProducer::new(&settings.kafka.brokers, "crm-service-producer")
        .context("failed to create Kafka producer")?;
    let events = CustomerEventPublisher::new(producer);

    let state = web::Data::new(AppState { db, events });
    let tokens = web::Data::new(tokens);

    let bind = (settings.server.host.clone(), settings.server.port);
    tracing::info!(host = %settings.server.host, port = settings.server.port, "starting CRM service");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(tokens.clone())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .service(
                web::scope("/customers")
                    .route("", web::post().to(handlers::customers::create_customer))
                    .route("", web::get().to(handlers::customers::list_customers))
                    .route("/{id}", web::get().to(handlers::customers::get_customer))
                    .route("/{id}", web::put().to(handlers::customers::update_customer)),
            )
            .route(
                "/internal/customers/{id}/coordinates",
                web::patch().to(handlers::internal::update_coordinates),
            )
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
