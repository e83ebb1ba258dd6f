mod config;
mod db;
mod error;
mod events;
mod handlers;
mod hierarchy;
mod models;
mod security;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use auth_core::TokenService;
use event_bus::EventProducer;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::events::TenantEventPublisher;

pub struct AppState {
    pub db: PgPool,
    pub events: TenantEventPublisher,
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

    let producer = EventProducer::new(&settings.kafka.brokers, "identity-service-producer")
        .context("failed to create Kafka producer")?;
    let events = TenantEventPublisher::new(producer);

    let state = web::Data::new(AppState { db, events });
    let tokens = web::Data::new(tokens);

    let bind = (settings.server.host.clone(), settings.server.port);
    tracing::info!(host = %settings.server.host, port = settings.server.port, "starting identity service");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(tokens.clone())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/me", web::get().to(handlers::auth::me)),
            )
            .service(
                web::scope("/tenants")
                    .route("", web::post().to(handlers::tenants::create_tenant))
                    .route("", web::get().to(handlers::tenants::list_tenants))
                    .route("/{id}", web::patch().to(handlers::tenants::set_tenant_parent)),
            )
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
