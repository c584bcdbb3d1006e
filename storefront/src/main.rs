// storefront/src/main.rs

use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use storefront::config::AppConfig;
use storefront::services::mailer::LogMailer;
use storefront::services::mercadopago::MercadoPagoClient;
use storefront::state::AppState;
use storefront::store::PgStore;
use storefront::web::configure_app_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting storefront server...");

  let app_config = AppConfig::from_env().map_err(|e| {
    tracing::error!(error = %e, "Failed to load application configuration.");
    std::io::Error::other(e.to_string())
  })?;

  let db_pool = PgPoolOptions::new()
    .max_connections(app_config.database_max_connections)
    .connect(&app_config.database_url)
    .await
    .map_err(|e| {
      tracing::error!(error = %e, "Failed to connect to the database.");
      std::io::Error::other(e.to_string())
    })?;
  tracing::info!("Successfully connected to the database.");

  if app_config.run_migrations {
    sqlx::migrate!("./migrations").run(&db_pool).await.map_err(|e| {
      tracing::error!(error = %e, "Database migrations failed.");
      std::io::Error::other(e.to_string())
    })?;
    tracing::info!("Database migrations applied.");
  }

  let provider = MercadoPagoClient::new(&app_config.mercadopago).map_err(|e| std::io::Error::other(e.to_string()))?;
  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);

  let app_state = AppState::new(
    Arc::new(PgStore::new(db_pool)),
    Arc::new(provider),
    Arc::new(LogMailer),
    app_config,
  );

  tracing::info!("Binding server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
