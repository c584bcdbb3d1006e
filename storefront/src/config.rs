// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MP_API_BASE_URL: &str = "https://api.mercadopago.com";

/// Credentials and tuning for the Mercado Pago REST API.
#[derive(Clone)]
pub struct MercadoPagoConfig {
  pub access_token: String,
  pub webhook_secret: String,
  pub api_base_url: String,
  pub timeout: Duration,
  pub use_sandbox: bool,
}

impl fmt::Debug for MercadoPagoConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MercadoPagoConfig")
      .field("access_token", &"[REDACTED]")
      .field("webhook_secret", &"[REDACTED]")
      .field("api_base_url", &self.api_base_url)
      .field("timeout", &self.timeout)
      .field("use_sandbox", &self.use_sandbox)
      .finish()
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  pub run_migrations: bool,

  /// Public URL of this backend; the provider posts notifications here.
  pub app_base_url: String,
  /// Public URL of the storefront the buyer returns to after paying.
  pub front_url: String,

  pub mercadopago: MercadoPagoConfig,

  pub store_currency: String,
  pub store_name: String,
  pub mail_sender: String,

  /// Upper bound for the whole order-creation transaction.
  pub fulfillment_tx_timeout: Duration,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|_| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var::<u16>("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;
    let database_url = get_env("DATABASE_URL")?;
    let database_max_connections = parse_var::<u32>("DATABASE_MAX_CONNECTIONS", &get_or("DATABASE_MAX_CONNECTIONS", "10"))?;
    let run_migrations = parse_var::<bool>("RUN_MIGRATIONS", &get_or("RUN_MIGRATIONS", "false"))?;

    let app_base_url = get_env("APP_BASE_URL")
      .or_else(|_| get_env("BACK_URL"))
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));
    let front_url = get_or("FRONT_URL", "http://localhost:3000");

    let timeout_ms = parse_var::<u64>("MP_TIMEOUT_MS", &get_or("MP_TIMEOUT_MS", "5000"))?;
    let mercadopago = MercadoPagoConfig {
      access_token: get_env("MP_ACCESS_TOKEN")?,
      webhook_secret: get_env("MP_WEBHOOK_SECRET")?,
      api_base_url: get_or("MP_API_BASE_URL", DEFAULT_MP_API_BASE_URL),
      timeout: Duration::from_millis(timeout_ms),
      use_sandbox: parse_var::<bool>("MP_USE_SANDBOX", &get_or("MP_USE_SANDBOX", "false"))?,
    };

    let tx_timeout_secs = parse_var::<u64>(
      "FULFILLMENT_TX_TIMEOUT_SECS",
      &get_or("FULFILLMENT_TX_TIMEOUT_SECS", "10"),
    )?;
    if tx_timeout_secs == 0 {
      return Err(AppError::Config(
        "FULFILLMENT_TX_TIMEOUT_SECS must be greater than zero".to_string(),
      ));
    }

    let config = Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      run_migrations,
      app_base_url: trim_trailing_slash(app_base_url),
      front_url: trim_trailing_slash(front_url),
      mercadopago,
      store_currency: get_or("STORE_CURRENCY", "ARS"),
      store_name: get_or("STORE_NAME", "Rolling Store"),
      mail_sender: get_or("MAIL_SENDER", "noreply@example.com"),
      fulfillment_tx_timeout: Duration::from_secs(tx_timeout_secs),
    };

    tracing::info!(
      server = %format!("{}:{}", config.server_host, config.server_port),
      mp_api = %config.mercadopago.api_base_url,
      sandbox = config.mercadopago.use_sandbox,
      "Application configuration loaded successfully."
    );
    Ok(config)
  }

  /// Where the provider delivers payment notifications.
  pub fn notification_url(&self) -> String {
    format!("{}/api/v1/webhooks/mercadopago", self.app_base_url)
  }

  /// Return URL for a checkout outcome (`success`, `failure` or `pending`).
  pub fn back_url(&self, outcome: &str) -> String {
    format!("{}/mercadopago/{}", self.front_url, outcome)
  }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e)))
}

fn trim_trailing_slash(url: String) -> String {
  url.trim_end_matches('/').to_string()
}
