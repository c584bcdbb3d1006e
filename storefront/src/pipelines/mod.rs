// storefront/src/pipelines/mod.rs

//! Defines and registers the pipelines run by the HTTP handlers.

use crate::errors::AppError;
use stepline::Registry;

pub mod checkout_pipeline;
pub mod contexts;
pub mod webhook_pipeline;

/// Registers every pipeline with `registry`. Called once while building `AppState`.
pub fn register_all_pipelines(registry: &Registry<AppError>) {
  tracing::info!("Registering pipelines...");

  webhook_pipeline::register_webhook_pipeline(registry);
  checkout_pipeline::register_checkout_pipeline(registry);

  tracing::info!("All application pipelines registered.");
}
