// storefront/src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines::register_all_pipelines;
use crate::services::mailer::Mailer;
use crate::services::mercadopago::PaymentProvider;
use crate::store::FulfillmentStore;
use std::sync::Arc;
use stepline::Registry;

/// Shared by every worker; cheap to clone.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn FulfillmentStore>,
  pub provider: Arc<dyn PaymentProvider>,
  pub mailer: Arc<dyn Mailer>,
  pub registry: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the collaborators together and registers all pipelines.
  pub fn new(
    store: Arc<dyn FulfillmentStore>,
    provider: Arc<dyn PaymentProvider>,
    mailer: Arc<dyn Mailer>,
    config: AppConfig,
  ) -> Self {
    let registry = Registry::new();
    register_all_pipelines(&registry);
    Self {
      store,
      provider,
      mailer,
      registry: Arc::new(registry),
      config: Arc::new(config),
    }
  }
}
