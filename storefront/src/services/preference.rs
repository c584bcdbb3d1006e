// storefront/src/services/preference.rs

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::models::{CartLine, PaymentMetadata};
use crate::services::mercadopago::{BackUrls, PreferenceItem, PreferencePayer, PreferenceRequest, PreferenceResponse};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPreference {
  pub preference_id: String,
  pub redirect_url: String,
}

/// Builds the provider request from the cart snapshot.
///
/// The metadata is read back verbatim by the webhook.
pub fn build_preference_request(
  config: &AppConfig,
  metadata: PaymentMetadata,
  lines: &[CartLine],
  payer_email: Option<String>,
) -> AppResult<PreferenceRequest> {
  if lines.is_empty() {
    return Err(AppError::CartEmpty);
  }

  let items = lines
    .iter()
    .map(|line| PreferenceItem {
      id: line.product_id.to_string(),
      title: line.title.clone(),
      quantity: line.quantity,
      unit_price: line.unit_price,
      currency_id: config.store_currency.clone(),
    })
    .collect();

  Ok(PreferenceRequest {
    items,
    payer: PreferencePayer { email: payer_email },
    metadata,
    back_urls: BackUrls {
      success: config.back_url("success"),
      failure: config.back_url("failure"),
      pending: config.back_url("pending"),
    },
    notification_url: config.notification_url(),
    auto_return: "approved".to_string(),
    external_reference: format!("cart-{}", metadata.cart_id),
  })
}

/// Picks the checkout URL the buyer is sent to.
pub fn redirect_target(response: PreferenceResponse, use_sandbox: bool) -> AppResult<CreatedPreference> {
  let url = if use_sandbox {
    response.sandbox_init_point.or(response.init_point)
  } else {
    response.init_point.or(response.sandbox_init_point)
  };
  let redirect_url =
    url.ok_or_else(|| AppError::ProviderUnavailable("preference was created without a checkout URL".to_string()))?;
  Ok(CreatedPreference {
    preference_id: response.id,
    redirect_url,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn config() -> AppConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
      ("DATABASE_URL", "postgres://localhost/store"),
      ("MP_ACCESS_TOKEN", "TEST-token"),
      ("MP_WEBHOOK_SECRET", "secret"),
      ("APP_BASE_URL", "https://api.store.test"),
      ("FRONT_URL", "https://store.test"),
    ]);
    AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
  }

  fn line(product_id: i64, quantity: i32, price: &str) -> CartLine {
    CartLine {
      product_id,
      title: format!("Product {}", product_id),
      quantity,
      unit_price: price.parse().unwrap(),
      current_stock: 10,
    }
  }

  const META: PaymentMetadata = PaymentMetadata {
    user_id: 7,
    cart_id: 12,
    address_id: 3,
  };

  #[test]
  fn builds_items_metadata_and_urls_from_the_snapshot() {
    let request =
      build_preference_request(&config(), META, &[line(42, 2, "10.00")], Some("ana@example.com".to_string())).unwrap();

    assert_eq!(request.items.len(), 1);
    assert_eq!(request.items[0].id, "42");
    assert_eq!(request.items[0].quantity, 2);
    assert_eq!(request.items[0].currency_id, "ARS");
    assert_eq!(request.metadata, META);
    assert_eq!(request.notification_url, "https://api.store.test/api/v1/webhooks/mercadopago");
    assert_eq!(request.back_urls.pending, "https://store.test/mercadopago/pending");
    assert_eq!(request.auto_return, "approved");
    assert_eq!(request.payer.email.as_deref(), Some("ana@example.com"));

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["metadata"]["cart_id"], 12);
  }

  #[test]
  fn empty_cart_is_rejected_before_any_provider_call() {
    assert!(matches!(
      build_preference_request(&config(), META, &[], None),
      Err(AppError::CartEmpty)
    ));
  }

  #[test]
  fn redirect_prefers_the_configured_environment() {
    let response = || PreferenceResponse {
      id: "pref-1".to_string(),
      init_point: Some("https://mp/live".to_string()),
      sandbox_init_point: Some("https://mp/sandbox".to_string()),
    };
    assert_eq!(redirect_target(response(), false).unwrap().redirect_url, "https://mp/live");
    assert_eq!(redirect_target(response(), true).unwrap().redirect_url, "https://mp/sandbox");

    let missing = PreferenceResponse {
      id: "pref-2".to_string(),
      init_point: None,
      sandbox_init_point: None,
    };
    assert!(matches!(
      redirect_target(missing, false),
      Err(AppError::ProviderUnavailable(_))
    ));
  }
}
