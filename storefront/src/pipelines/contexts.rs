// storefront/src/pipelines/contexts.rs

//! Data carried through each pipeline. Handlers receive these wrapped in
//! `stepline::ContextData`.

use crate::models::{Cart, CartLine, InternalState, PaymentEvent};
use crate::services::fulfillment::FulfillmentOutcome;
use crate::services::mercadopago::PreferenceRequest;
use crate::services::notifier::NotifyOutcome;
use crate::services::preference::CreatedPreference;
use crate::services::signature::{SignatureInput, Verification};
use crate::state::AppState;

/// One webhook delivery, from signature check to customer email.
#[derive(Clone)]
pub struct WebhookCtxData {
  pub app_state: AppState,
  pub signature: SignatureInput,
  pub verification: Option<Verification>,
  pub payment: Option<PaymentEvent>,
  pub internal_state: Option<InternalState>,
  pub outcome: Option<FulfillmentOutcome>,
  pub notification: Option<NotifyOutcome>,
}

impl WebhookCtxData {
  pub fn new(app_state: AppState, signature: SignatureInput) -> Self {
    Self {
      app_state,
      signature,
      verification: None,
      payment: None,
      internal_state: None,
      outcome: None,
      notification: None,
    }
  }
}

/// A buyer turning their cart into a provider checkout.
#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub user_id: i64,
  pub requested_cart_id: Option<i64>,
  pub address_id: i64,
  pub cart: Option<Cart>,
  pub lines: Vec<CartLine>,
  pub request: Option<PreferenceRequest>,
  pub preference: Option<CreatedPreference>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, user_id: i64, requested_cart_id: Option<i64>, address_id: i64) -> Self {
    Self {
      app_state,
      user_id,
      requested_cart_id,
      address_id,
      cart: None,
      lines: Vec::new(),
      request: None,
      preference: None,
    }
  }
}
