// storefront/tests/common/mod.rs
#![allow(dead_code)]

pub mod pg;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use stepline::{ContextData, PipelineResult};
use storefront::config::AppConfig;
use storefront::errors::{AppError, Result as AppResult};
use storefront::models::CartStatus;
use storefront::pipelines::contexts::WebhookCtxData;
use storefront::services::mailer::{EmailMessage, Mailer, SentEmailInfo};
use storefront::services::mercadopago::{
  PaymentProvider, PreferenceRequest, PreferenceResponse, ProviderError, ProviderPayment,
};
use storefront::services::signature::SignatureInput;
use storefront::state::AppState;
use storefront::store::MemoryStore;
use tracing::Level;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

pub fn dec(raw: &str) -> Decimal {
  raw.parse().unwrap()
}

pub fn test_config() -> AppConfig {
  let vars: HashMap<&str, &str> = HashMap::from([
    ("DATABASE_URL", "postgres://localhost/storefront_test"),
    ("MP_ACCESS_TOKEN", "TEST-access-token"),
    ("MP_WEBHOOK_SECRET", WEBHOOK_SECRET),
    ("APP_BASE_URL", "https://api.store.test"),
    ("FRONT_URL", "https://store.test"),
    ("FULFILLMENT_TX_TIMEOUT_SECS", "2"),
  ]);
  AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
}

// --- Provider ---

/// A provider whose payments are scripted by the test.
#[derive(Default)]
pub struct FakeProvider {
  payments: Mutex<HashMap<String, JsonValue>>,
  pub preferences: Mutex<Vec<PreferenceRequest>>,
  pub fail_lookups: AtomicBool,
  pub fail_preferences: AtomicBool,
  pub lookups: AtomicUsize,
}

impl FakeProvider {
  pub fn put_payment(&self, payload: JsonValue) {
    let id = match &payload["id"] {
      JsonValue::String(s) => s.clone(),
      other => other.to_string(),
    };
    self.payments.lock().insert(id, payload);
  }

  pub fn set_status(&self, payment_id: &str, status: &str, detail: &str) {
    if let Some(payload) = self.payments.lock().get_mut(payment_id) {
      payload["status"] = json!(status);
      payload["status_detail"] = json!(detail);
    }
  }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
  async fn create_preference(&self, request: &PreferenceRequest) -> Result<PreferenceResponse, ProviderError> {
    if self.fail_preferences.load(Ordering::SeqCst) {
      return Err(ProviderError::Status {
        status: 500,
        body: "preference service down".to_string(),
      });
    }
    let mut recorded = self.preferences.lock();
    recorded.push(request.clone());
    let id = format!("pref-{}", recorded.len());
    Ok(PreferenceResponse {
      init_point: Some(format!("https://mp.test/checkout/{}", id)),
      sandbox_init_point: Some(format!("https://sandbox.mp.test/checkout/{}", id)),
      id,
    })
  }

  async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ProviderError> {
    self.lookups.fetch_add(1, Ordering::SeqCst);
    if self.fail_lookups.load(Ordering::SeqCst) {
      return Err(ProviderError::Status {
        status: 503,
        body: "payments API unavailable".to_string(),
      });
    }
    let payload = self.payments.lock().get(payment_id).cloned();
    let payload = payload.ok_or_else(|| ProviderError::Status {
      status: 404,
      body: format!("payment {} not found", payment_id),
    })?;
    serde_json::from_value(payload).map_err(|e| ProviderError::Decode(e.to_string()))
  }
}

/// A provider payment payload as the payments API returns it.
pub fn payment_payload(
  id: &str,
  status: &str,
  detail: &str,
  amount: &str,
  user_id: i64,
  cart_id: i64,
  address_id: i64,
) -> JsonValue {
  json!({
    "id": id,
    "status": status,
    "status_detail": detail,
    "transaction_amount": amount.parse::<f64>().unwrap(),
    "transaction_details": {"net_received_amount": amount.parse::<f64>().unwrap()},
    "currency_id": "ARS",
    "payment_method_id": "visa",
    "payment_type_id": "credit_card",
    "installments": 1,
    "payer": {"id": "payer-1", "email": "payer@example.com"},
    "metadata": {"user_id": user_id, "cart_id": cart_id, "address_id": address_id},
    "date_created": "2024-05-01T12:00:00Z"
  })
}

// --- Mailer ---

#[derive(Default)]
pub struct RecordingMailer {
  pub sent: Mutex<Vec<EmailMessage>>,
  pub failing: AtomicBool,
}

impl RecordingMailer {
  pub fn sent_to(&self, email: &str) -> Vec<EmailMessage> {
    self.sent.lock().iter().filter(|m| m.to == email).cloned().collect()
  }

  pub fn count(&self) -> usize {
    self.sent.lock().len()
  }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send(&self, message: &EmailMessage) -> AppResult<SentEmailInfo> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(AppError::Internal("smtp relay refused the message".to_string()));
    }
    let mut sent = self.sent.lock();
    sent.push(message.clone());
    Ok(SentEmailInfo {
      message_id: format!("msg-{}", sent.len()),
    })
  }
}

// --- Harness ---

pub struct Harness {
  pub store: MemoryStore,
  pub provider: Arc<FakeProvider>,
  pub mailer: Arc<RecordingMailer>,
  pub state: AppState,
}

pub fn harness() -> Harness {
  setup_tracing();
  let store = MemoryStore::new();
  let provider = Arc::new(FakeProvider::default());
  let mailer = Arc::new(RecordingMailer::default());
  let state = AppState::new(
    Arc::new(store.clone()),
    provider.clone(),
    mailer.clone(),
    test_config(),
  );
  Harness {
    store,
    provider,
    mailer,
    state,
  }
}

/// A buyer with one address and an active cart holding two units of a product priced 10.00 (stock 5).
pub struct Scenario {
  pub user_id: i64,
  pub address_id: i64,
  pub product_id: i64,
  pub cart_id: i64,
}

pub async fn seed_scenario(store: &MemoryStore) -> Scenario {
  let user_id = store.seed_user("Ana", "ana@example.com").await;
  let address_id = store.seed_address(user_id).await;
  let product_id = store.seed_product("Mate", dec("10.00"), 5).await;
  let cart_id = store
    .seed_cart(user_id, CartStatus::Active, &[(product_id, 2, dec("10.00"))])
    .await;
  Scenario {
    user_id,
    address_id,
    product_id,
    cart_id,
  }
}

// --- Webhook signing ---

pub fn sign(secret: &str, data_id: &str, request_id: &str, ts: &str) -> String {
  let manifest = format!("id:{};request-id:{};ts:{};", data_id, request_id, ts);
  let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
  mac.update(manifest.as_bytes());
  format!("ts={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

pub fn signed_input(payment_id: &str, request_id: &str) -> SignatureInput {
  SignatureInput {
    signature_header: Some(sign(WEBHOOK_SECRET, payment_id, request_id, "1714579200")),
    request_id: Some(request_id.to_string()),
    data_id: Some(payment_id.to_string()),
    topic: Some("payment".to_string()),
  }
}

/// Runs the webhook pipeline for one correctly signed delivery.
pub async fn deliver(state: &AppState, payment_id: &str) -> (Result<PipelineResult, AppError>, WebhookCtxData) {
  let ctx = ContextData::new(WebhookCtxData::new(
    state.clone(),
    signed_input(payment_id, &format!("req-{}", uuid::Uuid::new_v4())),
  ));
  let result = state.registry.run(ctx.clone()).await;
  (result, ctx.snapshot())
}
