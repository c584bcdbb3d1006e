// storefront/src/services/mercadopago.rs

//! Client for the two Mercado Pago calls the storefront consumes:
//! creating a checkout preference and looking up a payment.

use crate::config::MercadoPagoConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::models::{InternalState, PaymentEvent, PaymentMetadata, ProviderStatus};
use crate::services::status_mapper::map_status;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("HTTP transport error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("provider answered {status}: {body}")]
  Status { status: u16, body: String },

  #[error("unexpected provider payload: {0}")]
  Decode(String),
}

// --- Preference DTOs ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceItem {
  pub id: String,
  pub title: String,
  pub quantity: i32,
  #[serde(with = "rust_decimal::serde::float")]
  pub unit_price: Decimal,
  pub currency_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferencePayer {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackUrls {
  pub success: String,
  pub failure: String,
  pub pending: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceRequest {
  pub items: Vec<PreferenceItem>,
  pub payer: PreferencePayer,
  pub metadata: PaymentMetadata,
  pub back_urls: BackUrls,
  pub notification_url: String,
  pub auto_return: String,
  pub external_reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceResponse {
  pub id: String,
  #[serde(default)]
  pub init_point: Option<String>,
  #[serde(default)]
  pub sandbox_init_point: Option<String>,
}

// --- Payment DTOs ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionDetails {
  #[serde(default, with = "rust_decimal::serde::float_option")]
  pub net_received_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderPayer {
  #[serde(default, deserialize_with = "optional_id_string")]
  pub id: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
}

/// A payment as returned by `GET /v1/payments/{id}`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderPayment {
  #[serde(deserialize_with = "id_string")]
  pub id: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub status_detail: Option<String>,
  #[serde(default, with = "rust_decimal::serde::float_option")]
  pub transaction_amount: Option<Decimal>,
  #[serde(default)]
  pub transaction_details: Option<TransactionDetails>,
  #[serde(default)]
  pub currency_id: Option<String>,
  #[serde(default)]
  pub payment_method_id: Option<String>,
  #[serde(default)]
  pub payment_type_id: Option<String>,
  #[serde(default)]
  pub installments: Option<i32>,
  #[serde(default)]
  pub payer: Option<ProviderPayer>,
  #[serde(default)]
  pub metadata: Option<JsonValue>,
  #[serde(default)]
  pub date_created: Option<DateTime<Utc>>,
  #[serde(default)]
  pub date_approved: Option<DateTime<Utc>>,
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  match JsonValue::deserialize(deserializer)? {
    JsonValue::String(s) if !s.is_empty() => Ok(s),
    JsonValue::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!("invalid payment id: {}", other))),
  }
}

fn optional_id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
  Ok(match Option::<JsonValue>::deserialize(deserializer)? {
    Some(JsonValue::String(s)) if !s.is_empty() => Some(s),
    Some(JsonValue::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

impl ProviderPayment {
  pub fn provider_status(&self) -> ProviderStatus {
    ProviderStatus::from(self.status.as_str())
  }

  /// Validates the payload into the event the fulfillment core works on.
  pub fn into_event(self) -> AppResult<PaymentEvent> {
    let metadata = PaymentMetadata::from_json(self.metadata.as_ref())?;
    let status = self.provider_status();
    let (payer_id, payer_email) = match self.payer {
      Some(payer) => (payer.id, payer.email.filter(|e| !e.trim().is_empty())),
      None => (None, None),
    };
    Ok(PaymentEvent {
      mp_payment_id: self.id,
      status,
      status_detail: self.status_detail,
      transaction_amount: self.transaction_amount,
      net_received_amount: self.transaction_details.and_then(|d| d.net_received_amount),
      currency_id: self.currency_id,
      payment_method: self.payment_method_id,
      payment_type: self.payment_type_id,
      installments: self.installments,
      payer_id,
      payer_email,
      metadata,
      date_created: self.date_created,
      date_approved: self.date_approved,
    })
  }

  /// Buyer-facing view used by the status lookup endpoint.
  pub fn status_view(&self) -> PaymentStatusView {
    PaymentStatusView {
      id: self.id.clone(),
      status: self.status.clone(),
      status_detail: self.status_detail.clone(),
      internal_state: map_status(&self.provider_status(), self.status_detail.as_deref()),
      transaction_amount: self.transaction_amount,
      currency_id: self.currency_id.clone(),
      payment_method: self.payment_method_id.clone(),
      installments: self.installments,
      date_created: self.date_created,
      date_approved: self.date_approved,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
  pub id: String,
  pub status: String,
  pub status_detail: Option<String>,
  pub internal_state: InternalState,
  pub transaction_amount: Option<Decimal>,
  pub currency_id: Option<String>,
  pub payment_method: Option<String>,
  pub installments: Option<i32>,
  pub date_created: Option<DateTime<Utc>>,
  pub date_approved: Option<DateTime<Utc>>,
}

/// The provider as seen by the storefront.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
  async fn create_preference(&self, request: &PreferenceRequest) -> Result<PreferenceResponse, ProviderError>;

  async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ProviderError>;
}

pub struct MercadoPagoClient {
  http: reqwest::Client,
  base_url: String,
  access_token: String,
}

impl MercadoPagoClient {
  pub fn new(config: &MercadoPagoConfig) -> AppResult<Self> {
    let http = reqwest::Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build Mercado Pago HTTP client: {}", e)))?;
    Ok(Self {
      http,
      base_url: config.api_base_url.trim_end_matches('/').to_string(),
      access_token: config.access_token.clone(),
    })
  }

  fn payment_url(&self, payment_id: &str) -> String {
    format!("{}/v1/payments/{}", self.base_url, urlencoding::encode(payment_id))
  }

  async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(status = status.as_u16(), "Mercado Pago returned an error status.");
      return Err(ProviderError::Status {
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
      });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
  }
}

#[async_trait]
impl PaymentProvider for MercadoPagoClient {
  #[instrument(name = "mercadopago::create_preference", skip(self, request), fields(cart_id = request.metadata.cart_id), err(Display))]
  async fn create_preference(&self, request: &PreferenceRequest) -> Result<PreferenceResponse, ProviderError> {
    let response = self
      .http
      .post(format!("{}/checkout/preferences", self.base_url))
      .bearer_auth(&self.access_token)
      .json(request)
      .send()
      .await?;
    let preference: PreferenceResponse = Self::read_json(response).await?;
    info!(preference_id = %preference.id, "Preference created.");
    Ok(preference)
  }

  #[instrument(name = "mercadopago::get_payment", skip(self), err(Display))]
  async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ProviderError> {
    let response = self
      .http
      .get(self.payment_url(payment_id))
      .bearer_auth(&self.access_token)
      .send()
      .await?;
    Self::read_json(response).await
  }
}
