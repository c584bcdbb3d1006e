// storefront/src/models/payment.rs

use crate::errors::AppError;
use crate::models::cart::CartStatus;
use crate::models::order_item::OrderItemView;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use std::fmt;

/// Payment status vocabulary reported by Mercado Pago.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
  Approved,
  Pending,
  InProcess,
  InMediation,
  Rejected,
  Cancelled,
  Refunded,
  ChargedBack,
  Unknown(String),
}

impl ProviderStatus {
  pub fn as_str(&self) -> &str {
    match self {
      ProviderStatus::Approved => "approved",
      ProviderStatus::Pending => "pending",
      ProviderStatus::InProcess => "in_process",
      ProviderStatus::InMediation => "in_mediation",
      ProviderStatus::Rejected => "rejected",
      ProviderStatus::Cancelled => "cancelled",
      ProviderStatus::Refunded => "refunded",
      ProviderStatus::ChargedBack => "charged_back",
      ProviderStatus::Unknown(raw) => raw,
    }
  }
}

impl From<&str> for ProviderStatus {
  fn from(raw: &str) -> Self {
    match raw.trim() {
      "approved" => ProviderStatus::Approved,
      "pending" => ProviderStatus::Pending,
      "in_process" => ProviderStatus::InProcess,
      "in_mediation" => ProviderStatus::InMediation,
      "rejected" => ProviderStatus::Rejected,
      "cancelled" => ProviderStatus::Cancelled,
      "refunded" => ProviderStatus::Refunded,
      "charged_back" => ProviderStatus::ChargedBack,
      other => ProviderStatus::Unknown(other.to_string()),
    }
  }
}

impl fmt::Display for ProviderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for ProviderStatus {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

/// What a payment means for the order it pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalState {
  Paid,
  Reserved,
  Cancelled,
}

impl InternalState {
  pub fn as_str(&self) -> &'static str {
    match self {
      InternalState::Paid => "paid",
      InternalState::Reserved => "reserved",
      InternalState::Cancelled => "cancelled",
    }
  }

  /// Cart status written for non-paid outcomes. Paid carts are completed by fulfillment instead.
  pub fn mirrored_cart_status(&self) -> Option<CartStatus> {
    match self {
      InternalState::Paid => None,
      InternalState::Reserved => Some(CartStatus::Reserved),
      InternalState::Cancelled => Some(CartStatus::Cancelled),
    }
  }
}

/// Identifiers attached to the preference at checkout and echoed back by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentMetadata {
  pub user_id: i64,
  pub cart_id: i64,
  pub address_id: i64,
}

impl PaymentMetadata {
  /// Reads the metadata object, accepting ids as JSON numbers or numeric strings.
  pub fn from_json(metadata: Option<&JsonValue>) -> Result<Self, AppError> {
    let object = metadata
      .and_then(JsonValue::as_object)
      .ok_or_else(|| AppError::MissingMetadata("payment carries no metadata".to_string()))?;

    let read_id = |keys: &[&str]| -> Result<i64, AppError> {
      let value = keys
        .iter()
        .find_map(|k| object.get(*k).filter(|v| !v.is_null()))
        .ok_or_else(|| AppError::MissingMetadata(format!("'{}' is missing", keys[0])))?;
      parse_id(value).ok_or_else(|| AppError::MissingMetadata(format!("'{}' is not a valid id", keys[0])))
    };

    Ok(Self {
      user_id: read_id(&["user_id", "userId"])?,
      cart_id: read_id(&["cart_id", "cartId"])?,
      address_id: read_id(&["address_id", "addressId"])?,
    })
  }
}

fn parse_id(value: &JsonValue) -> Option<i64> {
  let id = match value {
    JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
    JsonValue::String(s) => s.trim().parse::<i64>().ok(),
    _ => None,
  }?;
  (id > 0).then_some(id)
}

/// A provider payment that passed validation; everything downstream trusts this shape.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
  pub mp_payment_id: String,
  pub status: ProviderStatus,
  pub status_detail: Option<String>,
  pub transaction_amount: Option<Decimal>,
  pub net_received_amount: Option<Decimal>,
  pub currency_id: Option<String>,
  pub payment_method: Option<String>,
  pub payment_type: Option<String>,
  pub installments: Option<i32>,
  pub payer_id: Option<String>,
  pub payer_email: Option<String>,
  pub metadata: PaymentMetadata,
  pub date_created: Option<DateTime<Utc>>,
  pub date_approved: Option<DateTime<Utc>>,
}

/// A row of the payment ledger.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
  pub payment_id: i64,
  pub mp_payment_id: String,
  pub status: String,
  pub status_detail: Option<String>,
  pub transaction_amount: Option<Decimal>,
  pub net_received_amount: Option<Decimal>,
  pub currency_id: Option<String>,
  pub payment_method: Option<String>,
  pub payment_type: Option<String>,
  pub installments: Option<i32>,
  pub payer_id: Option<String>,
  pub payer_email: Option<String>,
  pub user_id: Option<i64>,
  pub cart_id: Option<i64>,
  pub address_id: Option<i64>,
  pub date_created: Option<DateTime<Utc>>,
  pub date_approved: Option<DateTime<Utc>>,
  pub rejection_notified: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// The payment behind one of the caller's orders, with the order's items.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderPaymentSummary {
  pub order_id: i64,
  pub mp_payment_id: String,
  pub status: String,
  pub status_detail: Option<String>,
  pub transaction_amount: Option<Decimal>,
  pub net_received_amount: Option<Decimal>,
  pub currency_id: Option<String>,
  pub payment_method: Option<String>,
  pub installments: Option<i32>,
  pub date_created: Option<DateTime<Utc>>,
  pub date_approved: Option<DateTime<Utc>>,
  pub user_id: i64,
  pub user_name: String,
  pub user_email: String,
  #[sqlx(skip)]
  pub items: Vec<OrderItemView>,
}
