// storefront/src/models/cart.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "cart_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
  Active,
  Completed,
  Abandoned,
  Reserved,
  Cancelled,
}

impl CartStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      CartStatus::Active => "active",
      CartStatus::Completed => "completed",
      CartStatus::Abandoned => "abandoned",
      CartStatus::Reserved => "reserved",
      CartStatus::Cancelled => "cancelled",
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cart {
  pub cart_id: i64,
  pub user_id: i64,
  pub status: CartStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartItem {
  pub cart_id: i64,
  pub product_id: i64,
  pub quantity: i32,
  pub unit_price: Decimal,
}

/// One cart line joined with the live product row.
///
/// This is the only source of prices and quantities used for fulfillment;
/// anything the provider echoes back about items is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CartLine {
  pub product_id: i64,
  pub title: String,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub current_stock: i32,
}

impl CartLine {
  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}

/// Sum of all line totals.
pub fn snapshot_total(lines: &[CartLine]) -> Decimal {
  lines.iter().map(CartLine::line_total).sum()
}
