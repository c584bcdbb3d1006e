// storefront/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Paid,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Paid => "paid",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pending" => Ok(OrderStatus::Pending),
      "paid" => Ok(OrderStatus::Paid),
      "shipped" => Ok(OrderStatus::Shipped),
      "delivered" => Ok(OrderStatus::Delivered),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub order_id: i64,
  pub user_id: i64,
  pub total: Decimal,
  pub status: OrderStatus,
  pub mp_payment_id: Option<String>,
  pub payment_id: Option<i64>,
  pub address_id: Option<i64>,
  pub notified: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Values for the order row written by fulfillment.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub user_id: i64,
  pub total: Decimal,
  pub mp_payment_id: String,
  pub payment_id: i64,
  pub address_id: i64,
}
