// storefront/src/models/order_item.rs

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Immutable copy of a cart line taken at fulfillment time.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OrderItem {
  pub order_id: i64,
  pub product_id: i64,
  pub quantity: i32,
  pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItemView {
  pub product_id: i64,
  pub name: String,
  pub quantity: i32,
  pub price: Decimal,
}
