// storefront/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub product_id: i64,
  pub name: String,
  pub price: Decimal,
  /// Never negative; enforced by a CHECK constraint and guarded decrements.
  pub stock: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
