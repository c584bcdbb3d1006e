// storefront/src/store/postgres.rs

use super::{FulfillmentStore, FulfillmentTx};
use crate::errors::Result;
use crate::models::{
  Cart, CartLine, CartStatus, CustomerContact, NewOrder, Order, OrderItemView, OrderPaymentSummary, OrderStatus,
  PaymentEvent,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, instrument};

const CART_COLUMNS: &str = "cart_id, user_id, status, created_at, updated_at";

const CART_LINES_SQL: &str = "SELECT ci.product_id, p.name AS title, ci.quantity, ci.unit_price, p.stock AS current_stock \
   FROM cart_items ci \
   JOIN products p ON p.product_id = ci.product_id \
   WHERE ci.cart_id = $1 \
   ORDER BY ci.product_id";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

#[async_trait]
impl FulfillmentStore for PgStore {
  #[instrument(name = "pg::record_payment", skip(self, event), fields(mp_payment_id = %event.mp_payment_id))]
  async fn record_payment(&self, event: &PaymentEvent) -> Result<i64> {
    // Metadata, notification flags and created_at keep their first-seen values.
    let payment_id: i64 = sqlx::query_scalar(
      "INSERT INTO payments ( \
         mp_payment_id, status, status_detail, transaction_amount, net_received_amount, currency_id, \
         payment_method, payment_type, installments, payer_id, payer_email, user_id, cart_id, address_id, \
         date_created, date_approved, created_at, updated_at \
       ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW(), NOW()) \
       ON CONFLICT (mp_payment_id) DO UPDATE SET \
         status = EXCLUDED.status, \
         status_detail = EXCLUDED.status_detail, \
         transaction_amount = EXCLUDED.transaction_amount, \
         net_received_amount = EXCLUDED.net_received_amount, \
         currency_id = EXCLUDED.currency_id, \
         payment_method = EXCLUDED.payment_method, \
         payment_type = EXCLUDED.payment_type, \
         installments = EXCLUDED.installments, \
         date_approved = EXCLUDED.date_approved, \
         updated_at = NOW() \
       RETURNING payment_id",
    )
    .bind(&event.mp_payment_id)
    .bind(event.status.as_str())
    .bind(&event.status_detail)
    .bind(event.transaction_amount)
    .bind(event.net_received_amount)
    .bind(&event.currency_id)
    .bind(&event.payment_method)
    .bind(&event.payment_type)
    .bind(event.installments)
    .bind(&event.payer_id)
    .bind(&event.payer_email)
    .bind(event.metadata.user_id)
    .bind(event.metadata.cart_id)
    .bind(event.metadata.address_id)
    .bind(event.date_created)
    .bind(event.date_approved)
    .fetch_one(&self.pool)
    .await?;
    Ok(payment_id)
  }

  #[instrument(name = "pg::begin_fulfillment", skip(self))]
  async fn begin_fulfillment(&self, lock_timeout: Duration) -> Result<Box<dyn FulfillmentTx>> {
    let mut tx = self.pool.begin().await?;
    let millis = format!("{}ms", lock_timeout.as_millis().max(1));
    // Transaction-local; released with the transaction.
    sqlx::query("SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $1, true)")
      .bind(&millis)
      .execute(&mut *tx)
      .await?;
    debug!(timeout = %millis, "Fulfillment transaction opened.");
    Ok(Box::new(PgFulfillmentTx { tx }))
  }

  async fn mirror_cart_status(&self, cart_id: i64, status: CartStatus) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE carts SET status = $1, updated_at = NOW() \
       WHERE cart_id = $2 AND status <> 'completed' AND status <> $1",
    )
    .bind(status)
    .bind(cart_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn find_cart(&self, cart_id: i64) -> Result<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>(&format!("SELECT {} FROM carts WHERE cart_id = $1", CART_COLUMNS))
      .bind(cart_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(cart)
  }

  async fn find_active_cart(&self, user_id: i64) -> Result<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>(&format!(
      "SELECT {} FROM carts WHERE user_id = $1 AND status = 'active'",
      CART_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(cart)
  }

  async fn load_fulfillable_items(&self, cart_id: i64) -> Result<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(CART_LINES_SQL)
      .bind(cart_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(lines)
  }

  async fn address_belongs_to(&self, address_id: i64, user_id: i64) -> Result<bool> {
    let owned: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM addresses WHERE address_id = $1 AND user_id = $2)")
      .bind(address_id)
      .bind(user_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(owned)
  }

  async fn customer_contact(&self, user_id: i64) -> Result<Option<CustomerContact>> {
    let contact = sqlx::query_as::<_, CustomerContact>("SELECT name, email FROM users WHERE user_id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(contact)
  }

  async fn find_order(&self, order_id: i64) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
      "SELECT order_id, user_id, total, status, mp_payment_id, payment_id, address_id, notified, created_at, updated_at \
       FROM orders WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(order)
  }

  async fn claim_order_notification(&self, order_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE orders SET notified = TRUE, updated_at = NOW() WHERE order_id = $1 AND notified = FALSE")
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn release_order_notification(&self, order_id: i64) -> Result<()> {
    sqlx::query("UPDATE orders SET notified = FALSE, updated_at = NOW() WHERE order_id = $1")
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn claim_rejection_notification(&self, mp_payment_id: &str) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE payments SET rejection_notified = TRUE, updated_at = NOW() \
       WHERE mp_payment_id = $1 AND rejection_notified = FALSE",
    )
    .bind(mp_payment_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn release_rejection_notification(&self, mp_payment_id: &str) -> Result<()> {
    sqlx::query("UPDATE payments SET rejection_notified = FALSE, updated_at = NOW() WHERE mp_payment_id = $1")
      .bind(mp_payment_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(name = "pg::order_payment_summary", skip(self))]
  async fn order_payment_summary(&self, order_id: i64, user_id: i64) -> Result<Option<OrderPaymentSummary>> {
    let summary = sqlx::query_as::<_, OrderPaymentSummary>(
      "SELECT o.order_id, p.mp_payment_id, p.status, p.status_detail, p.transaction_amount, \
              p.net_received_amount, p.currency_id, p.payment_method, p.installments, \
              p.date_created, p.date_approved, u.user_id, u.name AS user_name, u.email AS user_email \
       FROM orders o \
       JOIN payments p ON p.mp_payment_id = o.mp_payment_id \
       JOIN users u ON u.user_id = o.user_id \
       WHERE o.order_id = $1 AND o.user_id = $2",
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;

    let Some(mut summary) = summary else {
      return Ok(None);
    };
    summary.items = sqlx::query_as::<_, OrderItemView>(
      "SELECT oi.product_id, pr.name, oi.quantity, oi.price \
       FROM order_items oi \
       JOIN products pr ON pr.product_id = oi.product_id \
       WHERE oi.order_id = $1 \
       ORDER BY oi.product_id",
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(Some(summary))
  }

  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE order_id = $2")
      .bind(status)
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }
}

/// Dropping this without `commit` rolls the transaction back.
pub struct PgFulfillmentTx {
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FulfillmentTx for PgFulfillmentTx {
  async fn lock_payment(&mut self, mp_payment_id: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT payment_id FROM payments WHERE mp_payment_id = $1 FOR UPDATE")
      .bind(mp_payment_id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(id)
  }

  async fn find_order_for_payment(&mut self, mp_payment_id: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT order_id FROM orders WHERE mp_payment_id = $1")
      .bind(mp_payment_id)
      .fetch_optional(&mut *self.tx)
      .await?;
    Ok(id)
  }

  async fn lock_cart(&mut self, cart_id: i64) -> Result<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>(&format!(
      "SELECT {} FROM carts WHERE cart_id = $1 FOR UPDATE",
      CART_COLUMNS
    ))
    .bind(cart_id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(cart)
  }

  async fn load_fulfillable_items(&mut self, cart_id: i64) -> Result<Vec<CartLine>> {
    // Locks product rows in product_id order so concurrent fulfillments cannot deadlock.
    let lines = sqlx::query_as::<_, CartLine>(&format!("{} FOR UPDATE OF p", CART_LINES_SQL))
      .bind(cart_id)
      .fetch_all(&mut *self.tx)
      .await?;
    Ok(lines)
  }

  async fn insert_order(&mut self, order: &NewOrder) -> Result<Option<i64>> {
    let id = sqlx::query_scalar(
      "INSERT INTO orders (user_id, total, status, mp_payment_id, payment_id, address_id, notified, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW(), NOW()) \
       ON CONFLICT (mp_payment_id) DO NOTHING \
       RETURNING order_id",
    )
    .bind(order.user_id)
    .bind(order.total)
    .bind(OrderStatus::Paid)
    .bind(&order.mp_payment_id)
    .bind(order.payment_id)
    .bind(order.address_id)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(id)
  }

  async fn insert_order_items(&mut self, order_id: i64, lines: &[CartLine]) -> Result<()> {
    let product_ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
    let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
    let prices: Vec<rust_decimal::Decimal> = lines.iter().map(|l| l.unit_price).collect();
    sqlx::query(
      "INSERT INTO order_items (order_id, product_id, quantity, price) \
       SELECT $1, * FROM UNNEST($2::BIGINT[], $3::INTEGER[], $4::NUMERIC[])",
    )
    .bind(order_id)
    .bind(&product_ids)
    .bind(&quantities)
    .bind(&prices)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE product_id = $2 AND stock >= $1",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(&mut *self.tx)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn complete_cart(&mut self, cart_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
      .bind(cart_id)
      .execute(&mut *self.tx)
      .await?;
    sqlx::query("UPDATE carts SET status = 'completed', updated_at = NOW() WHERE cart_id = $1")
      .bind(cart_id)
      .execute(&mut *self.tx)
      .await?;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    self.tx.commit().await?;
    Ok(())
  }
}
