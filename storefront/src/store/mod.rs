// storefront/src/store/mod.rs

//! Persistence seam for the fulfillment core.
//!
//! `FulfillmentStore` covers single-statement operations; multi-step order
//! creation goes through a `FulfillmentTx`, which rolls back when dropped
//! without `commit`.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{
  Cart, CartLine, CartStatus, CustomerContact, NewOrder, Order, OrderPaymentSummary, OrderStatus, PaymentEvent,
};
use async_trait::async_trait;
use std::time::Duration;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait FulfillmentStore: Send + Sync {
  /// Upserts the ledger row for `event.mp_payment_id` and returns its row id.
  async fn record_payment(&self, event: &PaymentEvent) -> Result<i64>;

  /// Opens the order-creation transaction. `lock_timeout` bounds every row-lock wait inside it.
  async fn begin_fulfillment(&self, lock_timeout: Duration) -> Result<Box<dyn FulfillmentTx>>;

  /// Sets the cart status unless the cart is already completed. Returns whether a row changed.
  async fn mirror_cart_status(&self, cart_id: i64, status: CartStatus) -> Result<bool>;

  async fn find_cart(&self, cart_id: i64) -> Result<Option<Cart>>;

  async fn find_active_cart(&self, user_id: i64) -> Result<Option<Cart>>;

  async fn load_fulfillable_items(&self, cart_id: i64) -> Result<Vec<CartLine>>;

  async fn address_belongs_to(&self, address_id: i64, user_id: i64) -> Result<bool>;

  async fn customer_contact(&self, user_id: i64) -> Result<Option<CustomerContact>>;

  async fn find_order(&self, order_id: i64) -> Result<Option<Order>>;

  /// Flips `orders.notified` from false to true. `false` means someone already claimed it.
  async fn claim_order_notification(&self, order_id: i64) -> Result<bool>;

  async fn release_order_notification(&self, order_id: i64) -> Result<()>;

  /// Flips `payments.rejection_notified` from false to true.
  async fn claim_rejection_notification(&self, mp_payment_id: &str) -> Result<bool>;

  async fn release_rejection_notification(&self, mp_payment_id: &str) -> Result<()>;

  async fn order_payment_summary(&self, order_id: i64, user_id: i64) -> Result<Option<OrderPaymentSummary>>;

  /// Returns `false` when no such order exists.
  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<bool>;
}

#[async_trait]
pub trait FulfillmentTx: Send {
  /// Locks the ledger row for the payment; `None` if it was never recorded.
  async fn lock_payment(&mut self, mp_payment_id: &str) -> Result<Option<i64>>;

  async fn find_order_for_payment(&mut self, mp_payment_id: &str) -> Result<Option<i64>>;

  async fn lock_cart(&mut self, cart_id: i64) -> Result<Option<Cart>>;

  /// Snapshot of the cart ordered by `product_id`, with the product rows locked.
  async fn load_fulfillable_items(&mut self, cart_id: i64) -> Result<Vec<CartLine>>;

  /// `None` when an order for the same provider payment already exists.
  async fn insert_order(&mut self, order: &NewOrder) -> Result<Option<i64>>;

  async fn insert_order_items(&mut self, order_id: i64, lines: &[CartLine]) -> Result<()>;

  /// Decrements stock only if at least `quantity` is available. Returns whether it did.
  async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<bool>;

  /// Marks the cart completed and deletes its items.
  async fn complete_cart(&mut self, cart_id: i64) -> Result<()>;

  async fn commit(self: Box<Self>) -> Result<()>;
}
