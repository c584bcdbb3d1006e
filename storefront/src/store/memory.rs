// storefront/src/store/memory.rs

//! In-process `FulfillmentStore` used by tests and local runs without Postgres.
//!
//! A transaction holds the state lock for its whole lifetime and works on a
//! copy of the state; `commit` swaps the copy in, dropping discards it.

use super::{FulfillmentStore, FulfillmentTx};
use crate::errors::Result;
use crate::models::{
  Address, Cart, CartItem, CartLine, CartStatus, CustomerContact, NewOrder, Order, OrderItem, OrderItemView,
  OrderPaymentSummary, OrderStatus, Payment, PaymentEvent, Product, User,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
  pub users: HashMap<i64, User>,
  pub addresses: HashMap<i64, Address>,
  pub products: BTreeMap<i64, Product>,
  pub carts: HashMap<i64, Cart>,
  pub cart_items: BTreeMap<(i64, i64), CartItem>,
  pub payments: BTreeMap<String, Payment>,
  pub orders: BTreeMap<i64, Order>,
  pub order_items: Vec<OrderItem>,
  next_id: i64,
}

impl MemoryState {
  fn next_id(&mut self) -> i64 {
    self.next_id += 1;
    self.next_id
  }

  fn cart_lines(&self, cart_id: i64) -> Vec<CartLine> {
    // BTreeMap keys are (cart_id, product_id), so this is already product_id ordered.
    self
      .cart_items
      .range((cart_id, i64::MIN)..=(cart_id, i64::MAX))
      .filter_map(|(_, item)| {
        self.products.get(&item.product_id).map(|product| CartLine {
          product_id: item.product_id,
          title: product.name.clone(),
          quantity: item.quantity,
          unit_price: item.unit_price,
          current_stock: product.stock,
        })
      })
      .collect()
  }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn snapshot(&self) -> MemoryState {
    self.state.lock().await.clone()
  }

  pub async fn seed_user(&self, name: &str, email: &str) -> i64 {
    let mut state = self.state.lock().await;
    let user_id = state.next_id();
    state.users.insert(
      user_id,
      User {
        user_id,
        name: name.to_string(),
        email: email.to_string(),
        role: "user".to_string(),
      },
    );
    user_id
  }

  pub async fn seed_address(&self, user_id: i64) -> i64 {
    let mut state = self.state.lock().await;
    let address_id = state.next_id();
    state.addresses.insert(address_id, Address { address_id, user_id });
    address_id
  }

  pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> i64 {
    let mut state = self.state.lock().await;
    let product_id = state.next_id();
    let now = Utc::now();
    state.products.insert(
      product_id,
      Product {
        product_id,
        name: name.to_string(),
        price,
        stock,
        created_at: now,
        updated_at: now,
      },
    );
    product_id
  }

  /// Creates a cart with `(product_id, quantity, unit_price)` lines.
  pub async fn seed_cart(&self, user_id: i64, status: CartStatus, items: &[(i64, i32, Decimal)]) -> i64 {
    let mut state = self.state.lock().await;
    let cart_id = state.next_id();
    let now = Utc::now();
    state.carts.insert(
      cart_id,
      Cart {
        cart_id,
        user_id,
        status,
        created_at: now,
        updated_at: now,
      },
    );
    for (product_id, quantity, unit_price) in items {
      state.cart_items.insert(
        (cart_id, *product_id),
        CartItem {
          cart_id,
          product_id: *product_id,
          quantity: *quantity,
          unit_price: *unit_price,
        },
      );
    }
    cart_id
  }

  pub async fn product_stock(&self, product_id: i64) -> Option<i32> {
    self.state.lock().await.products.get(&product_id).map(|p| p.stock)
  }

  pub async fn cart_status(&self, cart_id: i64) -> Option<CartStatus> {
    self.state.lock().await.carts.get(&cart_id).map(|c| c.status)
  }

  pub async fn payment(&self, mp_payment_id: &str) -> Option<Payment> {
    self.state.lock().await.payments.get(mp_payment_id).cloned()
  }

  pub async fn orders_for_payment(&self, mp_payment_id: &str) -> Vec<Order> {
    let state = self.state.lock().await;
    state
      .orders
      .values()
      .filter(|o| o.mp_payment_id.as_deref() == Some(mp_payment_id))
      .cloned()
      .collect()
  }

  pub async fn cart_item_count(&self, cart_id: i64) -> usize {
    let state = self.state.lock().await;
    state.cart_items.keys().filter(|(owner, _)| *owner == cart_id).count()
  }

  pub async fn order_items(&self, order_id: i64) -> Vec<OrderItem> {
    let state = self.state.lock().await;
    state.order_items.iter().filter(|i| i.order_id == order_id).cloned().collect()
  }
}

#[async_trait]
impl FulfillmentStore for MemoryStore {
  async fn record_payment(&self, event: &PaymentEvent) -> Result<i64> {
    let mut state = self.state.lock().await;
    let now = Utc::now();
    if let Some(existing) = state.payments.get_mut(&event.mp_payment_id) {
      existing.status = event.status.as_str().to_string();
      existing.status_detail = event.status_detail.clone();
      existing.transaction_amount = event.transaction_amount;
      existing.net_received_amount = event.net_received_amount;
      existing.currency_id = event.currency_id.clone();
      existing.payment_method = event.payment_method.clone();
      existing.payment_type = event.payment_type.clone();
      existing.installments = event.installments;
      existing.date_approved = event.date_approved;
      existing.updated_at = now;
      return Ok(existing.payment_id);
    }

    let payment_id = state.next_id();
    state.payments.insert(
      event.mp_payment_id.clone(),
      Payment {
        payment_id,
        mp_payment_id: event.mp_payment_id.clone(),
        status: event.status.as_str().to_string(),
        status_detail: event.status_detail.clone(),
        transaction_amount: event.transaction_amount,
        net_received_amount: event.net_received_amount,
        currency_id: event.currency_id.clone(),
        payment_method: event.payment_method.clone(),
        payment_type: event.payment_type.clone(),
        installments: event.installments,
        payer_id: event.payer_id.clone(),
        payer_email: event.payer_email.clone(),
        user_id: Some(event.metadata.user_id),
        cart_id: Some(event.metadata.cart_id),
        address_id: Some(event.metadata.address_id),
        date_created: event.date_created,
        date_approved: event.date_approved,
        rejection_notified: false,
        created_at: now,
        updated_at: now,
      },
    );
    Ok(payment_id)
  }

  async fn begin_fulfillment(&self, _lock_timeout: Duration) -> Result<Box<dyn FulfillmentTx>> {
    let guard = Arc::clone(&self.state).lock_owned().await;
    let working = guard.clone();
    Ok(Box::new(MemoryTx { guard, working }))
  }

  async fn mirror_cart_status(&self, cart_id: i64, status: CartStatus) -> Result<bool> {
    let mut state = self.state.lock().await;
    match state.carts.get_mut(&cart_id) {
      Some(cart) if cart.status != CartStatus::Completed && cart.status != status => {
        cart.status = status;
        cart.updated_at = Utc::now();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn find_cart(&self, cart_id: i64) -> Result<Option<Cart>> {
    Ok(self.state.lock().await.carts.get(&cart_id).cloned())
  }

  async fn find_active_cart(&self, user_id: i64) -> Result<Option<Cart>> {
    let state = self.state.lock().await;
    Ok(
      state
        .carts
        .values()
        .find(|c| c.user_id == user_id && c.status == CartStatus::Active)
        .cloned(),
    )
  }

  async fn load_fulfillable_items(&self, cart_id: i64) -> Result<Vec<CartLine>> {
    Ok(self.state.lock().await.cart_lines(cart_id))
  }

  async fn address_belongs_to(&self, address_id: i64, user_id: i64) -> Result<bool> {
    let state = self.state.lock().await;
    Ok(state.addresses.get(&address_id).is_some_and(|a| a.user_id == user_id))
  }

  async fn customer_contact(&self, user_id: i64) -> Result<Option<CustomerContact>> {
    let state = self.state.lock().await;
    Ok(state.users.get(&user_id).map(|u| CustomerContact {
      name: u.name.clone(),
      email: u.email.clone(),
    }))
  }

  async fn find_order(&self, order_id: i64) -> Result<Option<Order>> {
    Ok(self.state.lock().await.orders.get(&order_id).cloned())
  }

  async fn claim_order_notification(&self, order_id: i64) -> Result<bool> {
    let mut state = self.state.lock().await;
    match state.orders.get_mut(&order_id) {
      Some(order) if !order.notified => {
        order.notified = true;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn release_order_notification(&self, order_id: i64) -> Result<()> {
    if let Some(order) = self.state.lock().await.orders.get_mut(&order_id) {
      order.notified = false;
    }
    Ok(())
  }

  async fn claim_rejection_notification(&self, mp_payment_id: &str) -> Result<bool> {
    let mut state = self.state.lock().await;
    match state.payments.get_mut(mp_payment_id) {
      Some(payment) if !payment.rejection_notified => {
        payment.rejection_notified = true;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn release_rejection_notification(&self, mp_payment_id: &str) -> Result<()> {
    if let Some(payment) = self.state.lock().await.payments.get_mut(mp_payment_id) {
      payment.rejection_notified = false;
    }
    Ok(())
  }

  async fn order_payment_summary(&self, order_id: i64, user_id: i64) -> Result<Option<OrderPaymentSummary>> {
    let state = self.state.lock().await;
    let Some(order) = state.orders.get(&order_id).filter(|o| o.user_id == user_id) else {
      return Ok(None);
    };
    let Some(payment) = order.mp_payment_id.as_deref().and_then(|id| state.payments.get(id)) else {
      return Ok(None);
    };
    let Some(user) = state.users.get(&order.user_id) else {
      return Ok(None);
    };
    let items = state
      .order_items
      .iter()
      .filter(|i| i.order_id == order_id)
      .map(|i| OrderItemView {
        product_id: i.product_id,
        name: state
          .products
          .get(&i.product_id)
          .map(|p| p.name.clone())
          .unwrap_or_default(),
        quantity: i.quantity,
        price: i.price,
      })
      .collect();

    Ok(Some(OrderPaymentSummary {
      order_id,
      mp_payment_id: payment.mp_payment_id.clone(),
      status: payment.status.clone(),
      status_detail: payment.status_detail.clone(),
      transaction_amount: payment.transaction_amount,
      net_received_amount: payment.net_received_amount,
      currency_id: payment.currency_id.clone(),
      payment_method: payment.payment_method.clone(),
      installments: payment.installments,
      date_created: payment.date_created,
      date_approved: payment.date_approved,
      user_id: user.user_id,
      user_name: user.name.clone(),
      user_email: user.email.clone(),
      items,
    }))
  }

  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<bool> {
    let mut state = self.state.lock().await;
    match state.orders.get_mut(&order_id) {
      Some(order) => {
        order.status = status;
        order.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }
}

pub struct MemoryTx {
  guard: OwnedMutexGuard<MemoryState>,
  working: MemoryState,
}

#[async_trait]
impl FulfillmentTx for MemoryTx {
  async fn lock_payment(&mut self, mp_payment_id: &str) -> Result<Option<i64>> {
    Ok(self.working.payments.get(mp_payment_id).map(|p| p.payment_id))
  }

  async fn find_order_for_payment(&mut self, mp_payment_id: &str) -> Result<Option<i64>> {
    Ok(
      self
        .working
        .orders
        .values()
        .find(|o| o.mp_payment_id.as_deref() == Some(mp_payment_id))
        .map(|o| o.order_id),
    )
  }

  async fn lock_cart(&mut self, cart_id: i64) -> Result<Option<Cart>> {
    Ok(self.working.carts.get(&cart_id).cloned())
  }

  async fn load_fulfillable_items(&mut self, cart_id: i64) -> Result<Vec<CartLine>> {
    Ok(self.working.cart_lines(cart_id))
  }

  async fn insert_order(&mut self, order: &NewOrder) -> Result<Option<i64>> {
    let taken = self
      .working
      .orders
      .values()
      .any(|o| o.mp_payment_id.as_deref() == Some(order.mp_payment_id.as_str()));
    if taken {
      return Ok(None);
    }
    let order_id = self.working.next_id();
    let now = Utc::now();
    self.working.orders.insert(
      order_id,
      Order {
        order_id,
        user_id: order.user_id,
        total: order.total,
        status: OrderStatus::Paid,
        mp_payment_id: Some(order.mp_payment_id.clone()),
        payment_id: Some(order.payment_id),
        address_id: Some(order.address_id),
        notified: false,
        created_at: now,
        updated_at: now,
      },
    );
    Ok(Some(order_id))
  }

  async fn insert_order_items(&mut self, order_id: i64, lines: &[CartLine]) -> Result<()> {
    self.working.order_items.extend(lines.iter().map(|line| OrderItem {
      order_id,
      product_id: line.product_id,
      quantity: line.quantity,
      price: line.unit_price,
    }));
    Ok(())
  }

  async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<bool> {
    match self.working.products.get_mut(&product_id) {
      Some(product) if product.stock >= quantity => {
        product.stock -= quantity;
        product.updated_at = Utc::now();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn complete_cart(&mut self, cart_id: i64) -> Result<()> {
    self.working.cart_items.retain(|(owner, _), _| *owner != cart_id);
    if let Some(cart) = self.working.carts.get_mut(&cart_id) {
      cart.status = CartStatus::Completed;
      cart.updated_at = Utc::now();
    }
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let MemoryTx { mut guard, working } = *self;
    *guard = working;
    Ok(())
  }
}
