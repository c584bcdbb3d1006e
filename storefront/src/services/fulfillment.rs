// storefront/src/services/fulfillment.rs

//! Turns a validated payment event into an order, or mirrors a non-final
//! outcome onto the cart.

use crate::errors::{AppError, Result as AppResult};
use crate::models::cart::snapshot_total;
use crate::models::{CartStatus, InternalState, NewOrder, PaymentEvent};
use crate::store::FulfillmentStore;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FulfillmentOutcome {
  OrderCreated { order_id: i64, total: Decimal },
  /// An order for this provider payment already existed; nothing was changed.
  AlreadyFulfilled { order_id: i64 },
  CartUpdated { cart_id: i64, status: CartStatus },
  /// Late notification for a cart that is already completed, or already in that status.
  CartUnchanged { cart_id: i64 },
}

impl FulfillmentOutcome {
  pub fn order_id(&self) -> Option<i64> {
    match self {
      FulfillmentOutcome::OrderCreated { order_id, .. } | FulfillmentOutcome::AlreadyFulfilled { order_id } => {
        Some(*order_id)
      }
      _ => None,
    }
  }
}

/// Applies `state` for `event`.
///
/// `Paid` runs one transaction bounded by `tx_timeout`; on timeout the
/// transaction is dropped, which rolls it back.
#[instrument(
  name = "fulfillment::fulfill",
  skip(store, event),
  fields(mp_payment_id = %event.mp_payment_id, cart_id = event.metadata.cart_id),
  err(Display)
)]
pub async fn fulfill(
  store: &dyn FulfillmentStore,
  event: &PaymentEvent,
  state: InternalState,
  tx_timeout: Duration,
) -> AppResult<FulfillmentOutcome> {
  match state {
    InternalState::Paid => tokio::time::timeout(tx_timeout, fulfill_paid(store, event, tx_timeout))
      .await
      .map_err(|_| {
        warn!(timeout_secs = tx_timeout.as_secs_f64(), "Fulfillment transaction timed out, rolled back.");
        AppError::Timeout(format!(
          "fulfillment of payment {} exceeded {:?}",
          event.mp_payment_id, tx_timeout
        ))
      })?,
    InternalState::Reserved | InternalState::Cancelled => {
      let cart_id = event.metadata.cart_id;
      let Some(status) = state.mirrored_cart_status() else {
        return Ok(FulfillmentOutcome::CartUnchanged { cart_id });
      };
      if store.mirror_cart_status(cart_id, status).await? {
        info!(cart_status = status.as_str(), "Cart status mirrored from payment.");
        Ok(FulfillmentOutcome::CartUpdated { cart_id, status })
      } else {
        info!(cart_status = status.as_str(), "Cart left unchanged (completed, missing or already in status).");
        Ok(FulfillmentOutcome::CartUnchanged { cart_id })
      }
    }
  }
}

async fn fulfill_paid(
  store: &dyn FulfillmentStore,
  event: &PaymentEvent,
  lock_timeout: Duration,
) -> AppResult<FulfillmentOutcome> {
  let meta = event.metadata;
  let mut tx = store.begin_fulfillment(lock_timeout).await?;

  // Serialises concurrent deliveries of the same payment.
  let payment_row_id = tx.lock_payment(&event.mp_payment_id).await?.ok_or_else(|| {
    AppError::Internal(format!(
      "payment {} must be recorded before fulfillment",
      event.mp_payment_id
    ))
  })?;

  if let Some(order_id) = tx.find_order_for_payment(&event.mp_payment_id).await? {
    info!(order_id, "Payment already fulfilled; nothing to do.");
    return Ok(FulfillmentOutcome::AlreadyFulfilled { order_id });
  }

  let cart = tx
    .lock_cart(meta.cart_id)
    .await?
    .ok_or_else(|| AppError::CartNotFulfillable(format!("cart {} does not exist", meta.cart_id)))?;
  if cart.user_id != meta.user_id {
    return Err(AppError::CartNotFulfillable(format!(
      "cart {} does not belong to user {}",
      cart.cart_id, meta.user_id
    )));
  }
  if cart.status == CartStatus::Completed {
    return Err(AppError::CartNotFulfillable(format!(
      "cart {} was already turned into another order",
      cart.cart_id
    )));
  }

  let lines = tx.load_fulfillable_items(cart.cart_id).await?;
  if lines.is_empty() {
    return Err(AppError::CartNotFulfillable(format!("cart {} has no items", cart.cart_id)));
  }
  let total = snapshot_total(&lines);
  if let Some(reported) = event.transaction_amount {
    if reported != total {
      warn!(%reported, computed = %total, "Provider amount differs from cart snapshot; using the snapshot.");
    }
  }

  let new_order = NewOrder {
    user_id: meta.user_id,
    total,
    mp_payment_id: event.mp_payment_id.clone(),
    payment_id: payment_row_id,
    address_id: meta.address_id,
  };
  let Some(order_id) = tx.insert_order(&new_order).await? else {
    let order_id = tx.find_order_for_payment(&event.mp_payment_id).await?.ok_or_else(|| {
      AppError::Internal("order insert conflicted but no order references the payment".to_string())
    })?;
    return Ok(FulfillmentOutcome::AlreadyFulfilled { order_id });
  };

  tx.insert_order_items(order_id, &lines).await?;

  for line in &lines {
    if !tx.decrement_stock(line.product_id, line.quantity).await? {
      warn!(
        product_id = line.product_id,
        requested = line.quantity,
        "Insufficient stock; rolling back fulfillment."
      );
      return Err(AppError::StockConflict {
        product_id: line.product_id,
        requested: line.quantity,
      });
    }
  }

  tx.complete_cart(cart.cart_id).await?;
  tx.commit().await?;

  info!(order_id, %total, items = lines.len(), "Order created from cart.");
  Ok(FulfillmentOutcome::OrderCreated { order_id, total })
}
