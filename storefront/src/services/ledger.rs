// storefront/src/services/ledger.rs

use crate::errors::Result as AppResult;
use crate::models::PaymentEvent;
use crate::store::FulfillmentStore;
use tracing::{info, instrument};

/// Records a provider payment, keyed by its provider id.
///
/// Redelivery refreshes status and amounts on the same row; it never creates
/// a second row and never resets notification flags.
#[instrument(
  name = "ledger::record_payment",
  skip(store, event),
  fields(mp_payment_id = %event.mp_payment_id, status = %event.status),
  err(Display)
)]
pub async fn record_payment(store: &dyn FulfillmentStore, event: &PaymentEvent) -> AppResult<i64> {
  let payment_row_id = store.record_payment(event).await?;
  info!(payment_row_id, "Payment recorded in ledger.");
  Ok(payment_row_id)
}
