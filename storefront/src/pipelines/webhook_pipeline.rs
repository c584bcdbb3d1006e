// storefront/src/pipelines/webhook_pipeline.rs

//! Mercado Pago payment notifications: verify, fetch, record, map, fulfill, notify.

use crate::errors::{AppError, Result as AppResult};
use crate::models::InternalState;
use crate::pipelines::contexts::WebhookCtxData;
use crate::services::fulfillment;
use crate::services::ledger;
use crate::services::notifier::{notify_once, NotificationTarget, NotifyOutcome};
use crate::services::signature::{verify, Verification};
use crate::services::status_mapper::map_status;
use std::sync::Arc;
use stepline::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use tracing::{error, info, instrument, warn};

pub fn register_webhook_pipeline(registry: &Registry<AppError>) {
  // Reserved outcomes are not terminal; nobody is emailed.
  let skip_unless_terminal: SkipCondition<WebhookCtxData> = Arc::new(|ctx: ContextData<WebhookCtxData>| {
    ctx.with(|data| !matches!(data.internal_state, Some(InternalState::Paid | InternalState::Cancelled)))
  });

  let mut p = Pipeline::<WebhookCtxData, AppError>::new(&[
    ("verify_signature", false, None),
    ("fetch_payment", false, None),
    ("record_payment", false, None),
    ("map_status", false, None),
    ("fulfill_order", false, None),
    ("notify_customer", true, Some(skip_unless_terminal)),
  ]);

  p.on_root("verify_signature", verify_signature);
  p.on_root("fetch_payment", fetch_payment);
  p.on_root("record_payment", record_payment);
  p.on_root("map_status", map_internal_state);
  p.on_root("fulfill_order", fulfill_order);
  p.on_root("notify_customer", notify_customer);

  registry.register_pipeline(p);
  info!("Mercado Pago webhook pipeline registered.");
}

fn missing(field: &str) -> AppError {
  AppError::Internal(format!("webhook context has no {} at this step", field))
}

#[instrument(name = "webhook::verify_signature", skip_all)]
async fn verify_signature(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let verification = ctx.with(|data| verify(&data.signature, &data.app_state.config.mercadopago.webhook_secret));
  ctx.update(|data| data.verification = Some(verification.clone()));

  match verification {
    Verification::Ignored { kind } => {
      info!(kind = %kind, "Notification is not about a payment; acknowledged and ignored.");
      Ok(PipelineControl::Stop)
    }
    Verification::Invalid { reason } => {
      warn!(reason = %reason, "Webhook signature rejected.");
      Err(AppError::SignatureRejected(reason))
    }
    Verification::Valid { payment_id } => {
      info!(payment_id = %payment_id, "Webhook signature verified.");
      Ok(PipelineControl::Continue)
    }
  }
}

/// Reads the payment from the provider; the delivery body is never trusted for amounts or items.
#[instrument(name = "webhook::fetch_payment", skip_all)]
async fn fetch_payment(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let (provider, payment_id) = ctx.with(|data| {
    let payment_id = match &data.verification {
      Some(Verification::Valid { payment_id }) => Some(payment_id.clone()),
      _ => None,
    };
    (data.app_state.provider.clone(), payment_id)
  });
  let payment_id = payment_id.ok_or_else(|| missing("verified payment id"))?;

  let payment = provider.get_payment(&payment_id).await.map_err(|e| {
    error!(payment_id = %payment_id, error = %e, "Payment lookup failed.");
    AppError::Provider(e.to_string())
  })?;

  // Metadata is validated here, before anything is written.
  let event = payment.into_event()?;
  info!(
    payment_id = %event.mp_payment_id,
    status = %event.status,
    cart_id = event.metadata.cart_id,
    "Payment fetched from provider."
  );
  ctx.update(|data| data.payment = Some(event));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "webhook::record_payment", skip_all)]
async fn record_payment(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let (store, event) = ctx.with(|data| (data.app_state.store.clone(), data.payment.clone()));
  let event = event.ok_or_else(|| missing("payment"))?;

  ledger::record_payment(store.as_ref(), &event).await?;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "webhook::map_status", skip_all)]
async fn map_internal_state(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let state = ctx.with(|data| {
    data
      .payment
      .as_ref()
      .map(|event| map_status(&event.status, event.status_detail.as_deref()))
  });
  let state = state.ok_or_else(|| missing("payment"))?;
  info!(internal_state = state.as_str(), "Payment status mapped.");
  ctx.update(|data| data.internal_state = Some(state));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "webhook::fulfill_order", skip_all)]
async fn fulfill_order(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  let (store, timeout, event, state) = ctx.with(|data| {
    (
      data.app_state.store.clone(),
      data.app_state.config.fulfillment_tx_timeout,
      data.payment.clone(),
      data.internal_state,
    )
  });
  let event = event.ok_or_else(|| missing("payment"))?;
  let state = state.ok_or_else(|| missing("internal state"))?;

  let outcome = fulfillment::fulfill(store.as_ref(), &event, state, timeout).await?;
  ctx.update(|data| data.outcome = Some(outcome));
  Ok(PipelineControl::Continue)
}

/// Emails the customer once per terminal outcome. Failures here never fail the delivery.
#[instrument(name = "webhook::notify_customer", skip_all)]
async fn notify_customer(ctx: ContextData<WebhookCtxData>) -> AppResult<PipelineControl> {
  match dispatch_notification(&ctx).await {
    Ok(Some(outcome)) => ctx.update(|data| data.notification = Some(outcome)),
    Ok(None) => {}
    Err(e) => error!(error = %e, "Customer notification failed; delivery still acknowledged."),
  }
  Ok(PipelineControl::Continue)
}

async fn dispatch_notification(ctx: &ContextData<WebhookCtxData>) -> AppResult<Option<NotifyOutcome>> {
  let (app_state, event, state, order_id) = ctx.with(|data| {
    (
      data.app_state.clone(),
      data.payment.clone(),
      data.internal_state,
      data.outcome.as_ref().and_then(|outcome| outcome.order_id()),
    )
  });
  let event = event.ok_or_else(|| missing("payment"))?;

  let target = match state {
    Some(InternalState::Paid) => {
      let Some(order_id) = order_id else {
        return Ok(None);
      };
      let Some(order) = app_state.store.find_order(order_id).await? else {
        warn!(order_id, "Fulfilled order not found for notification.");
        return Ok(None);
      };
      NotificationTarget::Approved {
        order_id: order.order_id,
        user_id: order.user_id,
        total: order.total,
      }
    }
    Some(InternalState::Cancelled) => NotificationTarget::Rejected {
      mp_payment_id: event.mp_payment_id.clone(),
      user_id: event.metadata.user_id,
    },
    Some(InternalState::Reserved) | None => return Ok(None),
  };

  let outcome = notify_once(
    app_state.store.as_ref(),
    app_state.mailer.as_ref(),
    &app_state.config,
    &target,
    event.payer_email.as_deref(),
  )
  .await?;
  Ok(Some(outcome))
}
