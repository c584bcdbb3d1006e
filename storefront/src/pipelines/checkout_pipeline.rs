// storefront/src/pipelines/checkout_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{CartStatus, PaymentMetadata};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::preference::{build_preference_request, redirect_target};
use stepline::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{error, info, instrument};

pub fn register_checkout_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("resolve_cart", false, None),
    ("load_cart_snapshot", false, None),
    ("build_preference", false, None),
    ("create_preference", false, None),
  ]);

  p.on_root("resolve_cart", resolve_cart);
  p.on_root("load_cart_snapshot", load_cart_snapshot);
  p.on_root("build_preference", build_preference);
  p.on_root("create_preference", create_preference);

  registry.register_pipeline(p);
  info!("Checkout pipeline registered.");
}

/// Finds the buyer's active cart and checks the shipping address belongs to them.
#[instrument(name = "checkout::resolve_cart", skip_all)]
async fn resolve_cart(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (store, user_id, requested_cart_id, address_id) = ctx.with(|data| {
    (
      data.app_state.store.clone(),
      data.user_id,
      data.requested_cart_id,
      data.address_id,
    )
  });

  let cart = match requested_cart_id {
    Some(cart_id) => store
      .find_cart(cart_id)
      .await?
      .filter(|cart| cart.user_id == user_id)
      .ok_or_else(|| AppError::CartNotFound(format!("cart {} not found", cart_id)))?,
    None => store
      .find_active_cart(user_id)
      .await?
      .ok_or_else(|| AppError::CartNotFound("no active cart".to_string()))?,
  };
  if cart.status != CartStatus::Active {
    return Err(AppError::CartNotFound(format!(
      "cart {} is {}, not active",
      cart.cart_id,
      cart.status.as_str()
    )));
  }

  if !store.address_belongs_to(address_id, user_id).await? {
    return Err(AppError::InvalidAddress(format!(
      "address {} does not belong to the current user",
      address_id
    )));
  }

  info!(cart_id = cart.cart_id, user_id, "Checkout cart resolved.");
  ctx.update(|data| data.cart = Some(cart));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::load_cart_snapshot", skip_all)]
async fn load_cart_snapshot(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (store, cart_id) = ctx.with(|data| (data.app_state.store.clone(), data.cart.as_ref().map(|c| c.cart_id)));
  let cart_id = cart_id.ok_or_else(|| AppError::Internal("checkout cart was not resolved".to_string()))?;

  let lines = store.load_fulfillable_items(cart_id).await?;
  if lines.is_empty() {
    return Err(AppError::CartEmpty);
  }
  info!(cart_id, items = lines.len(), "Cart snapshot loaded.");
  ctx.update(|data| data.lines = lines);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::build_preference", skip_all)]
async fn build_preference(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (store, config, user_id, address_id, cart_id, lines) = ctx.with(|data| {
    (
      data.app_state.store.clone(),
      data.app_state.config.clone(),
      data.user_id,
      data.address_id,
      data.cart.as_ref().map(|c| c.cart_id),
      data.lines.clone(),
    )
  });
  let cart_id = cart_id.ok_or_else(|| AppError::Internal("checkout cart was not resolved".to_string()))?;

  let payer_email = store.customer_contact(user_id).await?.map(|contact| contact.email);
  let metadata = PaymentMetadata {
    user_id,
    cart_id,
    address_id,
  };
  let request = build_preference_request(&config, metadata, &lines, payer_email)?;
  ctx.update(|data| data.request = Some(request));
  Ok(PipelineControl::Continue)
}

/// The only step that talks to the provider; nothing local is written.
#[instrument(name = "checkout::create_preference", skip_all)]
async fn create_preference(ctx: ContextData<CheckoutCtxData>) -> AppResult<PipelineControl> {
  let (provider, use_sandbox, request) = ctx.with(|data| {
    (
      data.app_state.provider.clone(),
      data.app_state.config.mercadopago.use_sandbox,
      data.request.clone(),
    )
  });
  let request = request.ok_or_else(|| AppError::Internal("preference request was not built".to_string()))?;

  let response = provider.create_preference(&request).await.map_err(|e| {
    error!(error = %e, cart_id = request.metadata.cart_id, "Preference creation failed.");
    AppError::ProviderUnavailable(e.to_string())
  })?;
  let created = redirect_target(response, use_sandbox)?;
  info!(preference_id = %created.preference_id, "Checkout preference ready.");
  ctx.update(|data| data.preference = Some(created));
  Ok(PipelineControl::Continue)
}
