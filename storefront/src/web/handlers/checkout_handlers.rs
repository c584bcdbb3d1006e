// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use stepline::{ContextData, PipelineResult};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequestPayload {
  #[serde(default, alias = "cartId")]
  pub cart_id: Option<i64>,
  #[serde(alias = "addressId")]
  pub address_id: i64,
}

#[instrument(
  name = "handler::create_checkout",
  skip(app_state, payload, auth_user),
  fields(user_id = auth_user.user_id, cart_id = ?payload.cart_id, address_id = payload.address_id)
)]
pub async fn create_checkout(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CheckoutRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  if payload.address_id <= 0 {
    return Err(AppError::InvalidAddress("address_id must be positive".to_string()));
  }

  let ctx = ContextData::new(CheckoutCtxData::new(
    app_state.get_ref().clone(),
    auth_user.user_id,
    payload.cart_id,
    payload.address_id,
  ));

  match app_state.registry.run(ctx.clone()).await? {
    PipelineResult::Completed => {
      let created = ctx
        .with(|data| data.preference.clone())
        .ok_or_else(|| AppError::Internal("checkout completed without a preference".to_string()))?;
      info!(preference_id = %created.preference_id, "Checkout started.");
      Ok(HttpResponse::Created().json(created))
    }
    PipelineResult::Stopped => {
      warn!("Checkout pipeline stopped unexpectedly.");
      Err(AppError::Internal("checkout did not complete".to_string()))
    }
  }
}
