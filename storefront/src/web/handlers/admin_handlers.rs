// storefront/src/web/handlers/admin_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::OrderStatus;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusPayload {
  pub status: String,
}

#[instrument(
  name = "handler::update_order_status",
  skip(app_state, auth_user, payload),
  fields(user_id = auth_user.user_id, requested = %payload.status)
)]
pub async fn update_order_status(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i64>,
  payload: web::Json<UpdateOrderStatusPayload>,
) -> Result<HttpResponse, AppError> {
  if !auth_user.is_admin() {
    warn!("Non-admin tried to change an order status.");
    return Err(AppError::Forbidden("Admin role required.".to_string()));
  }

  let order_id = path.into_inner();
  let status: OrderStatus = payload.status.parse().map_err(AppError::Validation)?;

  if !app_state.store.update_order_status(order_id, status).await? {
    return Err(AppError::NotFound(format!("Order {} not found", order_id)));
  }
  info!(order_id, status = status.as_str(), "Order status updated.");
  Ok(HttpResponse::Ok().json(json!({ "orderId": order_id, "status": status })))
}
