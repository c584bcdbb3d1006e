// storefront/src/web/handlers/payment_handlers.rs

//! Read-only payment views for the buyer.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{error, instrument};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
  #[serde(default, alias = "paymentId")]
  pub payment_id: Option<String>,
}

/// Looks the payment up at the provider and returns its validated summary.
#[instrument(name = "handler::payment_status", skip(app_state, query, auth_user), fields(user_id = auth_user.user_id))]
pub async fn payment_status(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<PaymentStatusQuery>,
) -> Result<HttpResponse, AppError> {
  let payment_id = query
    .into_inner()
    .payment_id
    .map(|id| id.trim().to_string())
    .filter(|id| !id.is_empty())
    .ok_or_else(|| AppError::Validation("payment_id is required".to_string()))?;

  let payment = app_state.provider.get_payment(&payment_id).await.map_err(|e| {
    error!(payment_id = %payment_id, error = %e, "Payment status lookup failed.");
    AppError::Provider(e.to_string())
  })?;
  Ok(HttpResponse::Ok().json(payment.status_view()))
}

#[instrument(name = "handler::order_payment", skip(app_state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn order_payment(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let summary = app_state
    .store
    .order_payment_summary(order_id, auth_user.user_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No payment found for order {}", order_id)))?;
  Ok(HttpResponse::Ok().json(summary))
}
