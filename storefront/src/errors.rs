// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use stepline::StepLineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Cart Not Found: {0}")]
  CartNotFound(String),

  #[error("Invalid Address: {0}")]
  InvalidAddress(String),

  #[error("Webhook signature rejected: {0}")]
  SignatureRejected(String),

  #[error("Payment metadata missing or invalid: {0}")]
  MissingMetadata(String),

  #[error("Cart has no items to pay for")]
  CartEmpty,

  #[error("Insufficient stock for product {product_id} (requested {requested})")]
  StockConflict { product_id: i64, requested: i32 },

  #[error("Cart cannot be fulfilled: {0}")]
  CartNotFulfillable(String),

  /// The provider failed while we were reacting to one of its notifications.
  #[error("Payment provider error: {0}")]
  Provider(String),

  /// The provider failed on a buyer-initiated call; the buyer may retry.
  #[error("Payment provider unavailable: {0}")]
  ProviderUnavailable(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: StepLineError,
  },

  #[error("Operation timed out: {0}")]
  Timeout(String),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(err) => AppError::Internal(format!("{:#}", err)),
    }
  }
}

impl AppError {
  /// Stable, machine-readable code sent in the `error` field.
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "validation_error",
      AppError::Auth(_) => "unauthorized",
      AppError::Forbidden(_) => "forbidden",
      AppError::NotFound(_) => "not_found",
      AppError::CartNotFound(_) => "cart_not_found",
      AppError::InvalidAddress(_) => "invalid_address",
      AppError::SignatureRejected(_) => "invalid_signature",
      AppError::MissingMetadata(_) => "missing_metadata",
      AppError::CartEmpty => "cart_empty",
      AppError::StockConflict { .. } => "stock_conflict",
      AppError::CartNotFulfillable(_) => "cart_not_fulfillable",
      AppError::Provider(_) => "provider_error",
      AppError::ProviderUnavailable(_) => "provider_unavailable",
      AppError::Timeout(_) => "timeout",
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        "internal_error"
      }
    }
  }

  fn public_message(&self) -> String {
    match self {
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        "An internal error occurred.".to_string()
      }
      AppError::Timeout(_) => "The operation timed out and was rolled back.".to_string(),
      other => other.to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_)
      | AppError::InvalidAddress(_)
      | AppError::MissingMetadata(_)
      | AppError::CartEmpty => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) | AppError::SignatureRejected(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) | AppError::CartNotFound(_) => StatusCode::NOT_FOUND,
      AppError::StockConflict { .. } | AppError::CartNotFulfillable(_) => StatusCode::CONFLICT,
      AppError::Provider(_) => StatusCode::BAD_GATEWAY,
      AppError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow { .. }
      | AppError::Timeout(_)
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with client error");
    }
    HttpResponse::build(status).json(json!({
      "error": self.code(),
      "message": self.public_message(),
    }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn webhook_failures_map_to_provider_visible_statuses() {
    assert_eq!(
      AppError::SignatureRejected("bad".into()).status_code(),
      StatusCode::FORBIDDEN
    );
    assert_eq!(
      AppError::MissingMetadata("cart_id".into()).status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(AppError::Provider("down".into()).status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(
      AppError::StockConflict {
        product_id: 1,
        requested: 2
      }
      .status_code(),
      StatusCode::CONFLICT
    );
    assert_eq!(
      AppError::Timeout("tx".into()).status_code(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn internal_details_are_not_exposed() {
    let err = AppError::Internal("connection string leaked".into());
    assert_eq!(err.code(), "internal_error");
    assert!(!err.public_message().contains("leaked"));
  }

  #[test]
  fn anyhow_wrapped_sqlx_errors_keep_their_kind() {
    let err: AppError = anyhow::Error::new(sqlx::Error::RowNotFound).into();
    assert!(matches!(err, AppError::Sqlx(sqlx::Error::RowNotFound)));
  }
}
