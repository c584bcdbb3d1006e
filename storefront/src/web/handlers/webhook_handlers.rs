// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use stepline::{ContextData, PipelineResult};
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::WebhookCtxData;
use crate::services::signature::SignatureInput;
use crate::state::AppState;

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
  req
    .headers()
    .get(name)
    .and_then(|value| value.to_str().ok())
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

#[instrument(
  name = "handler::mercadopago_webhook",
  skip(app_state, req, query, body),
  fields(request_id = ?header_value(&req, "x-request-id"), body_len = body.len())
)]
pub async fn mercadopago_webhook(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  query: web::Query<HashMap<String, String>>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  // The provider's body shape varies between topics; only `type` and `data.id` are read from it.
  let body_json: JsonValue = if body.is_empty() {
    JsonValue::Null
  } else {
    serde_json::from_slice(&body).unwrap_or_else(|e| {
      warn!(error = %e, "Webhook body is not valid JSON; relying on query parameters.");
      JsonValue::Null
    })
  };

  let signature = SignatureInput::from_request_parts(
    header_value(&req, "x-signature"),
    header_value(&req, "x-request-id"),
    &query,
    &body_json,
  );
  info!(data_id = ?signature.data_id, topic = ?signature.topic, "Mercado Pago notification received.");

  let ctx = ContextData::new(WebhookCtxData::new(app_state.get_ref().clone(), signature));

  match app_state.registry.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let body = ctx.with(|data| {
        json!({
          "message": "processed",
          "paymentId": data.payment.as_ref().map(|p| p.mp_payment_id.clone()),
          "internalState": data.internal_state.map(|s| s.as_str()),
          "orderId": data.outcome.as_ref().and_then(|o| o.order_id()),
        })
      });
      info!(response = %body, "Webhook processed.");
      Ok(HttpResponse::Ok().json(body))
    }
    Ok(PipelineResult::Stopped) => Ok(HttpResponse::Ok().json(json!({ "message": "ignored" }))),
    Err(app_err) => {
      error!(error = %app_err, "Webhook processing failed.");
      Err(app_err)
    }
  }
}
