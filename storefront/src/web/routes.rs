// storefront/src/web/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::web::handlers::{admin_handlers, checkout_handlers, payment_handlers, webhook_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/webhooks").route(
          "/mercadopago",
          web::post().to(webhook_handlers::mercadopago_webhook),
        ),
      )
      .route("/checkout", web::post().to(checkout_handlers::create_checkout))
      .route("/payments/status", web::get().to(payment_handlers::payment_status))
      .route(
        "/orders/{order_id}/payment",
        web::get().to(payment_handlers::order_payment),
      )
      .service(web::scope("/admin").route(
        "/orders/{order_id}",
        web::patch().to(admin_handlers::update_order_status),
      )),
  );
}
