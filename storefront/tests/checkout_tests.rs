// storefront/tests/checkout_tests.rs

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::*;
use serde_json::{json, Value as JsonValue};
use serial_test::serial;
use std::sync::atomic::Ordering;
use storefront::models::CartStatus;
use storefront::web::configure_app_routes;

fn checkout_request(user_id: i64, body: JsonValue) -> test::TestRequest {
  test::TestRequest::post()
    .uri("/api/v1/checkout")
    .insert_header(("X-User-ID", user_id.to_string()))
    .set_json(body)
}

#[actix_rt::test]
#[serial]
async fn checkout_creates_a_preference_from_the_cart_snapshot() {
  let h = harness();
  let s = seed_scenario(&h.store).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(h.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, checkout_request(s.user_id, json!({ "address_id": s.address_id })).to_request()).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: JsonValue = test::read_body_json(resp).await;
  assert_eq!(body["preferenceId"], "pref-1");
  assert_eq!(body["redirectUrl"], "https://mp.test/checkout/pref-1");

  let requests = h.provider.preferences.lock();
  assert_eq!(requests.len(), 1);
  let request = &requests[0];
  assert_eq!(request.metadata.user_id, s.user_id);
  assert_eq!(request.metadata.cart_id, s.cart_id);
  assert_eq!(request.metadata.address_id, s.address_id);
  assert_eq!(request.items.len(), 1);
  assert_eq!(request.items[0].quantity, 2);
  assert_eq!(request.items[0].unit_price, dec("10.00"));
  assert_eq!(request.payer.email.as_deref(), Some("ana@example.com"));
  assert_eq!(request.notification_url, "https://api.store.test/api/v1/webhooks/mercadopago");
  assert_eq!(request.back_urls.success, "https://store.test/mercadopago/success");
}

#[actix_rt::test]
#[serial]
async fn checkout_rejections_map_to_their_status_codes() {
  let h = harness();
  let s = seed_scenario(&h.store).await;
  let other = h.store.seed_user("Bruno", "bruno@example.com").await;
  let other_address = h.store.seed_address(other).await;
  let empty_user = h.store.seed_user("Carla", "carla@example.com").await;
  let empty_address = h.store.seed_address(empty_user).await;
  h.store.seed_cart(empty_user, CartStatus::Active, &[]).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(h.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let cases = [
    (s.user_id, json!({ "address_id": other_address }), StatusCode::BAD_REQUEST, "invalid_address"),
    (empty_user, json!({ "address_id": empty_address }), StatusCode::BAD_REQUEST, "cart_empty"),
    (other, json!({ "address_id": other_address }), StatusCode::NOT_FOUND, "cart_not_found"),
    (
      other,
      json!({ "cartId": s.cart_id, "addressId": other_address }),
      StatusCode::NOT_FOUND,
      "cart_not_found",
    ),
  ];
  for (user_id, body, status, code) in cases {
    let resp = test::call_service(&app, checkout_request(user_id, body).to_request()).await;
    assert_eq!(resp.status(), status, "expected {}", code);
    let body: JsonValue = test::read_body_json(resp).await;
    assert_eq!(body["error"], code);
  }

  assert!(h.provider.preferences.lock().is_empty());

  let unauthenticated = test::TestRequest::post()
    .uri("/api/v1/checkout")
    .set_json(json!({ "address_id": s.address_id }))
    .to_request();
  let resp = test::call_service(&app, unauthenticated).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
#[serial]
async fn provider_outage_is_retryable_and_leaves_the_cart_alone() {
  let h = harness();
  let s = seed_scenario(&h.store).await;
  h.provider.fail_preferences.store(true, Ordering::SeqCst);
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(h.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, checkout_request(s.user_id, json!({ "address_id": s.address_id })).to_request()).await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  let body: JsonValue = test::read_body_json(resp).await;
  assert_eq!(body["error"], "provider_unavailable");
  assert_eq!(h.store.cart_status(s.cart_id).await, Some(CartStatus::Active));
  assert_eq!(h.store.product_stock(s.product_id).await, Some(5));
}
