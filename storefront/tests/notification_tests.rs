// storefront/tests/notification_tests.rs

mod common;

use common::*;
use serial_test::serial;
use std::sync::atomic::Ordering;
use stepline::PipelineResult;
use storefront::models::{CartStatus, InternalState};
use storefront::services::fulfillment::FulfillmentOutcome;
use storefront::services::ledger::record_payment;
use storefront::services::mercadopago::ProviderPayment;
use storefront::services::notifier::{notify_once, NotificationTarget, NotifyOutcome};
use storefront::store::FulfillmentStore;

#[tokio::test]
#[serial]
async fn approval_email_is_sent_exactly_once() {
  let h = harness();
  let s = seed_scenario(&h.store).await;
  h.provider.put_payment(payment_payload(
    "PAY-1", "approved", "accredited", "20.00", s.user_id, s.cart_id, s.address_id,
  ));

  let (_, first) = deliver(&h.state, "PAY-1").await;
  assert_eq!(first.notification, Some(NotifyOutcome::Sent));
  let order_id = first.outcome.as_ref().and_then(|o| o.order_id()).unwrap();

  let sent = h.mailer.sent_to("ana@example.com");
  assert_eq!(sent.len(), 1);
  assert!(sent[0].subject.contains("approved"));
  assert!(sent[0].html_body.contains(&format!("Order #{}", order_id)));
  assert!(sent[0].html_body.contains("20.00"));

  let (_, second) = deliver(&h.state, "PAY-1").await;
  assert_eq!(second.notification, Some(NotifyOutcome::AlreadyNotified));
  assert_eq!(h.mailer.count(), 1);
  assert!(h.store.find_order(order_id).await.unwrap().unwrap().notified);
}

#[tokio::test]
#[serial]
async fn rejected_payment_cancels_the_cart_and_emails_once() {
  let h = harness();
  let s = seed_scenario(&h.store).await;
  h.provider.put_payment(payment_payload(
    "PAY-2", "rejected", "cc_rejected_insufficient_amount", "20.00", s.user_id, s.cart_id, s.address_id,
  ));

  let (result, data) = deliver(&h.state, "PAY-2").await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(data.internal_state, Some(InternalState::Cancelled));
  assert_eq!(
    data.outcome,
    Some(FulfillmentOutcome::CartUpdated {
      cart_id: s.cart_id,
      status: CartStatus::Cancelled
    })
  );
  assert_eq!(h.store.cart_status(s.cart_id).await, Some(CartStatus::Cancelled));
  assert!(h.store.orders_for_payment("PAY-2").await.is_empty());
  assert_eq!(h.store.product_stock(s.product_id).await, Some(5));

  let sent = h.mailer.sent_to("ana@example.com");
  assert_eq!(sent.len(), 1);
  assert!(sent[0].subject.contains("rejected"));
  assert!(h.store.payment("PAY-2").await.unwrap().rejection_notified);

  let (result, replay) = deliver(&h.state, "PAY-2").await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(replay.outcome, Some(FulfillmentOutcome::CartUnchanged { cart_id: s.cart_id }));
  assert_eq!(replay.notification, Some(NotifyOutcome::AlreadyNotified));
  assert_eq!(h.mailer.count(), 1);
}

#[tokio::test]
#[serial]
async fn failed_send_releases_the_claim_so_a_redelivery_retries() {
  let h = harness();
  let s = seed_scenario(&h.store).await;
  h.provider.put_payment(payment_payload(
    "PAY-1", "approved", "accredited", "20.00", s.user_id, s.cart_id, s.address_id,
  ));
  h.mailer.failing.store(true, Ordering::SeqCst);

  let (result, data) = deliver(&h.state, "PAY-1").await;
  assert_eq!(result.unwrap(), PipelineResult::Completed, "mail failure must not fail the delivery");
  assert_eq!(data.notification, Some(NotifyOutcome::SendFailed));
  let order_id = data.outcome.as_ref().and_then(|o| o.order_id()).unwrap();
  assert!(!h.store.find_order(order_id).await.unwrap().unwrap().notified);

  h.mailer.failing.store(false, Ordering::SeqCst);
  let (_, retry) = deliver(&h.state, "PAY-1").await;
  assert_eq!(retry.outcome, Some(FulfillmentOutcome::AlreadyFulfilled { order_id }));
  assert_eq!(retry.notification, Some(NotifyOutcome::Sent));
  assert_eq!(h.mailer.count(), 1);
}

#[tokio::test]
#[serial]
async fn unknown_customer_falls_back_to_the_payer_email() {
  let h = harness();
  let payload = payment_payload("PAY-7", "rejected", "cc_rejected_other_reason", "5.00", 404, 405, 406);
  let event = serde_json::from_value::<ProviderPayment>(payload)
    .unwrap()
    .into_event()
    .unwrap();
  record_payment(&h.store, &event).await.unwrap();

  let target = NotificationTarget::Rejected {
    mp_payment_id: "PAY-7".to_string(),
    user_id: 404,
  };
  let config = test_config();

  let outcome = notify_once(&h.store, h.mailer.as_ref(), &config, &target, Some("payer@example.com"))
    .await
    .unwrap();
  assert_eq!(outcome, NotifyOutcome::Sent);
  assert_eq!(h.mailer.sent_to("payer@example.com").len(), 1);
}

#[tokio::test]
#[serial]
async fn no_recipient_releases_the_claim() {
  let h = harness();
  let payload = payment_payload("PAY-8", "rejected", "cc_rejected_other_reason", "5.00", 404, 405, 406);
  let event = serde_json::from_value::<ProviderPayment>(payload)
    .unwrap()
    .into_event()
    .unwrap();
  record_payment(&h.store, &event).await.unwrap();

  let target = NotificationTarget::Rejected {
    mp_payment_id: "PAY-8".to_string(),
    user_id: 404,
  };
  let config = test_config();

  let outcome = notify_once(&h.store, h.mailer.as_ref(), &config, &target, None).await.unwrap();
  assert_eq!(outcome, NotifyOutcome::NoRecipient);
  assert_eq!(h.mailer.count(), 0);
  assert!(h.store.claim_rejection_notification("PAY-8").await.unwrap());
}

#[tokio::test]
#[serial]
async fn rejection_for_an_unknown_cart_is_recorded_and_emails_the_payer() {
  let h = harness();
  h.provider.put_payment(payment_payload(
    "PAY-404", "rejected", "cc_rejected_other_reason", "20.00", 9_001, 9_999, 9_002,
  ));

  let (result, data) = deliver(&h.state, "PAY-404").await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(data.outcome, Some(FulfillmentOutcome::CartUnchanged { cart_id: 9_999 }));
  assert_eq!(data.notification, Some(NotifyOutcome::Sent));

  let row = h.store.payment("PAY-404").await.expect("ledger row is written");
  assert_eq!(row.cart_id, Some(9_999));
  assert!(row.rejection_notified);
  assert_eq!(h.mailer.sent_to("payer@example.com").len(), 1);
}
