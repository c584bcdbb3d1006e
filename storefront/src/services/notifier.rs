// storefront/src/services/notifier.rs

use crate::config::AppConfig;
use crate::errors::Result as AppResult;
use crate::services::mailer::{payment_approved_email, payment_rejected_email, Mailer};
use crate::store::FulfillmentStore;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

/// The terminal outcome a customer is told about.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationTarget {
  /// Guarded by `orders.notified`.
  Approved { order_id: i64, user_id: i64, total: Decimal },
  /// Guarded by `payments.rejection_notified`.
  Rejected { mp_payment_id: String, user_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
  Sent,
  AlreadyNotified,
  /// Nobody to send to; the claim was released.
  NoRecipient,
  /// The transport failed; the claim was released so a redelivery can retry.
  SendFailed,
}

/// Sends at most one email per target.
///
/// The flag is claimed with a conditional update before sending, so two
/// concurrent deliveries cannot both send.
#[instrument(name = "notifier::notify_once", skip(store, mailer, config, fallback_email), err(Display))]
pub async fn notify_once(
  store: &dyn FulfillmentStore,
  mailer: &dyn Mailer,
  config: &AppConfig,
  target: &NotificationTarget,
  fallback_email: Option<&str>,
) -> AppResult<NotifyOutcome> {
  let claimed = match target {
    NotificationTarget::Approved { order_id, .. } => store.claim_order_notification(*order_id).await?,
    NotificationTarget::Rejected { mp_payment_id, .. } => store.claim_rejection_notification(mp_payment_id).await?,
  };
  if !claimed {
    info!("Customer already notified for this outcome.");
    return Ok(NotifyOutcome::AlreadyNotified);
  }

  let user_id = match target {
    NotificationTarget::Approved { user_id, .. } | NotificationTarget::Rejected { user_id, .. } => *user_id,
  };
  let contact = store.customer_contact(user_id).await?;
  let (name, email) = match (contact, fallback_email) {
    (Some(contact), _) => (contact.name, contact.email),
    (None, Some(email)) => ("Customer".to_string(), email.to_string()),
    (None, None) => {
      warn!(user_id, "No email address for customer; notification skipped.");
      release(store, target).await?;
      return Ok(NotifyOutcome::NoRecipient);
    }
  };

  let message = match target {
    NotificationTarget::Approved { order_id, total, .. } => {
      payment_approved_email(&config.store_name, &config.mail_sender, &email, &name, *order_id, *total)
    }
    NotificationTarget::Rejected { .. } => payment_rejected_email(&config.store_name, &config.mail_sender, &email, &name),
  };

  match mailer.send(&message).await {
    Ok(sent) => {
      info!(message_id = %sent.message_id, "Payment status email sent.");
      Ok(NotifyOutcome::Sent)
    }
    Err(e) => {
      error!(error = %e, "Payment status email failed; releasing notification claim.");
      release(store, target).await?;
      Ok(NotifyOutcome::SendFailed)
    }
  }
}

async fn release(store: &dyn FulfillmentStore, target: &NotificationTarget) -> AppResult<()> {
  match target {
    NotificationTarget::Approved { order_id, .. } => store.release_order_notification(*order_id).await,
    NotificationTarget::Rejected { mp_payment_id, .. } => store.release_rejection_notification(mp_payment_id).await,
  }
}
