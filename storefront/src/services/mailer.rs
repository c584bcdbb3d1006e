// storefront/src/services/mailer.rs

use crate::errors::Result as AppResult;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub html_body: String,
}

#[derive(Debug, Clone)]
pub struct SentEmailInfo {
  pub message_id: String,
}

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, message: &EmailMessage) -> AppResult<SentEmailInfo>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  #[instrument(name = "mailer::send", skip(self, message), fields(to = %message.to, subject = %message.subject))]
  async fn send(&self, message: &EmailMessage) -> AppResult<SentEmailInfo> {
    let body_preview = message.html_body.chars().take(80).collect::<String>();
    let message_id = format!("log_email_{}", uuid::Uuid::new_v4());
    info!(from = %message.from, %message_id, preview = %body_preview, "Email logged instead of sent.");
    Ok(SentEmailInfo { message_id })
  }
}

/// Escapes text interpolated into the HTML templates.
fn escape_html(raw: &str) -> String {
  let mut escaped = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

pub fn payment_approved_email(
  store_name: &str,
  from: &str,
  to: &str,
  customer_name: &str,
  order_id: i64,
  total: Decimal,
) -> EmailMessage {
  EmailMessage {
    to: to.to_string(),
    from: format!("\"{}\" <{}>", store_name, from),
    subject: "Payment approved! Your order is on its way".to_string(),
    html_body: format!(
      "<h2>Thanks for your purchase, {name}!</h2>\
       <p>Your payment was approved.</p>\
       <p><strong>Order #{order_id}</strong> for a total of <strong>${total:.2}</strong> is being prepared.</p>\
       <p>We will let you know when it ships.</p>\
       <br/><p>Thanks for shopping at <b>{store}</b>.</p>",
      name = escape_html(customer_name),
      order_id = order_id,
      total = total,
      store = escape_html(store_name),
    ),
  }
}

pub fn payment_rejected_email(store_name: &str, from: &str, to: &str, customer_name: &str) -> EmailMessage {
  EmailMessage {
    to: to.to_string(),
    from: format!("\"{}\" <{}>", store_name, from),
    subject: "Your payment was rejected".to_string(),
    html_body: format!(
      "<h2>Hi {name},</h2>\
       <p>Unfortunately your payment was rejected.</p>\
       <p>You can try again from your account or check your payment methods.</p>\
       <br/><p>The <b>{store}</b> team.</p>",
      name = escape_html(customer_name),
      store = escape_html(store_name),
    ),
  }
}
