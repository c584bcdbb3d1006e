// storefront/src/services/signature.rs

//! Verification of Mercado Pago webhook signatures.
//!
//! The provider signs `id:{data.id};request-id:{x-request-id};ts:{ts};` with
//! HMAC-SHA256 and sends `x-signature: ts=<ts>,v1=<hex digest>`.

use hmac::{Hmac, Mac};
use serde_json::Value as JsonValue;
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const PAYMENT_TOPIC: &str = "payment";

/// Everything the verifier looks at, already pulled out of the request.
#[derive(Debug, Clone, Default)]
pub struct SignatureInput {
  pub signature_header: Option<String>,
  pub request_id: Option<String>,
  pub data_id: Option<String>,
  pub topic: Option<String>,
}

impl SignatureInput {
  /// Resolves `data.id` and the topic the way the provider may send them:
  /// query `data.id`, then query `id`, then body `data.id`; query `type`,
  /// then query `topic`, then body `type`.
  pub fn from_request_parts(
    signature_header: Option<String>,
    request_id: Option<String>,
    query: &HashMap<String, String>,
    body: &JsonValue,
  ) -> Self {
    let query_value = |key: &str| query.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let data_id = query_value("data.id")
      .or_else(|| query_value("id"))
      .or_else(|| body.pointer("/data/id").and_then(json_scalar_to_string));
    let topic = query_value("type")
      .or_else(|| query_value("topic"))
      .or_else(|| body.get("type").and_then(json_scalar_to_string));

    Self {
      signature_header,
      request_id,
      data_id,
      topic,
    }
  }
}

fn json_scalar_to_string(value: &JsonValue) -> Option<String> {
  match value {
    JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    JsonValue::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
  /// Not a payment notification; acknowledged and dropped.
  Ignored { kind: String },
  Invalid { reason: String },
  Valid { payment_id: String },
}

struct SignatureParts<'a> {
  ts: &'a str,
  v1: &'a str,
}

fn parse_signature_header(header: &str) -> Option<SignatureParts<'_>> {
  let mut ts = None;
  let mut v1 = None;
  for part in header.split(',') {
    match part.trim().split_once('=') {
      Some(("ts", value)) if !value.trim().is_empty() => ts = Some(value.trim()),
      Some(("v1", value)) if !value.trim().is_empty() => v1 = Some(value.trim()),
      _ => {}
    }
  }
  Some(SignatureParts { ts: ts?, v1: v1? })
}

/// Canonical string the provider signs.
pub fn signing_manifest(data_id: &str, request_id: &str, ts: &str) -> String {
  format!("id:{};request-id:{};ts:{};", data_id, request_id, ts)
}

/// Hex HMAC-SHA256 of `manifest`; `None` only for an empty secret.
pub fn compute_signature(secret: &str, manifest: &str) -> Option<String> {
  if secret.is_empty() {
    return None;
  }
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
  mac.update(manifest.as_bytes());
  Some(hex::encode(mac.finalize().into_bytes()))
}

/// Pure check of a webhook delivery against the shared secret.
pub fn verify(input: &SignatureInput, secret: &str) -> Verification {
  let invalid = |reason: &str| Verification::Invalid {
    reason: reason.to_string(),
  };

  match input.topic.as_deref() {
    Some(PAYMENT_TOPIC) => {}
    other => {
      return Verification::Ignored {
        kind: other.unwrap_or("unknown").to_string(),
      }
    }
  }

  let (Some(header), Some(request_id), Some(data_id)) = (
    input.signature_header.as_deref(),
    input.request_id.as_deref(),
    input.data_id.as_deref(),
  ) else {
    return invalid("missing signature header, request id or data id");
  };

  let Some(parts) = parse_signature_header(header) else {
    return invalid("malformed x-signature header");
  };

  let manifest = signing_manifest(data_id, request_id, parts.ts);
  let Some(expected_hex) = compute_signature(secret, &manifest) else {
    return invalid("webhook secret is not configured");
  };

  let Ok(provided) = hex::decode(parts.v1) else {
    return invalid("signature is not valid hex");
  };
  let Ok(expected) = hex::decode(expected_hex) else {
    return invalid("failed to encode expected signature");
  };

  if expected.ct_eq(&provided).unwrap_u8() != 1 {
    return invalid("signature mismatch");
  }

  Verification::Valid {
    payment_id: data_id.to_string(),
  }
}
