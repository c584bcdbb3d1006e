// storefront/src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  User,
  Admin,
}

impl UserRole {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "user" => Some(UserRole::User),
      "admin" => Some(UserRole::Admin),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
  pub user_id: i64,
  pub name: String,
  pub email: String,
  pub role: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
  pub address_id: i64,
  pub user_id: i64,
}

/// Who receives payment emails.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CustomerContact {
  pub name: String,
  pub email: String,
}
