// storefront/src/web/extractors.rs

use crate::errors::AppError;
use crate::models::UserRole;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// The caller as established by the session layer in front of this service.
///
/// Reads `X-User-ID` and the optional `X-User-Role` (defaults to `user`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
  pub user_id: i64,
  pub role: UserRole,
}

impl AuthenticatedUser {
  pub fn is_admin(&self) -> bool {
    self.role == UserRole::Admin
  }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
  req.headers().get(name).and_then(|value| value.to_str().ok()).map(str::trim)
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let user_id = header(req, USER_ID_HEADER)
      .and_then(|raw| raw.parse::<i64>().ok())
      .filter(|id| *id > 0);
    let Some(user_id) = user_id else {
      warn!("Request without a valid X-User-ID header.");
      return ready(Err(AppError::Auth("User authentication required.".to_string())));
    };

    let role = match header(req, USER_ROLE_HEADER) {
      None => UserRole::User,
      Some(raw) => match UserRole::parse(raw) {
        Some(role) => role,
        None => {
          warn!(user_id, role = raw, "Unknown role header.");
          return ready(Err(AppError::Auth(format!("Unknown role '{}'.", raw))));
        }
      },
    };

    ready(Ok(AuthenticatedUser { user_id, role }))
  }
}
