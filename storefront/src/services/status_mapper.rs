// storefront/src/services/status_mapper.rs

use crate::models::{InternalState, ProviderStatus};
use tracing::warn;

/// Maps a provider payment status onto the order lifecycle.
///
/// Total over the provider vocabulary. Anything unrecognised is treated as
/// still in flight (`Reserved`) and reported, never as paid or cancelled.
pub fn map_status(status: &ProviderStatus, status_detail: Option<&str>) -> InternalState {
  match status {
    ProviderStatus::Approved => InternalState::Paid,
    ProviderStatus::Pending | ProviderStatus::InProcess | ProviderStatus::InMediation => InternalState::Reserved,
    ProviderStatus::Rejected | ProviderStatus::Cancelled | ProviderStatus::Refunded | ProviderStatus::ChargedBack => {
      InternalState::Cancelled
    }
    ProviderStatus::Unknown(raw) => {
      warn!(
        provider_status = %raw,
        status_detail = status_detail.unwrap_or(""),
        anomaly = true,
        "Unmapped provider payment status, keeping the cart reserved."
      );
      InternalState::Reserved
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_the_whole_provider_vocabulary() {
    let table = [
      ("approved", InternalState::Paid),
      ("pending", InternalState::Reserved),
      ("in_process", InternalState::Reserved),
      ("in_mediation", InternalState::Reserved),
      ("rejected", InternalState::Cancelled),
      ("cancelled", InternalState::Cancelled),
      ("refunded", InternalState::Cancelled),
      ("charged_back", InternalState::Cancelled),
    ];
    for (raw, expected) in table {
      assert_eq!(map_status(&ProviderStatus::from(raw), None), expected, "status {}", raw);
    }
  }

  #[test]
  fn unknown_statuses_stay_reserved() {
    for raw in ["authorized", "", "APPROVED", "approved_partially"] {
      assert_eq!(
        map_status(&ProviderStatus::from(raw), Some("accredited")),
        InternalState::Reserved,
        "status {:?}",
        raw
      );
    }
  }
}
