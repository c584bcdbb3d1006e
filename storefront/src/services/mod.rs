// storefront/src/services/mod.rs

pub mod fulfillment;
pub mod ledger;
pub mod mailer;
pub mod mercadopago;
pub mod notifier;
pub mod preference;
pub mod signature;
pub mod status_mapper;
