// storefront/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod checkout_handlers;
pub mod payment_handlers;
pub mod webhook_handlers;
