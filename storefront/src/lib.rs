// storefront/src/lib.rs

//! Storefront backend: Mercado Pago checkout and webhook-driven order fulfillment.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
