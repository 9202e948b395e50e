//! Atelier
//!
//! Atelier is the checkout and inventory-consistency core of an online clothing store. This crate
//! holds the pure domain rules: cart contents and fingerprints, pricing windows, coupons, the order
//! state machine, reservations, the stock ledger, shipping packages and payment webhook
//! verification. Persistence and transport live in the `atelier-app` and `atelier-json` crates.

pub mod carts;
pub mod coupons;
pub mod errors;
pub mod ledger;
pub mod money;
pub mod orders;
pub mod pricing;
pub mod reservations;
pub mod shipping;
pub mod webhooks;
