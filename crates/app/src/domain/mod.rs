//! Atelier Domain Concerns

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod ledger;
pub mod orders;
pub mod outbox;
pub mod payments;
pub mod reservations;
pub mod shipping;
pub mod users;
