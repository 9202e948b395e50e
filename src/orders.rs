//! Orders
//!
//! Order statuses, the transition table every status change goes through, and order codes.

pub mod code;
pub mod status;
pub mod transitions;

pub use code::OrderCode;
pub use status::OrderStatus;
pub use transitions::{IllegalTransition, OrderTransition, ReservationEffect, TransitionPlan, transition};
