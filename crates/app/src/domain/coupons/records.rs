//! Coupon Records

use atelier::coupons::Coupon;
use jiff::Timestamp;

use crate::uuids::TypedUuid;

/// Coupon UUID
pub type CouponUuid = TypedUuid<CouponRecord>;

/// Coupon Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRecord {
    pub uuid: CouponUuid,
    pub coupon: Coupon,
    pub created_at: Timestamp,
}
