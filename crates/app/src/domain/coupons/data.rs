//! Coupon Data

use atelier::coupons::CouponKind;
use jiff::Timestamp;

use crate::domain::{coupons::records::CouponUuid, users::records::UserUuid};

/// New Coupon
///
/// `code` is normalised to upper case before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCoupon {
    pub uuid: CouponUuid,
    pub code: String,
    pub kind: CouponKind,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub max_uses: Option<u32>,
    pub single_use_per_user: bool,
    pub first_purchase_only: bool,
    pub user: Option<UserUuid>,
    pub min_order_value: Option<u64>,
    pub max_discount: Option<u64>,
}

impl NewCoupon {
    /// An unrestricted coupon.
    #[must_use]
    pub fn new(code: impl Into<String>, kind: CouponKind) -> Self {
        Self {
            uuid: CouponUuid::new(),
            code: code.into(),
            kind,
            starts_at: None,
            ends_at: None,
            max_uses: None,
            single_use_per_user: false,
            first_purchase_only: false,
            user: None,
            min_order_value: None,
            max_discount: None,
        }
    }
}
