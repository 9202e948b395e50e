//! Coupons service.

use async_trait::async_trait;
use atelier::coupons::normalise_code;
use mockall::automock;

use crate::{
    database::Db,
    domain::coupons::{
        data::NewCoupon, errors::CouponsServiceError, records::CouponRecord,
        repository::PgCouponsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCouponsService {
    db: Db,
    repository: PgCouponsRepository,
}

impl PgCouponsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCouponsRepository::new(),
        }
    }
}

#[async_trait]
impl CouponsService for PgCouponsService {
    #[tracing::instrument(skip(self, coupon), fields(code = %coupon.code))]
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponRecord, CouponsServiceError> {
        let code = normalise_code(&coupon.code)?;

        coupon.kind.validate()?;

        let mut tx = self.db.begin().await?;

        let created = self.repository.create_coupon(&mut tx, &coupon, &code).await?;

        tx.commit().await?;

        tracing::info!(kind = coupon.kind.as_str(), "coupon created");

        Ok(created)
    }

    async fn get_coupon(&self, code: String) -> Result<CouponRecord, CouponsServiceError> {
        let code = normalise_code(&code).map_err(|_unknown| CouponsServiceError::NotFound)?;
        let mut tx = self.db.begin().await?;

        let found = self.repository.get_coupon_by_code(&mut tx, &code).await?;

        tx.commit().await?;

        Ok(found)
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    /// Create a coupon. The code is stored upper case.
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponRecord, CouponsServiceError>;

    /// Look a coupon up by code, case-insensitively.
    async fn get_coupon(&self, code: String) -> Result<CouponRecord, CouponsServiceError>;
}

#[cfg(test)]
mod tests {
    use atelier::coupons::{CouponKind, CouponRejection};
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    #[tokio::test]
    async fn create_coupon_normalises_code() -> TestResult {
        let ctx = TestContext::new().await;

        let created = ctx
            .coupons
            .create_coupon(NewCoupon::new(" welcome10 ", CouponKind::Percentage {
                basis_points: 1_000,
            }))
            .await?;

        assert_eq!(created.coupon.code, "WELCOME10");
        assert_eq!(created.coupon.uses, 0);

        let found = ctx.coupons.get_coupon("Welcome10".to_string()).await?;

        assert_eq!(found.uuid, created.uuid);
        assert_eq!(found.coupon.kind, CouponKind::Percentage {
            basis_points: 1_000
        });

        Ok(())
    }

    #[tokio::test]
    async fn create_coupon_round_trips_buy_get_columns() -> TestResult {
        let ctx = TestContext::new().await;

        let mut coupon = NewCoupon::new("LEVE3PAGUE2", CouponKind::BuyGet { buy: 2, get: 1 });
        coupon.max_uses = Some(10);
        coupon.max_discount = Some(5_000);

        let created = ctx.coupons.create_coupon(coupon).await?;

        assert_eq!(created.coupon.kind, CouponKind::BuyGet { buy: 2, get: 1 });
        assert_eq!(created.coupon.max_uses, Some(10));
        assert_eq!(created.coupon.max_discount, Some(5_000));

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_code_returns_already_exists() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.coupons
            .create_coupon(NewCoupon::new("FRETEGRATIS", CouponKind::FreeShipping))
            .await?;

        let result = ctx
            .coupons
            .create_coupon(NewCoupon::new("fretegratis", CouponKind::FreeShipping))
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn zero_percentage_is_rejected_before_storage() {
        let ctx = TestContext::new().await;

        let result = ctx
            .coupons
            .create_coupon(NewCoupon::new("NADA", CouponKind::Percentage {
                basis_points: 0,
            }))
            .await;

        assert!(
            matches!(result, Err(CouponsServiceError::InvalidDefinition(_))),
            "expected InvalidDefinition, got {result:?}"
        );
    }

    #[tokio::test]
    async fn malformed_code_is_rejected() {
        let ctx = TestContext::new().await;

        let result = ctx
            .coupons
            .create_coupon(NewCoupon::new("a b", CouponKind::FreeShipping))
            .await;

        assert!(
            matches!(
                result,
                Err(CouponsServiceError::Rejected(CouponRejection::Unknown))
            ),
            "expected Rejected(Unknown), got {result:?}"
        );
    }

    #[tokio::test]
    async fn get_unknown_coupon_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.coupons.get_coupon("MISSING".to_string()).await;

        assert!(
            matches!(result, Err(CouponsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }
}
