//! Checkout service.

use std::sync::Arc;

use async_trait::async_trait;
use atelier::{
    carts::{CartContents, CartLine},
    coupons::{CouponRejection, CouponUsage, normalise_code},
    orders::{OrderCode, OrderStatus},
    pricing::OrderTotals,
    shipping::{Package, PostalCode, QuoteOutcome, ShippingOption},
};
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use rustc_hash::FxHashMap;
use sqlx::{Postgres, Transaction};

use crate::{
    database::Db,
    domain::{
        carts::{CartsService, records::CartOwner},
        catalog::{
            records::{PricedVariant, VariantUuid},
            repository::PgCatalogRepository,
        },
        checkout::{
            data::{CheckoutIntent, CheckoutRequest},
            errors::CheckoutServiceError,
        },
        coupons::{records::CouponUuid, repository::PgCouponsRepository},
        orders::{
            data::{NewOrder, NewOrderItem},
            records::{Actor, OrderRecord, OrderUuid},
            repository::PgOrdersRepository,
        },
        payments::gateway::{IntentRequest, PaymentGateway},
        reservations::holds::Holds,
        shipping::ShippingQuoter,
        users::repository::PgUsersRepository,
    },
    settings::AppSettings,
};

const OPENED_NOTE: &str = "checkout started";

/// A cart line with the catalog row it was priced from.
#[derive(Debug, Clone)]
struct PricedLine {
    line: CartLine,
    priced: PricedVariant,
}

impl PricedLine {
    fn variant(&self) -> VariantUuid {
        VariantUuid::from_uuid(self.line.variant)
    }

    fn package(&self) -> Package {
        self.priced
            .variant
            .package(self.line.unit_price, self.line.quantity)
    }

    fn item(&self) -> NewOrderItem {
        NewOrderItem {
            variant: self.variant(),
            sku: self.priced.variant.sku.clone(),
            product_name: self.priced.product_name.clone(),
            size: self.line.size.clone(),
            colour: self.line.colour.clone(),
            quantity: self.line.quantity,
            unit_price: self.line.unit_price,
        }
    }
}

/// The order drafted inside the checkout transaction.
#[derive(Debug)]
struct Draft {
    order: OrderRecord,
    coupon: Option<CouponUuid>,
}

#[derive(Clone)]
pub struct PgCheckoutService {
    db: Db,
    carts: Arc<dyn CartsService>,
    quoter: Arc<dyn ShippingQuoter>,
    gateway: Arc<dyn PaymentGateway>,
    catalog: PgCatalogRepository,
    orders: PgOrdersRepository,
    coupons: PgCouponsRepository,
    users: PgUsersRepository,
    holds: Holds,
    currency: String,
    reservation_ttl: SignedDuration,
}

impl PgCheckoutService {
    #[must_use]
    pub fn new(
        db: Db,
        carts: Arc<dyn CartsService>,
        quoter: Arc<dyn ShippingQuoter>,
        gateway: Arc<dyn PaymentGateway>,
        settings: &AppSettings,
    ) -> Self {
        Self {
            db,
            carts,
            quoter,
            gateway,
            catalog: PgCatalogRepository::new(),
            orders: PgOrdersRepository::new(),
            coupons: PgCouponsRepository::new(),
            users: PgUsersRepository::new(),
            holds: Holds::new(),
            currency: settings.gateway.currency.clone(),
            reservation_ttl: settings.reservation_ttl,
        }
    }

    /// Pair every line with its catalog row, refusing lines that stopped selling or whose
    /// price moved since the buyer reviewed the cart.
    async fn price_lines(
        &self,
        contents: &CartContents,
        now: Timestamp,
    ) -> Result<Vec<PricedLine>, CheckoutServiceError> {
        let variants: Vec<VariantUuid> = contents
            .lines()
            .iter()
            .map(|line| VariantUuid::from_uuid(line.variant))
            .collect();

        let mut tx = self.db.begin().await?;

        let mut priced: FxHashMap<VariantUuid, PricedVariant> = self
            .catalog
            .get_priced_variants(&mut tx, &variants)
            .await?
            .into_iter()
            .map(|priced| (priced.variant.uuid, priced))
            .collect();

        tx.commit().await?;

        contents
            .lines()
            .iter()
            .map(|line| {
                let variant = VariantUuid::from_uuid(line.variant);
                let priced = priced
                    .remove(&variant)
                    .filter(PricedVariant::is_purchasable)
                    .ok_or(CheckoutServiceError::Unavailable(variant))?;

                if priced.unit_price(now) != line.unit_price {
                    return Err(CheckoutServiceError::PriceChanged(variant));
                }

                Ok(PricedLine {
                    line: line.clone(),
                    priced,
                })
            })
            .collect()
    }

    /// Lock and validate the coupon, returning it with the discount it gives.
    async fn apply_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
        owner: &CartOwner,
        lines: &[CartLine],
        items_total: u64,
        shipping: u64,
        now: Timestamp,
    ) -> Result<(CouponUuid, u64), CheckoutServiceError> {
        let code = normalise_code(code)?;

        let record = self
            .coupons
            .lock_coupon_by_code(tx, &code)
            .await?
            .ok_or(CouponRejection::Unknown)?;

        let (used_by_user, has_paid_order) = match owner.user() {
            Some(user) => (
                self.coupons.used_by_user(tx, record.uuid, user).await?,
                self.orders.has_paid_order(tx, user).await?,
            ),
            None => (false, false),
        };

        record.coupon.validate(&CouponUsage {
            user: owner.user().map(|user| user.into_uuid()),
            items_total,
            used_by_user,
            has_paid_order,
            now,
        })?;

        let discount = record.coupon.discount(lines, shipping)?;

        Ok((record.uuid, discount))
    }

    async fn receipt_email(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: &CartOwner,
        email: Option<String>,
    ) -> Result<Option<String>, CheckoutServiceError> {
        let email = email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());

        match (email, owner.user()) {
            (Some(email), _) => Ok(Some(email)),
            (None, Some(user)) => Ok(Some(self.users.get_user(tx, user).await?.email)),
            (None, None) => Ok(None),
        }
    }

    /// Insert the pending order with its items, consume the coupon and hold the stock, all in
    /// one transaction.
    async fn draft(
        &self,
        request: &CheckoutRequest,
        lines: &[PricedLine],
        contents: &CartContents,
        option: &ShippingOption,
        now: Timestamp,
    ) -> Result<Draft, CheckoutServiceError> {
        let variants: Vec<VariantUuid> = lines.iter().map(PricedLine::variant).collect();
        let cart_lines: Vec<CartLine> = lines.iter().map(|line| line.line.clone()).collect();
        let items_total = contents.items_total();

        let mut tx = self.db.begin().await?;

        let expired = self.holds.sweep_for_variants(&mut tx, &variants, now).await?;

        if !expired.is_empty() {
            tracing::info!(orders = ?expired, "lapsed orders timed out at checkout");
        }

        let (coupon, discount) = match &request.coupon {
            Some(code) => {
                let (coupon, discount) = self
                    .apply_coupon(
                        &mut tx,
                        code,
                        &request.owner,
                        &cart_lines,
                        items_total,
                        option.price,
                        now,
                    )
                    .await?;

                (Some(coupon), discount)
            }
            None => (None, 0),
        };

        let email = self
            .receipt_email(&mut tx, &request.owner, request.email.clone())
            .await?;

        let code = OrderCode::generate(&mut rand::thread_rng());

        let order = self
            .orders
            .insert_order(
                &mut tx,
                &NewOrder {
                    uuid: OrderUuid::new(),
                    code,
                    user: request.owner.user(),
                    cart_owner: request.owner.clone(),
                    cart_hash: contents.content_hash(),
                    totals: OrderTotals::new(items_total, option.price, discount),
                    currency: self.currency.clone(),
                    shipping_option_id: option.id.clone(),
                    shipping_label: option.label.clone(),
                    shipping_address: request.address.clone(),
                    coupon,
                    email,
                },
                now,
            )
            .await?;

        for line in lines {
            self.orders.insert_item(&mut tx, order.uuid, &line.item()).await?;
        }

        if let Some(coupon) = coupon {
            self.coupons
                .consume_use(&mut tx, coupon, order.uuid, order.user, now)
                .await?;
        }

        let wanted: Vec<(VariantUuid, u32)> = lines
            .iter()
            .map(|line| (line.variant(), line.line.quantity))
            .collect();

        self.holds
            .reserve_lines(&mut tx, order.uuid, &wanted, now, self.reservation_ttl)
            .await?;

        self.orders
            .append_status_log(
                &mut tx,
                order.uuid,
                None,
                OrderStatus::PendingPayment,
                Actor::Buyer,
                Some(OPENED_NOTE),
                now,
            )
            .await?;

        tx.commit().await?;

        Ok(Draft { order, coupon })
    }

    /// Undo a draft whose intent could not be created. The order row cascades to its items,
    /// holds and log.
    async fn discard(&self, draft: &Draft) -> Result<(), CheckoutServiceError> {
        let mut tx = self.db.begin().await?;

        if draft.coupon.is_some() {
            self.coupons.release_use(&mut tx, draft.order.uuid).await?;
        }

        self.orders.delete_draft_order(&mut tx, draft.order.uuid).await?;

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl CheckoutService for PgCheckoutService {
    #[tracing::instrument(skip(self, request), fields(owner = %request.owner), err)]
    async fn create_intent(
        &self,
        request: CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutIntent, CheckoutServiceError> {
        let cart = self
            .carts
            .load_verified(request.owner.clone(), request.fingerprint.clone())
            .await?;

        let lines = self.price_lines(&cart.contents, now).await?;

        request.address.validate()?;

        let packages = lines.iter().map(PricedLine::package).collect();
        let quote = self
            .quoter
            .quote(request.address.postal_code.clone(), packages)
            .await;

        let option = quote
            .find(&request.shipping_option)
            .cloned()
            .ok_or_else(|| CheckoutServiceError::UnknownShippingOption(request.shipping_option.clone()))?;

        let draft = self.draft(&request, &lines, &cart.contents, &option, now).await?;

        let intent = match self
            .gateway
            .create_intent(IntentRequest {
                order_code: draft.order.code.clone(),
                amount: draft.order.totals.grand,
                currency: draft.order.currency.clone(),
                email: draft.order.email.clone(),
            })
            .await
        {
            Ok(intent) => intent,
            Err(error) => {
                tracing::warn!(%error, code = %draft.order.code, "payment intent failed; discarding draft order");

                if let Err(cleanup) = self.discard(&draft).await {
                    tracing::error!(error = %cleanup, code = %draft.order.code, "draft order not discarded");
                }

                return Err(error.into());
            }
        };

        let mut tx = self.db.begin().await?;

        self.orders
            .set_payment_intent(&mut tx, draft.order.uuid, &intent.id, now)
            .await?;

        tx.commit().await?;

        tracing::info!(
            code = %draft.order.code,
            grand = draft.order.totals.grand,
            "checkout opened"
        );

        Ok(CheckoutIntent {
            order_code: draft.order.code,
            intent_id: intent.id,
            client_secret: intent.client_secret,
            totals: draft.order.totals,
        })
    }

    async fn shipping_options(
        &self,
        owner: CartOwner,
        postal_code: PostalCode,
        now: Timestamp,
    ) -> Result<QuoteOutcome, CheckoutServiceError> {
        let view = self.carts.view(owner, now).await?;

        let variants: Vec<VariantUuid> = view
            .lines
            .iter()
            .map(|line| VariantUuid::from_uuid(line.variant))
            .collect();

        let mut tx = self.db.begin().await?;

        let priced: FxHashMap<VariantUuid, PricedVariant> = self
            .catalog
            .get_priced_variants(&mut tx, &variants)
            .await?
            .into_iter()
            .map(|priced| (priced.variant.uuid, priced))
            .collect();

        tx.commit().await?;

        let packages = view
            .lines
            .iter()
            .filter_map(|line| {
                priced
                    .get(&VariantUuid::from_uuid(line.variant))
                    .map(|priced| priced.variant.package(line.unit_price, line.quantity))
            })
            .collect();

        Ok(self.quoter.quote(postal_code, packages).await)
    }
}

impl std::fmt::Debug for PgCheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCheckoutService")
            .field("currency", &self.currency)
            .field("reservation_ttl", &self.reservation_ttl)
            .finish_non_exhaustive()
    }
}

#[automock]
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Open a pending order for the reviewed cart, hold its stock and create the payment
    /// intent. Nothing is persisted when the gateway cannot be reached.
    async fn create_intent(
        &self,
        request: CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutIntent, CheckoutServiceError>;

    /// Shipping options for the owner's current cart.
    async fn shipping_options(
        &self,
        owner: CartOwner,
        postal_code: PostalCode,
        now: Timestamp,
    ) -> Result<QuoteOutcome, CheckoutServiceError>;
}

#[cfg(test)]
mod tests {
    use atelier::{
        coupons::CouponKind,
        errors::{Categorised, ErrorKind},
        shipping::QuoteWarning,
    };
    use sqlx::query_scalar;
    use testresult::TestResult;

    use crate::{
        domain::{
            carts::CartsServiceError,
            catalog::CatalogService,
            coupons::{CouponsService, data::NewCoupon},
            orders::OrdersService,
            payments::gateway::{MockPaymentGateway, PaymentGatewayError, PaymentIntent},
            reservations::{ReservationsService, ReservationsServiceError},
            shipping::quoter::MockShippingQuoter,
        },
        test::{
            TestContext,
            helpers::{count_rows, seed_variant, test_address},
        },
    };

    use super::*;

    const PAC: &str = "1";

    fn quoter() -> MockShippingQuoter {
        let mut quoter = MockShippingQuoter::new();

        quoter.expect_quote().returning(|_, _| {
            QuoteOutcome::from_options(vec![ShippingOption {
                id: PAC.to_string(),
                label: "Correios PAC".to_string(),
                price: 2_000,
                delivery_days: Some(6),
            }])
        });

        quoter
    }

    fn accepting_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();

        gateway.expect_create_intent().returning(|request| {
            Ok(PaymentIntent {
                id: format!("pi_{}", request.order_code),
                client_secret: format!("pi_{}_secret", request.order_code),
            })
        });

        gateway
    }

    fn service(ctx: &TestContext, gateway: MockPaymentGateway) -> PgCheckoutService {
        PgCheckoutService::new(
            ctx.db.clone(),
            Arc::new(ctx.carts.clone()),
            Arc::new(quoter()),
            Arc::new(gateway),
            &AppSettings::for_tests(),
        )
    }

    /// Fill a session cart and return its owner with the reviewed fingerprint.
    async fn reviewed_cart(
        ctx: &TestContext,
        session: &str,
        lines: &[(VariantUuid, u32)],
        now: Timestamp,
    ) -> TestResult<(CartOwner, String)> {
        let owner = CartOwner::Session(session.to_string());

        for &(variant, quantity) in lines {
            ctx.carts.add(owner.clone(), variant, quantity, now).await?;
        }

        let view = ctx.carts.view(owner.clone(), now).await?;
        let fingerprint = view.fingerprint.ok_or("non-empty cart is signed")?;

        Ok((owner, fingerprint))
    }

    fn request(owner: CartOwner, fingerprint: String) -> TestResult<CheckoutRequest> {
        Ok(CheckoutRequest {
            owner,
            fingerprint,
            email: Some("ana@example.com".to_string()),
            address: test_address()?,
            shipping_option: PAC.to_string(),
            coupon: None,
        })
    }

    #[tokio::test]
    async fn checkout_opens_a_pending_order_holding_stock() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-CHK", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "chk", &[(variant.uuid, 2)], now).await?;

        let intent = service(&ctx, accepting_gateway())
            .create_intent(request(owner, fingerprint)?, now)
            .await?;

        assert_eq!(intent.totals, OrderTotals::new(11_980, 2_000, 0));
        assert_eq!(intent.intent_id, format!("pi_{}", intent.order_code));

        let order = ctx.orders.get_order(intent.order_code.clone()).await?;

        assert_eq!(order.order.status, OrderStatus::PendingPayment);
        assert_eq!(order.order.payment_intent_id.as_deref(), Some(intent.intent_id.as_str()));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);

        let holds = ctx.reservations.list_for_order(intent.order_code).await?;

        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0].quantity, 2);

        // Stock moves only when payment is captured.
        assert_eq!(ctx.catalog.stock(variant.uuid).await?, 5);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_runs_on_a_spawned_task() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-SPN", 3).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "spn", &[(variant.uuid, 1)], now).await?;

        let checkout: Arc<dyn CheckoutService> = Arc::new(service(&ctx, accepting_gateway()));
        let request = request(owner, fingerprint)?;

        let intent = tokio::spawn(async move { checkout.create_intent(request, now).await }).await??;

        assert_eq!(ctx.orders.get_order(intent.order_code).await?.items.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn gateway_failure_persists_nothing() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-GWF", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "gwf", &[(variant.uuid, 1)], now).await?;

        ctx.coupons
            .create_coupon(NewCoupon::new("DEZ", CouponKind::Percentage { basis_points: 1_000 }))
            .await?;

        let mut gateway = MockPaymentGateway::new();

        gateway.expect_create_intent().once().returning(|_| {
            Err(PaymentGatewayError::Rejected {
                status: 503,
                message: "unavailable".to_string(),
            })
        });

        let mut checkout = request(owner, fingerprint)?;
        checkout.coupon = Some("dez".to_string());

        let result = service(&ctx, gateway).create_intent(checkout, now).await;

        assert!(
            matches!(&result, Err(error) if error.kind() == ErrorKind::GatewayUnreachable),
            "expected GatewayUnreachable, got {result:?}"
        );

        for table in ["orders", "order_items", "reservations", "order_status_log", "coupon_uses"] {
            assert_eq!(count_rows(&ctx, table).await?, 0, "{table} is empty");
        }

        let uses: i32 = query_scalar("SELECT uses FROM coupons WHERE code = 'DEZ'")
            .fetch_one(ctx.db.pool())
            .await?;

        assert_eq!(uses, 0);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_checkouts_for_the_last_unit_admit_one() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-ULT", 1).await?;

        let mut tasks = Vec::new();

        for session in ["first", "second"] {
            let (owner, fingerprint) = reviewed_cart(&ctx, session, &[(variant.uuid, 1)], now).await?;
            let checkout = service(&ctx, accepting_gateway());
            let request = request(owner, fingerprint)?;

            tasks.push(tokio::spawn(async move {
                checkout.create_intent(request, now).await
            }));
        }

        let mut opened = 0;
        let mut refused = 0;

        for task in tasks {
            match task.await? {
                Ok(_) => opened += 1,
                Err(CheckoutServiceError::Reservation(ReservationsServiceError::OutOfStock(_))) => {
                    refused += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((opened, refused), (1, 1));
        assert_eq!(count_rows(&ctx, "orders").await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn coupon_discount_is_applied_and_consumed() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-CUP", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "cup", &[(variant.uuid, 1)], now).await?;

        ctx.coupons
            .create_coupon(NewCoupon::new("FRETEGRATIS", CouponKind::FreeShipping))
            .await?;

        let mut checkout = request(owner, fingerprint)?;
        checkout.coupon = Some("fretegratis".to_string());

        let intent = service(&ctx, accepting_gateway())
            .create_intent(checkout, now)
            .await?;

        assert_eq!(intent.totals, OrderTotals::new(5_990, 2_000, 2_000));
        assert_eq!(intent.totals.grand, 5_990);

        let coupon = ctx.coupons.get_coupon("FRETEGRATIS".to_string()).await?;

        assert_eq!(coupon.coupon.uses, 1);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_coupon_is_rejected_before_anything_is_written() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-NCP", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "ncp", &[(variant.uuid, 1)], now).await?;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_intent().never();

        let mut checkout = request(owner, fingerprint)?;
        checkout.coupon = Some("NAOEXISTE".to_string());

        let result = service(&ctx, gateway).create_intent(checkout, now).await;

        assert!(
            matches!(result, Err(CheckoutServiceError::Coupon(CouponRejection::Unknown))),
            "expected an unknown coupon, got {result:?}"
        );
        assert_eq!(count_rows(&ctx, "orders").await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn stale_fingerprint_is_refused() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-STL", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "stl", &[(variant.uuid, 1)], now).await?;

        ctx.carts.increment(owner.clone(), variant.uuid, now).await?;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_intent().never();

        let result = service(&ctx, gateway)
            .create_intent(request(owner, fingerprint)?, now)
            .await;

        assert!(
            matches!(&result, Err(CheckoutServiceError::Cart(CartsServiceError::Fingerprint(_)))),
            "expected a fingerprint mismatch, got {result:?}"
        );
        assert_eq!(result.err().map(|error| error.kind()), Some(ErrorKind::CartTampered));

        Ok(())
    }

    #[tokio::test]
    async fn price_change_since_review_is_refused() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-PRC", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "prc", &[(variant.uuid, 1)], now).await?;

        sqlx::query("UPDATE products SET base_price = 6990 WHERE uuid = $1")
            .bind(variant.product_uuid.into_uuid())
            .execute(ctx.db.pool())
            .await?;

        let result = service(&ctx, MockPaymentGateway::new())
            .create_intent(request(owner, fingerprint)?, now)
            .await;

        assert!(
            matches!(result, Err(CheckoutServiceError::PriceChanged(v)) if v == variant.uuid),
            "expected PriceChanged, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_shipping_option_is_a_validation_error() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();
        let variant = seed_variant(&ctx, "CAM-OPT", 5).await?;
        let (owner, fingerprint) = reviewed_cart(&ctx, "opt", &[(variant.uuid, 1)], now).await?;

        let mut checkout = request(owner, fingerprint)?;
        checkout.shipping_option = "99".to_string();

        let result = service(&ctx, MockPaymentGateway::new())
            .create_intent(checkout, now)
            .await;

        assert!(
            matches!(&result, Err(CheckoutServiceError::UnknownShippingOption(id)) if id == "99"),
            "expected UnknownShippingOption, got {result:?}"
        );
        assert_eq!(result.err().map(|error| error.kind()), Some(ErrorKind::Validation));

        Ok(())
    }

    #[tokio::test]
    async fn empty_cart_quotes_no_options() -> TestResult {
        let ctx = TestContext::new().await;
        let mut quoter = MockShippingQuoter::new();

        quoter
            .expect_quote()
            .once()
            .withf(|_, packages| packages.is_empty())
            .returning(|_, _| QuoteOutcome::unavailable(QuoteWarning::NoOptions));

        let checkout = PgCheckoutService::new(
            ctx.db.clone(),
            Arc::new(ctx.carts.clone()),
            Arc::new(quoter),
            Arc::new(MockPaymentGateway::new()),
            &AppSettings::for_tests(),
        );

        let outcome = checkout
            .shipping_options(CartOwner::Session("none".to_string()), "01304-001".parse()?, Timestamp::now())
            .await?;

        assert_eq!(outcome.warning, Some(QuoteWarning::NoOptions));

        Ok(())
    }
}
