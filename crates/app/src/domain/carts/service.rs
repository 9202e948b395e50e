//! Carts service.

use std::sync::Arc;

use async_trait::async_trait;
use atelier::carts::{
    CartError, CartLine,
    fingerprint::{CartSigner, FingerprintError},
    validate_quantity,
};
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashMap;

use crate::{
    database::Db,
    domain::{
        carts::{
            errors::CartsServiceError,
            rate_limit::CartRateLimiter,
            records::{CartOwner, CartView, StoredCart},
            stores::CartStores,
        },
        catalog::{
            records::{PricedVariant, VariantUuid},
            repository::PgCatalogRepository,
        },
        users::records::UserUuid,
    },
};

/// A line-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOp {
    Increment,
    Decrement,
    Remove,
}

#[derive(Debug, Clone)]
pub struct PgCartsService {
    db: Db,
    catalog: PgCatalogRepository,
    stores: CartStores,
    limiter: Arc<CartRateLimiter>,
    signer: Arc<CartSigner>,
}

impl PgCartsService {
    #[must_use]
    pub fn new(
        db: Db,
        stores: CartStores,
        limiter: Arc<CartRateLimiter>,
        signer: Arc<CartSigner>,
    ) -> Self {
        Self {
            db,
            catalog: PgCatalogRepository::new(),
            stores,
            limiter,
            signer,
        }
    }

    async fn check_rate(&self, owner: &CartOwner, now: Timestamp) -> Result<(), CartsServiceError> {
        if let Some(user) = owner.user() {
            self.limiter
                .check(user, now)
                .await
                .map_err(|limited| CartsServiceError::RateLimited {
                    retry_after: limited.retry_after,
                })?;
        }

        Ok(())
    }

    /// The owner's cart, or a fresh empty one, with its stored fingerprint re-verified.
    async fn load(&self, owner: &CartOwner) -> Result<StoredCart, CartsServiceError> {
        let Some(cart) = self.stores.for_owner(owner).load(owner).await? else {
            return Ok(StoredCart::empty());
        };

        self.verify(&cart, None)?;

        Ok(cart)
    }

    fn verify(&self, cart: &StoredCart, presented: Option<&str>) -> Result<(), CartsServiceError> {
        match &cart.protection {
            Some(protection) => {
                self.signer
                    .verify(cart.uuid.into_uuid(), &cart.contents, protection, presented)?;
            }
            None if cart.contents.is_empty() && presented.is_none() => {}
            None => return Err(FingerprintError::Tampered.into()),
        }

        Ok(())
    }

    /// Re-issue the fingerprint and save.
    async fn persist(
        &self,
        owner: &CartOwner,
        mut cart: StoredCart,
        now: Timestamp,
    ) -> Result<StoredCart, CartsServiceError> {
        cart.protection = if cart.contents.is_empty() {
            None
        } else {
            Some(self.signer.issue(cart.uuid.into_uuid(), &cart.contents, now)?)
        };

        self.stores.for_owner(owner).save(owner, &cart).await?;

        Ok(cart)
    }

    async fn priced_variants(
        &self,
        variants: &[VariantUuid],
    ) -> Result<FxHashMap<VariantUuid, PricedVariant>, CartsServiceError> {
        if variants.is_empty() {
            return Ok(FxHashMap::default());
        }

        let mut tx = self.db.begin().await?;

        let priced = self.catalog.get_priced_variants(&mut tx, variants).await?;

        tx.commit().await?;

        Ok(priced
            .into_iter()
            .map(|priced| (priced.variant.uuid, priced))
            .collect())
    }

    async fn purchasable(&self, variant: VariantUuid) -> Result<PricedVariant, CartsServiceError> {
        let priced = self
            .priced_variants(&[variant])
            .await?
            .remove(&variant)
            .ok_or(CartsServiceError::UnknownVariant(variant))?;

        if !priced.is_purchasable() {
            return Err(CartsServiceError::Unavailable(variant));
        }

        Ok(priced)
    }

    /// Refresh snapshot prices from the catalog, dropping lines whose variant is gone or no
    /// longer sold. Returns whether anything changed.
    async fn reprice(&self, cart: &mut StoredCart, now: Timestamp) -> Result<bool, CartsServiceError> {
        let variants: Vec<VariantUuid> = cart
            .contents
            .lines()
            .iter()
            .map(|line| VariantUuid::from_uuid(line.variant))
            .collect();
        let priced = self.priced_variants(&variants).await?;
        let mut changed = false;

        for variant in variants {
            match priced.get(&variant).filter(|priced| priced.is_purchasable()) {
                Some(priced) => {
                    changed |= cart
                        .contents
                        .refresh_price(variant.into_uuid(), priced.unit_price(now));
                }
                None => {
                    cart.contents.remove(variant.into_uuid())?;
                    changed = true;

                    tracing::info!(%variant, "unavailable variant dropped from cart");
                }
            }
        }

        Ok(changed)
    }

    async fn change_line(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        op: LineOp,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        self.check_rate(&owner, now).await?;

        let mut cart = self.load(&owner).await?;

        match op {
            LineOp::Increment => {
                let current = cart
                    .contents
                    .line(variant.into_uuid())
                    .map(|line| line.quantity)
                    .ok_or(CartError::UnknownLine(variant.into_uuid()))?;
                let priced = self.purchasable(variant).await?;

                check_stock(&priced, current.saturating_add(1))?;

                cart.contents.increment(variant.into_uuid())?;
            }
            LineOp::Decrement => {
                cart.contents.decrement(variant.into_uuid())?;
            }
            LineOp::Remove => {
                cart.contents.remove(variant.into_uuid())?;
            }
        }

        let cart = self.persist(&owner, cart, now).await?;

        Ok(CartView::new(&cart, false))
    }
}

fn check_stock(priced: &PricedVariant, quantity: u32) -> Result<(), CartsServiceError> {
    if i64::from(quantity) > priced.variant.stock {
        return Err(CartsServiceError::OutOfStock {
            variant: priced.variant.uuid,
            available: priced.variant.stock.max(0),
        });
    }

    Ok(())
}

#[async_trait]
impl CartsService for PgCartsService {
    async fn view(&self, owner: CartOwner, now: Timestamp) -> Result<CartView, CartsServiceError> {
        let mut cart = self.load(&owner).await?;

        if !self.reprice(&mut cart, now).await? {
            return Ok(CartView::new(&cart, false));
        }

        let cart = self.persist(&owner, cart, now).await?;

        Ok(CartView::new(&cart, true))
    }

    #[tracing::instrument(skip(self, owner), fields(%owner), err)]
    async fn add(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        quantity: u32,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        validate_quantity(quantity)?;

        self.check_rate(&owner, now).await?;

        let mut cart = self.load(&owner).await?;
        let priced = self.purchasable(variant).await?;
        let held = cart
            .contents
            .line(variant.into_uuid())
            .map_or(0, |line| line.quantity);

        check_stock(&priced, held.saturating_add(quantity))?;

        cart.contents.add(CartLine {
            variant: variant.into_uuid(),
            quantity,
            size: priced.variant.size.clone(),
            colour: priced.variant.colour.clone(),
            unit_price: priced.unit_price(now),
        })?;

        let cart = self.persist(&owner, cart, now).await?;

        Ok(CartView::new(&cart, false))
    }

    async fn increment(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        self.change_line(owner, variant, LineOp::Increment, now).await
    }

    async fn decrement(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        self.change_line(owner, variant, LineOp::Decrement, now).await
    }

    async fn remove(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        self.change_line(owner, variant, LineOp::Remove, now).await
    }

    async fn clear(&self, owner: CartOwner, now: Timestamp) -> Result<CartView, CartsServiceError> {
        self.check_rate(&owner, now).await?;

        let mut cart = self.load(&owner).await?;

        cart.contents.clear();

        let cart = self.persist(&owner, cart, now).await?;

        Ok(CartView::new(&cart, false))
    }

    #[tracing::instrument(skip(self, session), fields(%user), err)]
    async fn merge_session_into_user(
        &self,
        session: String,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        let session = CartOwner::Session(session);
        let owner = CartOwner::User(user);

        let anonymous = self.load(&session).await?;
        let mut cart = self.load(&owner).await?;

        if anonymous.contents.is_empty() {
            return Ok(CartView::new(&cart, false));
        }

        let report = cart.contents.merge(&anonymous.contents);
        let cart = self.persist(&owner, cart, now).await?;

        self.stores.for_owner(&session).clear(&session).await?;

        tracing::info!(
            merged = report.merged,
            capped = report.capped,
            dropped = report.dropped,
            "session cart merged"
        );

        Ok(CartView::new(&cart, false))
    }

    async fn review(
        &self,
        owner: CartOwner,
        fingerprint: String,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError> {
        let mut cart = self.load_verified(owner.clone(), fingerprint).await?;

        if !self.reprice(&mut cart, now).await? {
            return Ok(CartView::new(&cart, false));
        }

        let cart = self.persist(&owner, cart, now).await?;

        Ok(CartView::new(&cart, true))
    }

    async fn load_verified(
        &self,
        owner: CartOwner,
        fingerprint: String,
    ) -> Result<StoredCart, CartsServiceError> {
        let Some(cart) = self.stores.for_owner(&owner).load(&owner).await? else {
            return Err(CartsServiceError::EmptyCart);
        };

        if cart.contents.is_empty() {
            return Err(CartsServiceError::EmptyCart);
        }

        if let Err(error) = self.verify(&cart, Some(&fingerprint)) {
            tracing::warn!(%owner, "cart fingerprint mismatch");

            return Err(error);
        }

        Ok(cart)
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// The cart with prices recomputed from the catalog.
    async fn view(&self, owner: CartOwner, now: Timestamp) -> Result<CartView, CartsServiceError>;

    /// Add `quantity` units of `variant`, summing into an existing line.
    async fn add(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        quantity: u32,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError>;

    async fn increment(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError>;

    /// Take one unit off a line; the last unit removes it.
    async fn decrement(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError>;

    async fn remove(
        &self,
        owner: CartOwner,
        variant: VariantUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError>;

    async fn clear(&self, owner: CartOwner, now: Timestamp) -> Result<CartView, CartsServiceError>;

    /// Fold an anonymous cart into the buyer's cart at login, summing quantities per variant.
    async fn merge_session_into_user(
        &self,
        session: String,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError>;

    /// Confirm the cart the client reviewed is the one stored.
    async fn review(
        &self,
        owner: CartOwner,
        fingerprint: String,
        now: Timestamp,
    ) -> Result<CartView, CartsServiceError>;

    /// The stored cart, provided the client's fingerprint matches it.
    async fn load_verified(
        &self,
        owner: CartOwner,
        fingerprint: String,
    ) -> Result<StoredCart, CartsServiceError>;
}
