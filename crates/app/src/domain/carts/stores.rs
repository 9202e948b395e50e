//! Cart stores
//!
//! Anonymous carts live in the shared cache under the visitor's session id; buyer carts live in
//! Postgres. Both sit behind [`CartStore`] so the carts service never branches on storage.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use atelier::{
    carts::{CartContents, CartError},
    errors::{Categorised, ErrorKind},
};
use mockall::automock;
use thiserror::Error;

use crate::{
    cache::{CacheError, SharedCache},
    database::Db,
    domain::carts::{
        records::{CartOwner, StoredCart},
        repository::PgCartsRepository,
    },
};

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),

    #[error("stored cart could not be decoded")]
    Corrupt(#[from] serde_json::Error),

    #[error("stored cart lines are invalid")]
    InvalidContents(#[from] CartError),

    #[error("{0} is not kept in this store")]
    UnsupportedOwner(CartOwner),
}

impl Categorised for CartStoreError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

#[automock]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The owner's cart, if one was saved.
    async fn load(&self, owner: &CartOwner) -> Result<Option<StoredCart>, CartStoreError>;

    /// Replace the owner's cart.
    async fn save(&self, owner: &CartOwner, cart: &StoredCart) -> Result<(), CartStoreError>;

    /// Forget the owner's cart. Clearing a missing cart is not an error.
    async fn clear(&self, owner: &CartOwner) -> Result<(), CartStoreError>;
}

/// Anonymous carts kept in the shared cache, refreshed on every save.
pub struct SessionCartStore {
    cache: Arc<dyn SharedCache>,
    ttl: Duration,
}

impl SessionCartStore {
    #[must_use]
    pub fn new(cache: Arc<dyn SharedCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(owner: &CartOwner) -> Result<String, CartStoreError> {
        match owner {
            CartOwner::Session(id) => Ok(format!("cart:session:{id}")),
            CartOwner::User(_) => Err(CartStoreError::UnsupportedOwner(owner.clone())),
        }
    }
}

#[async_trait]
impl CartStore for SessionCartStore {
    async fn load(&self, owner: &CartOwner) -> Result<Option<StoredCart>, CartStoreError> {
        let key = Self::key(owner)?;

        match self.cache.get(&key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, owner: &CartOwner, cart: &StoredCart) -> Result<(), CartStoreError> {
        let key = Self::key(owner)?;
        let json = serde_json::to_string(cart)?;

        self.cache.set_with_ttl(&key, json, self.ttl).await?;

        Ok(())
    }

    async fn clear(&self, owner: &CartOwner) -> Result<(), CartStoreError> {
        let key = Self::key(owner)?;

        self.cache.delete(&key).await?;

        Ok(())
    }
}

/// Buyer carts persisted in `carts` and `cart_lines`.
#[derive(Debug, Clone)]
pub struct UserCartStore {
    db: Db,
    repository: PgCartsRepository,
}

impl UserCartStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCartsRepository::new(),
        }
    }
}

#[async_trait]
impl CartStore for UserCartStore {
    async fn load(&self, owner: &CartOwner) -> Result<Option<StoredCart>, CartStoreError> {
        let Some(user) = owner.user() else {
            return Err(CartStoreError::UnsupportedOwner(owner.clone()));
        };

        let mut tx = self.db.begin().await?;

        let Some(row) = self.repository.get_user_cart(&mut tx, user).await? else {
            return Ok(None);
        };

        let lines = self.repository.list_lines(&mut tx, row.uuid).await?;

        tx.commit().await?;

        Ok(Some(StoredCart {
            uuid: row.uuid,
            contents: CartContents::from_lines(lines)?,
            protection: row.protection,
        }))
    }

    async fn save(&self, owner: &CartOwner, cart: &StoredCart) -> Result<(), CartStoreError> {
        let Some(user) = owner.user() else {
            return Err(CartStoreError::UnsupportedOwner(owner.clone()));
        };

        let mut tx = self.db.begin().await?;

        self.repository
            .replace_user_cart(
                &mut tx,
                user,
                cart.uuid,
                cart.protection.as_ref(),
                cart.contents.lines(),
            )
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn clear(&self, owner: &CartOwner) -> Result<(), CartStoreError> {
        let Some(user) = owner.user() else {
            return Err(CartStoreError::UnsupportedOwner(owner.clone()));
        };

        let mut tx = self.db.begin().await?;

        self.repository.delete_user_cart(&mut tx, user).await?;

        tx.commit().await?;

        Ok(())
    }
}

/// Picks the store that keeps a given owner's cart.
#[derive(Clone)]
pub struct CartStores {
    session: Arc<dyn CartStore>,
    user: Arc<dyn CartStore>,
}

impl CartStores {
    #[must_use]
    pub fn new(session: Arc<dyn CartStore>, user: Arc<dyn CartStore>) -> Self {
        Self { session, user }
    }

    /// The cache-backed session store and the Postgres user store.
    #[must_use]
    pub fn standard(db: Db, cache: Arc<dyn SharedCache>, session_ttl: Duration) -> Self {
        Self::new(
            Arc::new(SessionCartStore::new(cache, session_ttl)),
            Arc::new(UserCartStore::new(db)),
        )
    }

    #[must_use]
    pub fn for_owner(&self, owner: &CartOwner) -> &dyn CartStore {
        match owner {
            CartOwner::Session(_) => self.session.as_ref(),
            CartOwner::User(_) => self.user.as_ref(),
        }
    }
}

impl std::fmt::Debug for CartStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStores").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use atelier::carts::CartLine;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::{
        cache::MemoryCache,
        domain::users::records::UserUuid,
        test::{TestContext, helpers::create_user},
    };

    use super::*;

    fn cart_with(quantity: u32) -> TestResult<StoredCart> {
        let mut cart = StoredCart::empty();

        cart.contents.add(CartLine {
            variant: Uuid::now_v7(),
            quantity,
            size: "M".to_string(),
            colour: "Azul".to_string(),
            unit_price: 4_990,
        })?;

        Ok(cart)
    }

    #[tokio::test]
    async fn session_carts_round_trip_through_the_cache() -> TestResult {
        let store = SessionCartStore::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let owner = CartOwner::Session("abc".to_string());
        let cart = cart_with(2)?;

        assert_eq!(store.load(&owner).await?, None);

        store.save(&owner, &cart).await?;

        assert_eq!(store.load(&owner).await?, Some(cart));

        store.clear(&owner).await?;

        assert_eq!(store.load(&owner).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn session_store_refuses_user_owners() {
        let store = SessionCartStore::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let result = store.load(&CartOwner::User(UserUuid::new())).await;

        assert!(
            matches!(result, Err(CartStoreError::UnsupportedOwner(_))),
            "expected UnsupportedOwner, got {result:?}"
        );
    }

    #[tokio::test]
    async fn user_carts_persist_lines_in_order() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "cart@example.com").await?.user;
        let variant = crate::test::helpers::seed_variant(&ctx, "CAM-UCS", 5).await?;
        let store = UserCartStore::new(ctx.db.clone());
        let owner = CartOwner::User(user.uuid);

        let mut cart = StoredCart::empty();

        cart.contents.add(CartLine {
            variant: variant.uuid.into_uuid(),
            quantity: 3,
            size: variant.size.clone(),
            colour: variant.colour.clone(),
            unit_price: 4_990,
        })?;

        store.save(&owner, &cart).await?;

        assert_eq!(store.load(&owner).await?, Some(cart.clone()));

        cart.contents.clear();
        store.save(&owner, &cart).await?;

        let reloaded = store.load(&owner).await?.ok_or("cart kept")?;

        assert!(reloaded.contents.is_empty());

        store.clear(&owner).await?;

        assert_eq!(store.load(&owner).await?, None);

        Ok(())
    }
}
