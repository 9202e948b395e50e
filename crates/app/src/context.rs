//! App Context

use std::sync::Arc;

use atelier::{
    carts::fingerprint::{CartSigner, FingerprintError},
    webhooks::{VerificationError, WebhookVerifier},
};
use thiserror::Error;

use crate::{
    cache::{MemoryCache, SharedCache},
    database::{self, Db},
    domain::{
        carts::{CartsService, PgCartsService, rate_limit::CartRateLimiter, stores::CartStores},
        catalog::{CatalogService, PgCatalogService},
        checkout::{CheckoutService, PgCheckoutService},
        coupons::{CouponsService, PgCouponsService},
        ledger::{LedgerService, PgLedgerService},
        orders::{OrdersService, PgOrdersService},
        outbox::{
            OutboxService, OutboxWorker,
            handlers::{CartCleanupHandler, RefundHandler, StatusChangedHandler},
            mailer::TracingMailer,
            messages::{CheckoutCompleted, OutboxMessage, RefundRequested, StatusChanged},
        },
        payments::{
            PgWebhooksService, WebhooksService,
            gateway::{PaymentGateway, PaymentGatewayError},
            stripe::StripeGateway,
        },
        reservations::{PgReservationsService, ReservationsService},
        shipping::{CarrierError, CarrierQuoter, MelhorEnvioClient},
        users::{PgUsersService, UsersService},
    },
    settings::AppSettings,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply migrations")]
    Migrations(#[source] sqlx::migrate::MigrateError),

    #[error("payment gateway client could not be built")]
    Gateway(#[source] PaymentGatewayError),

    #[error("carrier client could not be built")]
    Carrier(#[source] CarrierError),

    #[error("cart signing key is unusable")]
    CartSigner(#[source] FingerprintError),

    #[error("webhook secret is unusable")]
    WebhookSecret(#[source] VerificationError),
}

#[derive(Clone)]
pub struct AppContext {
    pub catalog: Arc<dyn CatalogService>,
    pub carts: Arc<dyn CartsService>,
    pub checkout: Arc<dyn CheckoutService>,
    pub coupons: Arc<dyn CouponsService>,
    pub ledger: Arc<dyn LedgerService>,
    pub orders: Arc<dyn OrdersService>,
    pub reservations: Arc<dyn ReservationsService>,
    pub webhooks: Arc<dyn WebhooksService>,
    pub users: Arc<dyn UsersService>,
    pub outbox: Arc<dyn OutboxService>,

    /// Process-local cache behind rate limits, quotes and session carts.
    pub cache: Arc<MemoryCache>,
}

impl AppContext {
    /// Build application context from a database URL, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the database is unreachable, a migration fails or an
    /// integration client cannot be built from `settings`.
    pub async fn from_database_url(url: &str, settings: &AppSettings) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrations)?;

        Self::from_db(Db::new(pool), settings)
    }

    /// Wire every service against `db`.
    ///
    /// # Errors
    ///
    /// Returns an error when an integration client cannot be built from `settings`.
    pub fn from_db(db: Db, settings: &AppSettings) -> Result<Self, AppInitError> {
        let cache = Arc::new(MemoryCache::new());
        let shared: Arc<dyn SharedCache> = cache.clone();

        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(StripeGateway::new(&settings.gateway).map_err(AppInitError::Gateway)?);

        let carrier = MelhorEnvioClient::new(&settings.carrier).map_err(AppInitError::Carrier)?;
        let quoter = CarrierQuoter::new(
            Arc::new(carrier),
            Arc::clone(&shared),
            settings.carrier.origin.clone(),
            settings.quote_cache_ttl,
        );

        let signer = CartSigner::new(settings.cart_signing_key.as_bytes())
            .map_err(AppInitError::CartSigner)?;
        let verifier = WebhookVerifier::new(
            settings.webhook_secret.as_bytes().to_vec(),
            settings.webhook_tolerance,
        )
        .map_err(AppInitError::WebhookSecret)?;

        let stores = CartStores::standard(db.clone(), Arc::clone(&shared), settings.session_cart_ttl);
        let limiter = CartRateLimiter::new(Arc::clone(&shared), settings.cart_rate_limit);

        let carts: Arc<dyn CartsService> = Arc::new(PgCartsService::new(
            db.clone(),
            stores.clone(),
            Arc::new(limiter),
            Arc::new(signer),
        ));

        let checkout = PgCheckoutService::new(
            db.clone(),
            Arc::clone(&carts),
            Arc::new(quoter),
            Arc::clone(&gateway),
            settings,
        );

        let outbox = OutboxWorker::new(
            db.clone(),
            settings.outbox_batch_size,
            settings.outbox_max_attempts,
        )
        .with_handler(
            StatusChanged::TOPIC,
            Arc::new(StatusChangedHandler::new(
                db.clone(),
                Arc::new(TracingMailer),
                settings.notification_from.clone(),
            )),
        )
        .with_handler(RefundRequested::TOPIC, Arc::new(RefundHandler::new(gateway)))
        .with_handler(CheckoutCompleted::TOPIC, Arc::new(CartCleanupHandler::new(stores)));

        Ok(Self {
            catalog: Arc::new(PgCatalogService::new(db.clone())),
            carts,
            checkout: Arc::new(checkout),
            coupons: Arc::new(PgCouponsService::new(db.clone())),
            ledger: Arc::new(PgLedgerService::new(db.clone())),
            orders: Arc::new(PgOrdersService::new(db.clone())),
            reservations: Arc::new(PgReservationsService::new(db.clone())),
            webhooks: Arc::new(PgWebhooksService::new(db.clone(), verifier)),
            users: Arc::new(PgUsersService::new(db)),
            outbox: Arc::new(outbox),
            cache,
        })
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}
