//! Topic handlers.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::{
        carts::stores::CartStores,
        outbox::{
            errors::OutboxHandlerError,
            mailer::{Email, Mailer},
            messages::{CheckoutCompleted, OutboxMessage, RefundRequested, StatusChanged},
            records::OutboxEntry,
            repository::{NewNotification, PgOutboxRepository},
        },
        payments::gateway::{PaymentGateway, RefundRequest},
    },
};

/// Delivers entries of one topic. Delivery is at least once, so handlers must be idempotent.
#[automock]
#[async_trait]
pub trait OutboxHandler: Send + Sync {
    async fn handle(&self, entry: &OutboxEntry, now: Timestamp) -> Result<(), OutboxHandlerError>;
}

fn decode<M: OutboxMessage>(entry: &OutboxEntry) -> Result<M, OutboxHandlerError> {
    Ok(serde_json::from_value(entry.payload.clone())?)
}

/// `order.status_changed`: an in-app notification for registered buyers and an email.
pub struct StatusChangedHandler {
    db: Db,
    repository: PgOutboxRepository,
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl StatusChangedHandler {
    #[must_use]
    pub fn new(db: Db, mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            db,
            repository: PgOutboxRepository::new(),
            mailer,
            from: from.into(),
        }
    }
}

#[async_trait]
impl OutboxHandler for StatusChangedHandler {
    async fn handle(&self, entry: &OutboxEntry, now: Timestamp) -> Result<(), OutboxHandlerError> {
        let message: StatusChanged = decode(entry)?;
        let title = format!("Order {} is {}", message.code, message.to.label());
        let body = match &message.tracking_code {
            Some(tracking) => format!("{title}. Tracking code: {tracking}."),
            None => format!("{title}."),
        };

        if message.user.is_some() {
            let mut tx = self.db.begin().await?;

            self.repository
                .insert_notification(&mut tx, &NewNotification {
                    uuid: entry.uuid.into_uuid(),
                    user: message.user,
                    order: message.order,
                    kind: StatusChanged::TOPIC,
                    title: &title,
                    body: &body,
                    now,
                })
                .await?;

            tx.commit().await?;
        }

        if let Some(to) = message.email {
            let email = Email {
                from: self.from.clone(),
                to,
                subject: title,
                body,
            };

            // The notification insert above is keyed on the entry, so a retry only resends mail.
            self.mailer.send(email).await.inspect_err(|error| {
                tracing::warn!(order = %message.code, %error, "status email not sent");
            })?;
        }

        Ok(())
    }
}

/// `payment.refund_requested`: a full refund through the gateway.
pub struct RefundHandler {
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundHandler {
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl OutboxHandler for RefundHandler {
    async fn handle(&self, entry: &OutboxEntry, _now: Timestamp) -> Result<(), OutboxHandlerError> {
        let message: RefundRequested = decode(entry)?;

        let receipt = self
            .gateway
            .refund(RefundRequest::for_order(
                &message.code,
                message.payment_intent_id,
                message.amount,
            ))
            .await?;

        tracing::info!(order = %message.code, refund = %receipt.id, "payment refunded");

        Ok(())
    }
}

/// `cart.checkout_completed`: clear the buyer's cart unless it changed after checkout.
pub struct CartCleanupHandler {
    stores: CartStores,
}

impl CartCleanupHandler {
    #[must_use]
    pub fn new(stores: CartStores) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl OutboxHandler for CartCleanupHandler {
    async fn handle(&self, entry: &OutboxEntry, _now: Timestamp) -> Result<(), OutboxHandlerError> {
        let message: CheckoutCompleted = decode(entry)?;
        let store = self.stores.for_owner(&message.owner);

        let Some(cart) = store.load(&message.owner).await? else {
            return Ok(());
        };

        if cart.contents.content_hash() == message.cart_hash {
            store.clear(&message.owner).await?;

            tracing::info!(owner = %message.owner, "cart cleared after checkout");
        } else {
            tracing::debug!(owner = %message.owner, "cart changed after checkout; kept");
        }

        Ok(())
    }
}
