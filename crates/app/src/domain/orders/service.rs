//! Orders service.

use async_trait::async_trait;
use atelier::orders::{OrderCode, OrderTransition};
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::{
        orders::{
            data::Requester,
            errors::OrdersServiceError,
            machine::{OrderMachine, TransitionRequest},
            records::{Actor, OrderDetails, OrderRecord, StatusLogRecord},
            repository::PgOrdersRepository,
        },
        users::records::UserUuid,
    },
};

#[derive(Debug, Clone)]
pub struct PgOrdersService {
    db: Db,
    repository: PgOrdersRepository,
    machine: OrderMachine,
}

impl PgOrdersService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgOrdersRepository::new(),
            machine: OrderMachine::new(),
        }
    }

    async fn apply_by_code(
        &self,
        code: &OrderCode,
        request: TransitionRequest<'_>,
        requester: Requester,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.repository.get_order_by_code(&mut tx, code).await?;

        if let Requester::Buyer(user) = requester
            && order.user != Some(user)
        {
            return Err(OrdersServiceError::Forbidden);
        }

        let applied = self.machine.apply(&mut tx, order.uuid, &request).await?;

        tx.commit().await?;

        Ok(applied.order)
    }
}

#[async_trait]
impl OrdersService for PgOrdersService {
    async fn get_order(&self, code: OrderCode) -> Result<OrderDetails, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.repository.get_order_by_code(&mut tx, &code).await?;
        let items = self.repository.list_items(&mut tx, order.uuid).await?;

        tx.commit().await?;

        Ok(OrderDetails { order, items })
    }

    async fn list_orders(&self, user: UserUuid) -> Result<Vec<OrderRecord>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let orders = self.repository.list_orders_for_user(&mut tx, user).await?;

        tx.commit().await?;

        Ok(orders)
    }

    async fn history(&self, code: OrderCode) -> Result<Vec<StatusLogRecord>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.repository.get_order_by_code(&mut tx, &code).await?;
        let history = self.repository.history(&mut tx, order.uuid).await?;

        tx.commit().await?;

        Ok(history)
    }

    #[tracing::instrument(skip(self), fields(order = %code), err)]
    async fn ship(
        &self,
        code: OrderCode,
        tracking_code: Option<String>,
        now: Timestamp,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let tracking_code = tracking_code.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let request = TransitionRequest::new(OrderTransition::Ship, Actor::Operator, now)
            .with_tracking_code(tracking_code);

        self.apply_by_code(&code, request, Requester::Operator).await
    }

    #[tracing::instrument(skip(self), fields(order = %code), err)]
    async fn mark_in_transit(&self, code: OrderCode, now: Timestamp) -> Result<OrderRecord, OrdersServiceError> {
        let request = TransitionRequest::new(OrderTransition::Arrive, Actor::Operator, now);

        self.apply_by_code(&code, request, Requester::Operator).await
    }

    #[tracing::instrument(skip(self), fields(order = %code), err)]
    async fn mark_delivered(&self, code: OrderCode, now: Timestamp) -> Result<OrderRecord, OrdersServiceError> {
        let request = TransitionRequest::new(OrderTransition::Deliver, Actor::Operator, now);

        self.apply_by_code(&code, request, Requester::Operator).await
    }

    #[tracing::instrument(skip(self), fields(order = %code), err)]
    async fn cancel(
        &self,
        code: OrderCode,
        requester: Requester,
        now: Timestamp,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let request = TransitionRequest::new(OrderTransition::Cancel, requester.actor(), now);

        self.apply_by_code(&code, request, requester).await
    }

    #[tracing::instrument(skip(self), fields(order = %code), err)]
    async fn refund(&self, code: OrderCode, now: Timestamp) -> Result<OrderRecord, OrdersServiceError> {
        let request = TransitionRequest::new(OrderTransition::Refund, Actor::Operator, now);

        self.apply_by_code(&code, request, Requester::Operator).await
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Order with its frozen items.
    async fn get_order(&self, code: OrderCode) -> Result<OrderDetails, OrdersServiceError>;

    /// Orders placed by `user`, newest first.
    async fn list_orders(&self, user: UserUuid) -> Result<Vec<OrderRecord>, OrdersServiceError>;

    /// Status log, oldest first.
    async fn history(&self, code: OrderCode) -> Result<Vec<StatusLogRecord>, OrdersServiceError>;

    /// `PA -> E`, optionally recording the carrier tracking code.
    async fn ship(
        &self,
        code: OrderCode,
        tracking_code: Option<String>,
        now: Timestamp,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// `E -> T`
    async fn mark_in_transit(&self, code: OrderCode, now: Timestamp) -> Result<OrderRecord, OrdersServiceError>;

    /// `T -> C`
    async fn mark_delivered(&self, code: OrderCode, now: Timestamp) -> Result<OrderRecord, OrdersServiceError>;

    /// `PA -> X`, restoring stock and queueing a refund.
    async fn cancel(
        &self,
        code: OrderCode,
        requester: Requester,
        now: Timestamp,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Paid state `-> D`, restoring stock and queueing a refund.
    async fn refund(&self, code: OrderCode, now: Timestamp) -> Result<OrderRecord, OrdersServiceError>;
}
