//! Test Helpers

use atelier::{
    orders::{OrderCode, OrderStatus, OrderTransition},
    pricing::OrderTotals,
    reservations::DEFAULT_TTL,
    webhooks::{DEFAULT_TOLERANCE, WebhookVerifier},
};
use jiff::Timestamp;
use serde_json::json;
use testresult::TestResult;

use crate::{
    domain::{
        carts::records::CartOwner,
        catalog::{
            CatalogService, CatalogServiceError,
            data::{NewProduct, NewVariant},
            records::{ProductRecord, ProductUuid, VariantRecord, VariantUuid},
            repository::PgCatalogRepository,
        },
        orders::{
            data::{NewOrder, NewOrderItem},
            machine::{OrderMachine, TransitionRequest},
            records::{Actor, AppliedTransition, OrderRecord, OrderUuid, ShippingAddress},
            repository::PgOrdersRepository,
        },
        reservations::holds::Holds,
        users::{
            UsersService, UsersServiceError,
            records::{IssuedUser, NewUser, UserUuid},
        },
    },
    test::TestContext,
};

/// Shipping charged on every helper order.
pub(crate) const TEST_SHIPPING: u64 = 2_000;

/// Base price of products made by [`seed_variant`].
pub(crate) const SEED_PRICE: u64 = 5_990;

pub(crate) fn new_product(sku: &str, base_price: u64) -> NewProduct {
    NewProduct {
        uuid: ProductUuid::new(),
        name: format!("Camiseta {sku}"),
        slug: sku.to_lowercase(),
        sku: sku.to_string(),
        description: String::new(),
        category: "camisetas".to_string(),
        base_price,
        sale: None,
    }
}

pub(crate) fn new_variant(product: ProductUuid, colour: &str, size: &str, stock: u32) -> NewVariant {
    NewVariant {
        uuid: VariantUuid::new(),
        product,
        sku: None,
        colour: colour.to_string(),
        colour_code: "#1F3A93".to_string(),
        size: size.to_string(),
        stock,
        surcharge: 0,
        sale: None,
        weight_grams: None,
        width_cm: None,
        height_cm: None,
        length_cm: None,
    }
}

pub(crate) async fn create_product(
    ctx: &TestContext,
    sku: &str,
    base_price: u64,
) -> Result<ProductRecord, CatalogServiceError> {
    ctx.catalog.create_product(new_product(sku, base_price)).await
}

pub(crate) async fn create_variant(
    ctx: &TestContext,
    product: ProductUuid,
    colour: &str,
    size: &str,
    stock: u32,
) -> Result<VariantRecord, CatalogServiceError> {
    ctx.catalog
        .create_variant(new_variant(product, colour, size, stock))
        .await
}

/// A product priced at [`SEED_PRICE`] with one blue M variant holding `stock` units.
pub(crate) async fn seed_variant(ctx: &TestContext, sku: &str, stock: u32) -> TestResult<VariantRecord> {
    let product = create_product(ctx, sku, SEED_PRICE).await?;

    Ok(create_variant(ctx, product.uuid, "Azul", "M", stock).await?)
}

pub(crate) async fn create_user(
    ctx: &TestContext,
    email: &str,
) -> Result<IssuedUser, UsersServiceError> {
    ctx.users
        .create_user(NewUser {
            uuid: UserUuid::new(),
            email: email.to_string(),
            name: "Cliente Teste".to_string(),
        })
        .await
}

pub(crate) fn test_address() -> TestResult<ShippingAddress> {
    Ok(ShippingAddress {
        recipient: "Ana Souza".to_string(),
        street: "Rua Augusta".to_string(),
        number: "1500".to_string(),
        complement: None,
        district: "Consolação".to_string(),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
        postal_code: "01304-001".parse()?,
    })
}

/// Insert a pending order with frozen items, without holds or a payment intent.
pub(crate) async fn draft_order(
    ctx: &TestContext,
    user: Option<UserUuid>,
    lines: &[(VariantUuid, u32)],
    now: Timestamp,
) -> TestResult<OrderRecord> {
    let orders = PgOrdersRepository::new();
    let variants: Vec<VariantUuid> = lines.iter().map(|&(variant, _)| variant).collect();

    let mut tx = ctx.db.begin().await?;

    let priced = PgCatalogRepository::new()
        .get_priced_variants(&mut tx, &variants)
        .await?;

    let mut items = Vec::with_capacity(lines.len());

    for &(variant, quantity) in lines {
        let unit_price = priced
            .iter()
            .find(|priced| priced.variant.uuid == variant)
            .map_or(SEED_PRICE, |priced| priced.unit_price(now));
        let sku = priced
            .iter()
            .find(|priced| priced.variant.uuid == variant)
            .map_or_else(|| "UNKNOWN".to_string(), |priced| priced.variant.sku.clone());

        items.push(NewOrderItem {
            variant,
            sku,
            product_name: "Camiseta".to_string(),
            size: "M".to_string(),
            colour: "Azul".to_string(),
            quantity,
            unit_price,
        });
    }

    let items_total = items
        .iter()
        .map(|item| item.unit_price * u64::from(item.quantity))
        .sum();

    let uuid = OrderUuid::new();
    let code = OrderCode::generate(&mut rand::thread_rng());
    let order = orders
        .insert_order(
            &mut tx,
            &NewOrder {
                uuid,
                code,
                user,
                cart_owner: user.map_or_else(|| CartOwner::Session(format!("test-{uuid}")), CartOwner::User),
                cart_hash: String::new(),
                totals: OrderTotals::new(items_total, TEST_SHIPPING, 0),
                currency: "BRL".to_string(),
                shipping_option_id: "1".to_string(),
                shipping_label: "Correios PAC".to_string(),
                shipping_address: test_address()?,
                coupon: None,
                email: Some("cliente@example.com".to_string()),
            },
            now,
        )
        .await?;

    for item in &items {
        orders.insert_item(&mut tx, order.uuid, item).await?;
    }

    tx.commit().await?;

    Ok(order)
}

/// A pending order holding stock, with a payment intent, as checkout leaves it.
pub(crate) async fn place_order(
    ctx: &TestContext,
    user: Option<UserUuid>,
    lines: &[(VariantUuid, u32)],
    now: Timestamp,
) -> TestResult<OrderRecord> {
    let draft = draft_order(ctx, user, lines, now).await?;
    let orders = PgOrdersRepository::new();

    let mut tx = ctx.db.begin().await?;

    Holds::new()
        .reserve_lines(&mut tx, draft.uuid, lines, now, DEFAULT_TTL)
        .await?;

    orders
        .append_status_log(
            &mut tx,
            draft.uuid,
            None,
            OrderStatus::PendingPayment,
            Actor::Buyer,
            None,
            now,
        )
        .await?;

    let order = orders
        .set_payment_intent(&mut tx, draft.uuid, &format!("pi_{}", draft.code), now)
        .await?;

    tx.commit().await?;

    Ok(order)
}

/// Apply a gateway capture directly through the order machine.
pub(crate) async fn capture(
    ctx: &TestContext,
    order: &OrderRecord,
    now: Timestamp,
) -> TestResult<AppliedTransition> {
    let mut tx = ctx.db.begin().await?;

    let applied = OrderMachine::new()
        .apply(
            &mut tx,
            order.uuid,
            &TransitionRequest::new(OrderTransition::Capture, Actor::Gateway, now),
        )
        .await?;

    tx.commit().await?;

    Ok(applied)
}

/// A gateway event body and its signature header, signed with the test webhook secret.
pub(crate) fn signed_event(
    event_id: &str,
    kind: &str,
    intent: &str,
    at: Timestamp,
) -> TestResult<(Vec<u8>, String)> {
    let payload = serde_json::to_vec(&json!({
        "id": event_id,
        "type": kind,
        "data": { "object": { "id": intent } },
    }))?;

    let signature = WebhookVerifier::new(b"whsec_test".to_vec(), DEFAULT_TOLERANCE)?
        .sign_payload(&payload, at.as_second())?;

    Ok((payload, signature))
}

/// Row count of a table named by a test.
pub(crate) async fn count_rows(ctx: &TestContext, table: &str) -> TestResult<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(ctx.db.pool())
        .await?;

    Ok(count)
}
