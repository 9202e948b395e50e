//! Throwaway Postgres databases for integration tests
//!
//! One container is started per test binary. Every [`TestDb`] gets its own database inside it,
//! migrated from scratch, so tests never share rows and need no rollback tricks. Databases are
//! dropped in the background once their `TestDb` goes away.

use once_cell::sync::Lazy;
use sqlx::{Connection, PgConnection, PgPool};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::{OnceCell, mpsc};
use uuid::Uuid;

const USER: &str = "atelier";
const PASSWORD: &str = "atelier";
const NAME_PREFIX: &str = "atelier_test_";

static CONTAINER: Lazy<OnceCell<ContainerAsync<PostgresImage>>> = Lazy::new(OnceCell::new);

static DROPPER: Lazy<OnceCell<mpsc::UnboundedSender<String>>> = Lazy::new(OnceCell::new);

/// Only names this module generated are ever interpolated into DDL.
fn is_generated_name(name: &str) -> bool {
    name.strip_prefix(NAME_PREFIX).is_some_and(|suffix| {
        suffix.len() == 32 && suffix.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
    })
}

async fn start_container() -> ContainerAsync<PostgresImage> {
    PostgresImage::default()
        .with_user(USER)
        .with_password(PASSWORD)
        .with_db_name("postgres")
        .with_tag("16-alpine")
        .start()
        .await
        .expect("postgres container should start")
}

async fn server_url(database: &str) -> String {
    let container = CONTAINER.get_or_init(start_container).await;
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("postgres port should be mapped");
    let host = std::env::var("TESTCONTAINERS_HOST_OVERRIDE").unwrap_or_else(|_| "localhost".into());

    format!("postgresql://{USER}:{PASSWORD}@{host}:{port}/{database}")
}

async fn drop_database(name: &str) -> Result<(), sqlx::Error> {
    if !is_generated_name(name) {
        return Ok(());
    }

    let mut admin = PgConnection::connect(&server_url("postgres").await).await?;

    sqlx::query(&format!("DROP DATABASE IF EXISTS \"{name}\" WITH (FORCE)"))
        .execute(&mut admin)
        .await?;

    admin.close().await
}

async fn spawn_dropper() -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(name) = rx.recv().await {
            if let Err(error) = drop_database(&name).await {
                eprintln!("could not drop test database {name}: {error}");
            }
        }
    });

    tx
}

/// A freshly migrated database, dropped when this value is.
#[derive(Debug)]
pub struct TestDb {
    pool: PgPool,
    name: String,
}

impl TestDb {
    pub async fn new() -> Self {
        DROPPER.get_or_init(spawn_dropper).await;

        let name = format!("{NAME_PREFIX}{}", Uuid::new_v4().simple());

        let mut admin = PgConnection::connect(&server_url("postgres").await)
            .await
            .expect("admin connection should open");

        sqlx::query(&format!("CREATE DATABASE \"{name}\""))
            .execute(&mut admin)
            .await
            .expect("test database should be created");

        admin.close().await.expect("admin connection should close");

        let pool = PgPool::connect(&server_url(&name).await)
            .await
            .expect("test pool should connect");

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .expect("migrations should apply to a fresh database");

        Self { pool, name }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        if let Some(dropper) = DROPPER.get() {
            _ = dropper.send(self.name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn only_generated_names_are_dropped() {
        assert!(is_generated_name("atelier_test_0123456789abcdef0123456789abcdef"));
        assert!(!is_generated_name("atelier_test_0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_generated_name("atelier_test_short"));
        assert!(!is_generated_name("postgres"));
        assert!(!is_generated_name("atelier_test_0123456789abcdef0123456789abcde\"; --"));
    }

    #[tokio::test]
    async fn migrations_create_the_checkout_schema() -> TestResult {
        let test_db = TestDb::new().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::TEXT FROM information_schema.tables \
             WHERE table_schema = 'public' ORDER BY table_name",
        )
        .fetch_all(test_db.pool())
        .await?;

        for expected in [
            "cart_lines",
            "carts",
            "coupons",
            "order_items",
            "orders",
            "outbox_entries",
            "processed_webhook_events",
            "reservations",
            "stock_log",
            "variants",
        ] {
            assert!(
                tables.iter().any(|table| table == expected),
                "missing table {expected}: {tables:?}"
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn databases_are_isolated() -> TestResult {
        let first = TestDb::new().await;
        let second = TestDb::new().await;

        assert_ne!(first.name(), second.name());

        sqlx::query("CREATE TABLE scratch (id INTEGER)")
            .execute(first.pool())
            .await?;

        let missing = sqlx::query("SELECT COUNT(*) FROM scratch")
            .fetch_one(second.pool())
            .await;

        assert!(missing.is_err(), "tables must not leak between test databases");

        Ok(())
    }
}
