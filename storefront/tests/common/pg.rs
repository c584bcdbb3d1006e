// storefront/tests/common/pg.rs

//! Postgres-backed harness: one shared container, one fresh database per test.

use super::*;
use once_cell::sync::Lazy;
use sqlx::{Connection, PgConnection, PgPool};
use storefront::store::PgStore;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::OnceCell;

const PG_USER: &str = "storefront_test";
const PG_PASSWORD: &str = "storefront_test_password";

/// Set to `1` to fail instead of skipping when no container runtime is reachable.
const REQUIRE_PG_ENV: &str = "STOREFRONT_REQUIRE_PG";

/// The container and its mapped host port, resolved once.
static POSTGRES_CONTAINER: Lazy<OnceCell<Option<(ContainerAsync<PostgresImage>, u16)>>> = Lazy::new(OnceCell::new);

async fn init_postgres_container() -> Option<(ContainerAsync<PostgresImage>, u16)> {
  let started = PostgresImage::default()
    .with_user(PG_USER)
    .with_password(PG_PASSWORD)
    .with_db_name("storefront_test")
    .with_tag("16-alpine")
    .start()
    .await;
  match started {
    Ok(container) => {
      let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get container port");
      Some((container, port))
    }
    Err(e) if std::env::var(REQUIRE_PG_ENV).as_deref() == Ok("1") => {
      panic!("Failed to start PostgreSQL container: {}", e)
    }
    Err(e) => {
      eprintln!("Skipping Postgres-backed test, no container runtime: {}", e);
      None
    }
  }
}

/// An isolated database with the storefront migrations applied.
pub struct TestDb {
  pub pool: PgPool,
  pub name: String,
}

impl TestDb {
  /// `None` when no Postgres container could be started.
  pub async fn new() -> Option<Self> {
    let (_, port) = POSTGRES_CONTAINER.get_or_init(init_postgres_container).await.as_ref()?;
    let host = std::env::var("TESTCONTAINERS_HOST_OVERRIDE").unwrap_or_else(|_| "localhost".to_string());

    let name = format!("storefront_{}", uuid::Uuid::new_v4().simple());
    let admin_url = format!("postgresql://{}:{}@{}:{}/postgres", PG_USER, PG_PASSWORD, host, port);
    let mut conn = PgConnection::connect(&admin_url)
      .await
      .expect("Failed to connect to postgres database");
    sqlx::query(&format!("CREATE DATABASE \"{}\"", name))
      .execute(&mut conn)
      .await
      .expect("Failed to create test database");
    conn.close().await.expect("Failed to close admin connection");

    let database_url = format!("postgresql://{}:{}@{}:{}/{}", PG_USER, PG_PASSWORD, host, port, name);
    let pool = PgPool::connect(&database_url)
      .await
      .expect("Failed to create pool for database");
    sqlx::migrate!("./migrations")
      .run(&pool)
      .await
      .expect("Failed to run migrations on database");

    Some(Self { pool, name })
  }

  pub async fn seed_user(&self, name: &str, email: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING user_id")
      .bind(name)
      .bind(email)
      .fetch_one(&self.pool)
      .await
      .unwrap()
  }

  pub async fn seed_address(&self, user_id: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO addresses (user_id, street) VALUES ($1, 'Av. Siempre Viva 742') RETURNING address_id")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await
      .unwrap()
  }

  pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> i64 {
    sqlx::query_scalar("INSERT INTO products (name, price, stock) VALUES ($1, $2, $3) RETURNING product_id")
      .bind(name)
      .bind(price)
      .bind(stock)
      .fetch_one(&self.pool)
      .await
      .unwrap()
  }

  /// Creates a cart with `(product_id, quantity, unit_price)` lines.
  pub async fn seed_cart(&self, user_id: i64, status: CartStatus, items: &[(i64, i32, Decimal)]) -> i64 {
    let cart_id: i64 = sqlx::query_scalar("INSERT INTO carts (user_id, status) VALUES ($1, $2) RETURNING cart_id")
      .bind(user_id)
      .bind(status)
      .fetch_one(&self.pool)
      .await
      .unwrap();
    for (product_id, quantity, unit_price) in items {
      sqlx::query("INSERT INTO cart_items (cart_id, product_id, quantity, unit_price) VALUES ($1, $2, $3, $4)")
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(&self.pool)
        .await
        .unwrap();
    }
    cart_id
  }

  pub async fn seed_scenario(&self) -> Scenario {
    let user_id = self.seed_user("Ana", "ana@example.com").await;
    let address_id = self.seed_address(user_id).await;
    let product_id = self.seed_product("Mate", dec("10.00"), 5).await;
    let cart_id = self
      .seed_cart(user_id, CartStatus::Active, &[(product_id, 2, dec("10.00"))])
      .await;
    Scenario {
      user_id,
      address_id,
      product_id,
      cart_id,
    }
  }

  pub async fn product_stock(&self, product_id: i64) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE product_id = $1")
      .bind(product_id)
      .fetch_one(&self.pool)
      .await
      .unwrap()
  }

  pub async fn cart_status(&self, cart_id: i64) -> CartStatus {
    sqlx::query_scalar("SELECT status FROM carts WHERE cart_id = $1")
      .bind(cart_id)
      .fetch_one(&self.pool)
      .await
      .unwrap()
  }

  pub async fn count(&self, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
  }

  pub async fn cart_item_count(&self, cart_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
      .bind(cart_id)
      .fetch_one(&self.pool)
      .await
      .unwrap()
  }
}

pub struct PgHarness {
  pub db: TestDb,
  pub provider: Arc<FakeProvider>,
  pub mailer: Arc<RecordingMailer>,
  pub state: AppState,
}

/// `None` when Postgres is unavailable; callers return early.
pub async fn pg_harness() -> Option<PgHarness> {
  setup_tracing();
  let db = TestDb::new().await?;
  let provider = Arc::new(FakeProvider::default());
  let mailer = Arc::new(RecordingMailer::default());
  let state = AppState::new(
    Arc::new(PgStore::new(db.pool.clone())),
    provider.clone(),
    mailer.clone(),
    test_config(),
  );
  Some(PgHarness {
    db,
    provider,
    mailer,
    state,
  })
}
