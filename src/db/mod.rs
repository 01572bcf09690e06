//! Postgres pool setup for the board store.
//!
//! DESIGN
//! ======
//! One shared `PgPool` is built at startup and handed to [`crate::store::PgStore`]
//! via [`crate::state::AppState`]. The embedded migrations under
//! `src/db/migrations` bring the boards/columns/items schema up to date first;
//! a failed migration aborts startup rather than serving a mismatched schema.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Pool ceiling when `DB_MAX_CONNECTIONS` is unset or unparsable.
const DEFAULT_POOL_SIZE: u32 = 5;

/// Move commits hold a row lock briefly; anything slower than this is a
/// database problem, not contention.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn pool_size() -> u32 {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POOL_SIZE)
}

/// Connect to Postgres and apply any pending migrations.
///
/// # Errors
///
/// Returns an error when the database is unreachable or a migration fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let size = pool_size();
    let pool = PgPoolOptions::new()
        .max_connections(size)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    info!(max_connections = size, "database pool ready");

    Ok(pool)
}
