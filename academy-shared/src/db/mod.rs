/// Database access
///
/// # Modules
///
/// - `pool`: connection pool creation and health checks
/// - `migrations`: embedded schema migrations
/// - `errors`: SQLSTATE helpers for constraint violations and retryable failures
///
/// Models live in the crate-level `models` module; their queries take any
/// `PgExecutor`, so the same call works on the pool or inside a transaction.
///
/// # Example
///
/// ```no_run
/// use academy_shared::db::pool::{create_pool, DatabaseConfig};
/// use academy_shared::db::migrations::run_migrations;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod errors;
pub mod migrations;
pub mod pool;
