//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! fio-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BRIDGE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! Migration files live in `crates/bridge/migrations/`.

use super::CommandError;

/// Run bridge database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration
/// fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running bridge migrations...");
    sqlx::migrate!("../bridge/migrations").run(&pool).await?;

    tracing::info!("Bridge migrations complete");
    Ok(())
}
