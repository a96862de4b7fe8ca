//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! terroir migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ENGINE_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! Migration files live in `crates/engine/migrations/`.

use super::{CommandError, connect};

/// Run engine database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running engine migrations...");
    sqlx::migrate!("../engine/migrations").run(&pool).await?;

    tracing::info!("Engine migrations complete!");
    Ok(())
}
