use crate::error::{OrmError, OrmResult};
use crate::gateway::Gateway;

/// A gateway over a private in-memory SQLite database.
///
/// The pool holds exactly one connection: every `sqlite::memory:` connection is its own
/// database, so a second one would not see the tables of the first.
#[cfg(feature = "sqlite")]
pub async fn memory_gateway() -> OrmResult<Gateway<sqlx::Sqlite>> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect("sqlite::memory:")
        .await
        .map_err(OrmError::Connect)?;
    Ok(Gateway::from_pool(pool))
}

