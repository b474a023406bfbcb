use std::time::Instant;

use sqlx::pool::PoolOptions;
use sqlx::{Database, Pool};

use crate::config::PoolConfig;
use crate::dialect::SqlDialect;
use crate::error::{OrmError, OrmResult};
use crate::metrics::{record_pool_stats, record_query_metrics};
use crate::row::Row;
use crate::value::Value;

/// The shared, pooled connection handle every record operation runs through.
///
/// A gateway is created once at startup with [`Gateway::connect`], passed to whoever needs
/// the database (cloning is cheap, clones share the pool), and torn down with
/// [`Gateway::close`]. Every call checks a connection out of the pool for the duration of
/// one statement; the checkout is returned on every exit path, including errors and a
/// dropped future.
pub struct Gateway<DB: Database> {
    pool: Pool<DB>,
    autocommit: bool,
}

impl<DB: Database> Clone for Gateway<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            autocommit: self.autocommit,
        }
    }
}

impl<DB: Database> std::fmt::Debug for Gateway<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("db", &DB::NAME)
            .field("size", &self.pool.size())
            .field("autocommit", &self.autocommit)
            .finish()
    }
}

fn log_statement(sql: &str, args: &[Value]) {
    if args.is_empty() {
        tracing::info!("SQL: {}", sql);
    } else {
        let shown: Vec<String> = args.iter().map(Value::to_log_string).collect();
        tracing::info!("SQL: {} [{}]", sql, shown.join(", "));
    }
}

impl<DB: SqlDialect> Gateway<DB> {
    /// Creates the connection pool.
    pub async fn connect(config: &PoolConfig) -> OrmResult<Self> {
        tracing::info!(
            "create database connection pool: {} (min {}, max {})",
            config.redacted_url(),
            config.min_connections,
            config.max_connections
        );
        let pool = PoolOptions::<DB>::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(OrmError::Connect)?;
        record_pool_stats(&pool);
        Ok(Self {
            pool,
            autocommit: config.autocommit,
        })
    }

    /// Wraps an existing pool; mutating statements autocommit.
    pub fn from_pool(pool: Pool<DB>) -> Self {
        Self {
            pool,
            autocommit: true,
        }
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    /// Default `autocommit` flag passed to [`Gateway::execute`] by record operations.
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// Closes every connection and waits for checked-out ones to come back.
    pub async fn close(&self) {
        tracing::info!("close database connection pool");
        self.pool.close().await;
    }

    /// Runs a query with positional `?` arguments and returns the rows, at most `limit`
    /// of them when given.
    pub async fn select(
        &self,
        sql: &str,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> OrmResult<Vec<Row>> {
        let sql = DB::native_sql(sql);
        log_statement(&sql, &args);
        let start = Instant::now();

        let mut conn = self.pool.acquire().await.map_err(OrmError::Query)?;
        let rows = DB::fetch_rows(&mut *conn, &sql, args, limit)
            .await
            .map_err(OrmError::Query)?;

        record_query_metrics("select", DB::NAME, start.elapsed());
        tracing::debug!("rows returned: {}", rows.len());
        Ok(rows)
    }

    /// Runs a mutating statement and returns the number of affected rows.
    ///
    /// With `autocommit` off the statement runs inside a transaction that commits on
    /// success and is rolled back before the error is returned.
    pub async fn execute(&self, sql: &str, args: Vec<Value>, autocommit: bool) -> OrmResult<u64> {
        let sql = DB::native_sql(sql);
        log_statement(&sql, &args);
        let start = Instant::now();

        let mut conn = self.pool.acquire().await.map_err(OrmError::Execution)?;
        let affected = if autocommit {
            DB::execute_statement(&mut *conn, &sql, args)
                .await
                .map_err(OrmError::Execution)?
        } else {
            let mut tx = sqlx::Connection::begin(&mut *conn)
                .await
                .map_err(OrmError::Execution)?;
            match DB::execute_statement(&mut *tx, &sql, args).await {
                Ok(affected) => {
                    tx.commit().await.map_err(OrmError::Execution)?;
                    affected
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!("rollback failed: {}", rollback);
                    }
                    return Err(OrmError::Execution(err));
                }
            }
        };

        record_query_metrics("execute", DB::NAME, start.elapsed());
        tracing::debug!("rows affected: {}", affected);
        Ok(affected)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::test_utils::memory_gateway;

    async fn gateway_with_table() -> Gateway<sqlx::Sqlite> {
        let db = memory_gateway().await.unwrap();
        db.execute(
            "create table `notes` (`id` bigint not null, `body` text, primary key (`id`))",
            vec![],
            true,
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn select_returns_named_columns() {
        let db = gateway_with_table().await;
        for id in 1..=3 {
            db.execute(
                "insert into `notes` (`body`, `id`) values (?, ?)",
                vec![Value::from(format!("n{}", id)), Value::Int(id)],
                true,
            )
            .await
            .unwrap();
        }

        let rows = db
            .select("select `id`, `body` from `notes` order by `id`", vec![], None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get("body"), Some(&Value::Text("n3".into())));

        let limited = db
            .select("select `id` from `notes`", vec![], Some(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn failed_statements_map_to_query_and_execution_errors() {
        let db = gateway_with_table().await;
        let err = db
            .select("select * from `missing`", vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Query(_)));

        let err = db
            .execute("insert into `missing` values (?)", vec![Value::Int(1)], false)
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Execution(_)));
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_failure() {
        let db = gateway_with_table().await;
        db.execute(
            "insert into `notes` (`body`, `id`) values (?, ?)",
            vec![Value::from("first"), Value::Int(1)],
            false,
        )
        .await
        .unwrap();

        // duplicate key
        let err = db
            .execute(
                "insert into `notes` (`body`, `id`) values (?, ?)",
                vec![Value::from("again"), Value::Int(1)],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Execution(_)));

        let rows = db
            .select("select `body` from `notes`", vec![], None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("body"), Some(&Value::Text("first".into())));
    }

    #[tokio::test]
    async fn connection_is_released_after_errors() {
        let db = gateway_with_table().await;
        for _ in 0..3 {
            assert!(db.select("select nope", vec![], None).await.is_err());
        }
        // single-connection pool: would time out if the checkout leaked
        let rows = db.select("select 1 as one", vec![], None).await.unwrap();
        assert_eq!(rows[0].get("one"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn connection_is_released_when_a_query_is_abandoned() {
        let db = memory_gateway().await.unwrap();
        let slow = db.select(
            "with recursive c(x) as (select 1 union all select x + 1 from c where x < 2000000) \
             select count(*) as n from c",
            vec![],
            None,
        );
        let abandoned = tokio::time::timeout(std::time::Duration::from_millis(1), slow).await;
        assert!(abandoned.is_err());

        let rows = db.select("select 1 as one", vec![], None).await.unwrap();
        assert_eq!(rows[0].get("one"), Some(&Value::Int(1)));
    }
}
