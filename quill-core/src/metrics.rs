use std::time::Duration;

#[cfg(feature = "metrics")]
pub(crate) fn record_query_metrics(operation: &'static str, db: &'static str, elapsed: Duration) {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let labels = [("operation", operation), ("db", db)];
    metrics::histogram!("quill.query.duration_ms", &labels).record(elapsed_ms);
    metrics::counter!("quill.query.count", &labels).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_query_metrics(_operation: &'static str, _db: &'static str, _elapsed: Duration) {}

/// Record SQLx pool stats as gauges.
#[cfg(feature = "metrics")]
pub fn record_pool_stats<DB: sqlx::Database>(pool: &sqlx::Pool<DB>) {
    metrics::gauge!("quill.pool.size", "db" => DB::NAME).set(pool.size() as f64);
    metrics::gauge!("quill.pool.idle", "db" => DB::NAME).set(pool.num_idle() as f64);
    metrics::gauge!("quill.pool.max_size", "db" => DB::NAME)
        .set(pool.options().get_max_connections() as f64);
}

#[cfg(not(feature = "metrics"))]
pub fn record_pool_stats<DB: sqlx::Database>(_pool: &sqlx::Pool<DB>) {}
