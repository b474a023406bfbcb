//! Quill Blog: a small JSON blog API.
//!
//! Configuration comes from `QUILL_*` environment variables (a `.env` file is read
//! first), logging from `RUST_LOG`.

mod config;
mod handlers;
mod models;
mod page;

use quill_orm::prelude::*;
use quill_orm::sqlx::Sqlite;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::BlogConfig;
use crate::models::{Blog, Comment, User};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BlogConfig::from_env()?;
    info!("connecting to {}", config.database.redacted_url());
    let db: Gateway<Sqlite> = Gateway::connect(&config.database).await?;

    User::register()?;
    Blog::register()?;
    Comment::register()?;

    if config.create_tables {
        User::create_table(&db).await?;
        Blog::create_table(&db).await?;
        Comment::create_table(&db).await?;
        info!("tables ready");
    }

    let app = handlers::router(db.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("server started at http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    db.close().await;
    info!("database pool closed");
    Ok(())
}
