//! # Quill ORM 🪶
//!
//! > **"Declare fields, get SQL."**
//!
//! Quill is a small **active-record ORM** for Rust: a struct declares its columns once,
//! and every record gets `find`, `find_all`, `find_number`, `save`, `update` and `remove`
//! over a shared connection pool.
//!
//! ## 🌟 Key Features
//!
//! - **📐 Declarative Fields**: column kind, DDL, primary key and defaults live on the struct.
//! - **🧮 Derived Once**: SQL templates are built the first time a model is used and shared by every record.
//! - **🌍 Multi-Database**: SQLite by default, MySQL and Postgres behind features.
//! - **🔌 Axum Integration**: the `Args` extractor binds JSON, form, query and path data to a handler's arguments.
//!
//! ## 🚀 Quick Start
//!
//! ```rust,no_run
//! use quill_orm::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! #[quill(table = "players")]
//! struct Player {
//!     #[field(string(50), primary_key)]
//!     id: Option<String>,
//!     name: Option<String>,
//!     #[field(integer, default = 0)]
//!     score: Option<i64>,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Gateway::<quill_orm::sqlx::Sqlite>::connect(&PoolConfig::new("sqlite::memory:")).await?;
//! Player::create_table(&db).await?;
//!
//! let mut player = Player { id: Some("p1".into()), name: Some("Ann".into()), ..Default::default() };
//! player.save(&db).await?;
//! assert_eq!(player.score, Some(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## 📦 Installation
//!
//! ```toml
//! [dependencies]
//! quill-orm = "0.3"
//! quill-core = "0.3"
//! ```

pub use quill_core::*;
pub use quill_macros::Model;

pub mod integrations;

pub mod prelude {
    pub use quill_core::prelude::*;
    pub use quill_core::PoolConfig;

    pub use crate::Model; // The macro // The traits and other core items
}
