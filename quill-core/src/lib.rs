pub use sqlx;

pub mod prelude {
    pub use crate::{FindAll, FromValue, Gateway, Limit, Model, OrmError, OrmResult, Value};
}

pub mod config;
pub mod dialect;
pub mod error;
pub mod field;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod query;
pub mod registry;
pub mod row;
pub mod schema;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod value;

pub use config::PoolConfig;
pub use dialect::SqlDialect;
pub use error::{OrmError, OrmResult, SchemaError};
pub use field::{ColumnKind, FieldDefault, FieldDescriptor};
pub use gateway::Gateway;
pub use model::Model;
pub use query::{FindAll, Limit};
pub use registry::schema_of;
pub use row::Row;
pub use schema::ModelSchema;
pub use value::{FromValue, Value};
