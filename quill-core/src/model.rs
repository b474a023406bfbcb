use std::future::Future;

use crate::dialect::SqlDialect;
use crate::error::OrmResult;
use crate::field::FieldDescriptor;
use crate::gateway::Gateway;
use crate::query::FindAll;
use crate::registry::schema_of;
use crate::row::Row;
use crate::schema::ModelSchema;
use crate::value::Value;

/// The core trait for database models.
///
/// A model is a struct with one `Option<T>` field per mapped column; `None` means the
/// record does not carry that field. Implementors provide the declared fields and a
/// key/value view (`get`/`set` by column name); every database operation is built on top
/// of that. It is usually implemented automatically via `#[derive(Model)]`.
pub trait Model: Default + Send + Sync + 'static {
    /// Returns the name of the database table associated with this model.
    fn table_name() -> &'static str;
    /// The declared fields in declaration order, keyed by field name.
    fn declared_fields() -> Vec<(&'static str, FieldDescriptor)>;
    /// Current value of a column, [`Value::Null`] when absent or unknown.
    fn get(&self, field: &str) -> Value;
    /// Stores a value into a column, failing on unknown names or mismatched types.
    fn set(&mut self, field: &str, value: Value) -> OrmResult<()>;

    /// The derived schema, shared by every record of this type.
    fn schema() -> OrmResult<&'static ModelSchema> {
        Ok(schema_of::<Self>()?)
    }

    /// Derives the schema up front so a malformed model fails at startup rather than on
    /// its first query.
    fn register() -> OrmResult<&'static ModelSchema> {
        Self::schema()
    }

    /// Builds a record from a result row.
    fn from_row(row: Row) -> OrmResult<Self> {
        let mut record = Self::default();
        for (column, value) in row {
            record.set(&column, value)?;
        }
        Ok(record)
    }

    /// Current value of a column, falling back to the field's default.
    ///
    /// A resolved default is written back onto the record.
    fn value_or_default(&mut self, field: &str) -> OrmResult<Value> {
        let value = self.get(field);
        if !value.is_null() {
            return Ok(value);
        }
        let default = Self::schema()?
            .field(field)
            .and_then(FieldDescriptor::resolve_default);
        match default {
            Some(default) => {
                tracing::debug!("using default value for {}: {}", field, default.to_log_string());
                self.set(field, default.clone())?;
                Ok(default)
            }
            None => Ok(Value::Null),
        }
    }

    /// Creates the table from the declared DDL unless it already exists.
    fn create_table<DB: SqlDialect>(db: &Gateway<DB>) -> impl Future<Output = OrmResult<()>> + Send {
        async move {
            let schema = Self::schema()?;
            db.execute(&schema.create_table_sql(), vec![], true).await?;
            Ok(())
        }
    }

    /// Finds a record by primary key. `None` when there is no such row.
    fn find<DB: SqlDialect>(
        db: &Gateway<DB>,
        pk: impl Into<Value>,
    ) -> impl Future<Output = OrmResult<Option<Self>>> + Send {
        let pk = pk.into();
        async move {
            let schema = Self::schema()?;
            let rows = db
                .select(&schema.select_by_key_sql(), vec![pk], Some(1))
                .await?;
            rows.into_iter().next().map(Self::from_row).transpose()
        }
    }

    /// Finds records by where clause, in database order.
    fn find_all<DB: SqlDialect>(
        db: &Gateway<DB>,
        query: FindAll,
    ) -> impl Future<Output = OrmResult<Vec<Self>>> + Send {
        async move {
            let schema = Self::schema()?;
            let (sql, args) = query.to_sql::<DB>(schema.select_sql());
            let rows = db.select(&sql, args, None).await?;
            rows.into_iter().map(Self::from_row).collect()
        }
    }

    /// Computes `select <expr> as _num_` over the table, e.g. `count(id)`.
    /// `None` when the query returns no row.
    fn find_number<DB: SqlDialect>(
        db: &Gateway<DB>,
        select: &str,
        filter: Option<&str>,
        args: Vec<Value>,
    ) -> impl Future<Output = OrmResult<Option<Value>>> + Send {
        async move {
            let schema = Self::schema()?;
            let mut sql = format!("select {} as _num_ from {}", select, schema.quoted_table());
            if let Some(filter) = filter {
                sql.push_str(" where ");
                sql.push_str(filter);
            }
            let rows = db.select(&sql, args, Some(1)).await?;
            Ok(rows.into_iter().next().and_then(|mut row| row.take("_num_")))
        }
    }

    /// Inserts the record. Absent fields take their defaults, which are stored back onto
    /// the record. Returns the affected row count.
    fn save<DB: SqlDialect>(&mut self, db: &Gateway<DB>) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let schema = Self::schema()?;
            let mut args = Vec::with_capacity(schema.fields().len() + 1);
            for field in schema.fields() {
                args.push(self.value_or_default(field)?);
            }
            args.push(self.value_or_default(schema.primary_key())?);

            let rows = db.execute(schema.insert_sql(), args, db.autocommit()).await?;
            if rows != 1 {
                tracing::warn!("failed to insert record: affected rows: {}", rows);
            }
            Ok(rows)
        }
    }

    /// Writes every ordinary field back by primary key. Absent fields are written as
    /// `NULL`; no defaults are applied.
    fn update<DB: SqlDialect>(&self, db: &Gateway<DB>) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let schema = Self::schema()?;
            let mut args: Vec<Value> = schema.fields().iter().map(|f| self.get(f)).collect();
            args.push(self.get(schema.primary_key()));

            let rows = db.execute(schema.update_sql(), args, db.autocommit()).await?;
            if rows != 1 {
                tracing::warn!("failed to update by primary key: affected rows: {}", rows);
            }
            Ok(rows)
        }
    }

    /// Deletes the row with this record's primary key. The record itself is left as is.
    fn remove<DB: SqlDialect>(&self, db: &Gateway<DB>) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let schema = Self::schema()?;
            let args = vec![self.get(schema.primary_key())];

            let rows = db.execute(schema.delete_sql(), args, db.autocommit()).await?;
            if rows != 1 {
                tracing::warn!("failed to remove by primary key: affected rows: {}", rows);
            }
            Ok(rows)
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use crate::test_utils::memory_gateway;
    use crate::value::FromValue;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Player {
        id: Option<String>,
        name: Option<String>,
        score: Option<i64>,
    }

    impl Model for Player {
        fn table_name() -> &'static str {
            "players"
        }

        fn declared_fields() -> Vec<(&'static str, FieldDescriptor)> {
            vec![
                ("id", FieldDescriptor::string_ddl("varchar(50)").primary_key()),
                ("name", FieldDescriptor::string()),
                ("score", FieldDescriptor::integer().default_value(0)),
            ]
        }

        fn get(&self, field: &str) -> Value {
            match field {
                "id" => self.id.clone().into(),
                "name" => self.name.clone().into(),
                "score" => self.score.into(),
                _ => Value::Null,
            }
        }

        fn set(&mut self, field: &str, value: Value) -> OrmResult<()> {
            match field {
                "id" => self.id = FromValue::from_value(value)?,
                "name" => self.name = FromValue::from_value(value)?,
                "score" => self.score = FromValue::from_value(value)?,
                other => {
                    return Err(OrmError::UnknownField {
                        model: "Player",
                        field: other.to_string(),
                    });
                }
            }
            Ok(())
        }
    }

    fn player(id: &str, name: &str) -> Player {
        Player {
            id: Some(id.into()),
            name: Some(name.into()),
            score: None,
        }
    }

    async fn players_db() -> Gateway<sqlx::Sqlite> {
        let db = memory_gateway().await.unwrap();
        Player::create_table(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn save_materializes_defaults_and_find_reads_back() {
        let db = players_db().await;
        let mut ann = player("p1", "Ann");
        assert_eq!(ann.save(&db).await.unwrap(), 1);
        assert_eq!(ann.score, Some(0));

        let found = Player::find(&db, "p1").await.unwrap().unwrap();
        assert_eq!(found, ann);
        assert!(Player::find(&db, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_writes_current_values() {
        let db = players_db().await;
        let mut ann = player("p1", "Ann");
        ann.save(&db).await.unwrap();

        ann.score = Some(42);
        assert_eq!(ann.update(&db).await.unwrap(), 1);
        let found = Player::find(&db, "p1").await.unwrap().unwrap();
        assert_eq!(found.score, Some(42));

        // absent fields are sent as NULL
        let partial = Player {
            id: Some("p1".into()),
            ..Default::default()
        };
        partial.update(&db).await.unwrap();
        let found = Player::find(&db, "p1").await.unwrap().unwrap();
        assert_eq!(found.name, None);
        assert_eq!(found.score, None);
    }

    #[tokio::test]
    async fn second_remove_reports_zero_rows() {
        let db = players_db().await;
        let mut ann = player("p1", "Ann");
        ann.save(&db).await.unwrap();
        assert_eq!(ann.remove(&db).await.unwrap(), 1);
        assert_eq!(ann.remove(&db).await.unwrap(), 0);
        assert_eq!(ann.update(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_number_counts_rows() {
        let db = players_db().await;
        let count = |db: Gateway<sqlx::Sqlite>| async move {
            Player::find_number(&db, "count(*)", None, vec![])
                .await
                .unwrap()
        };
        assert_eq!(count(db.clone()).await, Some(Value::Int(0)));
        player("p1", "Ann").save(&db).await.unwrap();
        assert_eq!(count(db.clone()).await, Some(Value::Int(1)));

        let named = Player::find_number(&db, "count(id)", Some("`name`=?"), vec!["Bob".into()])
            .await
            .unwrap();
        assert_eq!(named, Some(Value::Int(0)));
    }

    #[tokio::test]
    async fn duplicate_insert_is_an_execution_error() {
        let db = players_db().await;
        player("p1", "Ann").save(&db).await.unwrap();
        let err = player("p1", "Again").save(&db).await.unwrap_err();
        assert!(matches!(err, OrmError::Execution(_)));
    }

    #[tokio::test]
    async fn unknown_columns_fail_materialization() {
        let db = players_db().await;
        db.execute("alter table `players` add column `extra` text", vec![], true)
            .await
            .unwrap();
        player("p1", "Ann").save(&db).await.unwrap();
        let rows = db.select("select * from `players`", vec![], None).await.unwrap();
        let err = Player::from_row(rows.into_iter().next().unwrap()).unwrap_err();
        assert!(matches!(err, OrmError::UnknownField { .. }));
    }
}
