use std::borrow::Cow;

use futures_util::future::BoxFuture;
use futures_util::{StreamExt, TryStreamExt};
use sqlx::query::Query;
use sqlx::{Column, Database, IntoArguments};

use crate::row::Row;
use crate::value::Value;

/// A trait that encapsulates all the requirements for a database to work with Quill.
///
/// Statement execution lives here, implemented per backend, so the gateway and the
/// record operations stay generic over `DB: SqlDialect` alone.
pub trait SqlDialect: Database + Sized + Send + Sync {
    /// Translates a `?`/backtick statement into the backend's native syntax.
    fn native_sql(sql: &str) -> Cow<'_, str> {
        Cow::Borrowed(sql)
    }
    /// Clause for an `(offset, count)` limit, and whether `count` binds before `offset`.
    fn range_limit_clause() -> (&'static str, bool) {
        ("limit ?, ?", false)
    }
    /// Returns the number of rows affected by a query result.
    fn rows_affected(res: &Self::QueryResult) -> u64;
    /// Binds one positional argument.
    fn bind_value<'q>(
        query: Query<'q, Self, <Self as Database>::Arguments<'q>>,
        value: Value,
    ) -> Query<'q, Self, <Self as Database>::Arguments<'q>>;
    /// Decodes one result column into a [`Value`].
    fn decode_column(row: &Self::Row, index: usize) -> Result<Value, sqlx::Error>;
    /// Runs a query on one connection and decodes at most `limit` rows.
    fn fetch_rows<'c>(
        conn: &'c mut Self::Connection,
        sql: &'c str,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> BoxFuture<'c, Result<Vec<Row>, sqlx::Error>>;
    /// Runs a mutating statement on one connection and returns the affected row count.
    fn execute_statement<'c>(
        conn: &'c mut Self::Connection,
        sql: &'c str,
        args: Vec<Value>,
    ) -> BoxFuture<'c, Result<u64, sqlx::Error>>;
}

fn bind_all<DB: SqlDialect>(
    sql: &str,
    args: Vec<Value>,
) -> Query<'_, DB, <DB as Database>::Arguments<'_>> {
    args.into_iter()
        .fold(sqlx::query::<DB>(sql), DB::bind_value)
}

fn decode_row<DB: SqlDialect>(row: &DB::Row) -> Result<Row, sqlx::Error> {
    use sqlx::Row as _;
    let mut decoded = Row::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        decoded.push(column.name(), DB::decode_column(row, index)?);
    }
    Ok(decoded)
}

#[allow(dead_code)]
async fn fetch_rows_on<DB>(
    conn: &mut DB::Connection,
    sql: &str,
    args: Vec<Value>,
    limit: Option<usize>,
) -> Result<Vec<Row>, sqlx::Error>
where
    DB: SqlDialect,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    let query = bind_all::<DB>(sql, args);
    let rows: Vec<DB::Row> = match limit {
        Some(size) => query.fetch(&mut *conn).take(size).try_collect().await?,
        None => query.fetch_all(&mut *conn).await?,
    };
    rows.iter().map(decode_row::<DB>).collect()
}

#[allow(dead_code)]
async fn execute_on<DB>(
    conn: &mut DB::Connection,
    sql: &str,
    args: Vec<Value>,
) -> Result<u64, sqlx::Error>
where
    DB: SqlDialect,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    let result = bind_all::<DB>(sql, args).execute(&mut *conn).await?;
    Ok(DB::rows_affected(&result))
}

/// Rewrites `?` placeholders to `$1, $2, ...` and backtick identifiers to double quotes,
/// leaving single-quoted literals untouched.
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut in_literal = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            '`' if !in_literal => out.push('"'),
            _ => out.push(ch),
        }
    }
    out
}

#[allow(dead_code)]
fn decode_error(type_name: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unsupported column type {}", type_name).into())
}

#[cfg(feature = "sqlite")]
impl SqlDialect for sqlx::Sqlite {
    fn rows_affected(res: &sqlx::sqlite::SqliteQueryResult) -> u64 {
        res.rows_affected()
    }

    fn bind_value<'q>(
        query: Query<'q, Self, sqlx::sqlite::SqliteArguments<'q>>,
        value: Value,
    ) -> Query<'q, Self, sqlx::sqlite::SqliteArguments<'q>> {
        match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        }
    }

    fn decode_column(row: &sqlx::sqlite::SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
        use sqlx::{Row as _, TypeInfo, ValueRef};

        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        // Storage class of the value itself, not the declared column type.
        let type_name = raw.type_info().name().to_ascii_uppercase();
        match type_name.as_str() {
            "INTEGER" | "BOOLEAN" => Ok(Value::Int(row.try_get_unchecked::<i64, _>(index)?)),
            "REAL" => Ok(Value::Float(row.try_get_unchecked::<f64, _>(index)?)),
            "BLOB" => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
            }
            _ => Ok(Value::Text(row.try_get_unchecked::<String, _>(index)?)),
        }
    }

    fn fetch_rows<'c>(
        conn: &'c mut sqlx::SqliteConnection,
        sql: &'c str,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> BoxFuture<'c, Result<Vec<Row>, sqlx::Error>> {
        Box::pin(fetch_rows_on::<Self>(conn, sql, args, limit))
    }

    fn execute_statement<'c>(
        conn: &'c mut sqlx::SqliteConnection,
        sql: &'c str,
        args: Vec<Value>,
    ) -> BoxFuture<'c, Result<u64, sqlx::Error>> {
        Box::pin(execute_on::<Self>(conn, sql, args))
    }
}

#[cfg(feature = "mysql")]
impl SqlDialect for sqlx::MySql {
    fn rows_affected(res: &sqlx::mysql::MySqlQueryResult) -> u64 {
        res.rows_affected()
    }

    fn bind_value<'q>(
        query: Query<'q, Self, sqlx::mysql::MySqlArguments>,
        value: Value,
    ) -> Query<'q, Self, sqlx::mysql::MySqlArguments> {
        match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        }
    }

    fn decode_column(row: &sqlx::mysql::MySqlRow, index: usize) -> Result<Value, sqlx::Error> {
        use sqlx::{Row as _, TypeInfo, ValueRef};

        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_name = raw.type_info().name().to_ascii_uppercase();
        match type_name.as_str() {
            "BOOLEAN" => Ok(Value::Bool(row.try_get_unchecked::<bool, _>(index)?)),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                Ok(Value::Int(row.try_get_unchecked::<i64, _>(index)?))
            }
            name if name.ends_with("UNSIGNED") => {
                Ok(Value::Int(row.try_get_unchecked::<u64, _>(index)? as i64))
            }
            "FLOAT" => Ok(Value::Float(row.try_get_unchecked::<f32, _>(index)? as f64)),
            "DOUBLE" => Ok(Value::Float(row.try_get_unchecked::<f64, _>(index)?)),
            "DATETIME" | "TIMESTAMP" => Ok(Value::Text(
                row.try_get_unchecked::<chrono::NaiveDateTime, _>(index)?
                    .to_string(),
            )),
            "DATE" => Ok(Value::Text(
                row.try_get_unchecked::<chrono::NaiveDate, _>(index)?
                    .to_string(),
            )),
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
            }
            _ => Ok(Value::Text(row.try_get_unchecked::<String, _>(index)?)),
        }
    }

    fn fetch_rows<'c>(
        conn: &'c mut sqlx::MySqlConnection,
        sql: &'c str,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> BoxFuture<'c, Result<Vec<Row>, sqlx::Error>> {
        Box::pin(fetch_rows_on::<Self>(conn, sql, args, limit))
    }

    fn execute_statement<'c>(
        conn: &'c mut sqlx::MySqlConnection,
        sql: &'c str,
        args: Vec<Value>,
    ) -> BoxFuture<'c, Result<u64, sqlx::Error>> {
        Box::pin(execute_on::<Self>(conn, sql, args))
    }
}

/// A `NULL` sent with an unspecified parameter type, so Postgres takes the type from the
/// target column instead of rejecting a `text` null for a `bigint` one.
#[cfg(feature = "postgres")]
struct UntypedNull;

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for UntypedNull {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_oid(sqlx::postgres::types::Oid(0))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for UntypedNull {
    fn encode_by_ref(
        &self,
        _buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        Ok(sqlx::encode::IsNull::Yes)
    }
}

/// Whole numbers (`sum` over integers) stay integers; anything else becomes a float.
#[cfg(feature = "postgres")]
fn decimal_value(decimal: rust_decimal::Decimal) -> Value {
    use rust_decimal::prelude::ToPrimitive;

    if decimal.fract().is_zero()
        && let Some(v) = decimal.to_i64()
    {
        return Value::Int(v);
    }
    match decimal.to_f64() {
        Some(v) => Value::Float(v),
        None => Value::Text(decimal.to_string()),
    }
}

#[cfg(feature = "postgres")]
impl SqlDialect for sqlx::Postgres {
    fn native_sql(sql: &str) -> Cow<'_, str> {
        Cow::Owned(numbered_placeholders(sql))
    }

    fn range_limit_clause() -> (&'static str, bool) {
        ("limit ? offset ?", true)
    }

    fn rows_affected(res: &sqlx::postgres::PgQueryResult) -> u64 {
        res.rows_affected()
    }

    fn bind_value<'q>(
        query: Query<'q, Self, sqlx::postgres::PgArguments>,
        value: Value,
    ) -> Query<'q, Self, sqlx::postgres::PgArguments> {
        match value {
            Value::Null => query.bind(UntypedNull),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        }
    }

    fn decode_column(row: &sqlx::postgres::PgRow, index: usize) -> Result<Value, sqlx::Error> {
        use sqlx::{Row as _, TypeInfo, ValueRef};

        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_name = raw.type_info().name().to_ascii_uppercase();
        match type_name.as_str() {
            "BOOL" => Ok(Value::Bool(row.try_get::<bool, _>(index)?)),
            "INT2" => Ok(Value::Int(row.try_get::<i16, _>(index)? as i64)),
            "INT4" => Ok(Value::Int(row.try_get::<i32, _>(index)? as i64)),
            "INT8" => Ok(Value::Int(row.try_get::<i64, _>(index)?)),
            "FLOAT4" => Ok(Value::Float(row.try_get::<f32, _>(index)? as f64)),
            "FLOAT8" => Ok(Value::Float(row.try_get::<f64, _>(index)?)),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                Ok(Value::Text(row.try_get::<String, _>(index)?))
            }
            "UUID" => Ok(Value::Text(row.try_get::<uuid::Uuid, _>(index)?.to_string())),
            "JSON" | "JSONB" => Ok(Value::Text(
                row.try_get::<serde_json::Value, _>(index)?.to_string(),
            )),
            "TIMESTAMP" => Ok(Value::Text(
                row.try_get::<chrono::NaiveDateTime, _>(index)?.to_string(),
            )),
            "NUMERIC" => Ok(decimal_value(
                row.try_get::<rust_decimal::Decimal, _>(index)?,
            )),
            "TIMESTAMPTZ" => Ok(Value::Text(
                row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?
                    .to_rfc3339(),
            )),
            other => Err(decode_error(other)),
        }
    }

    fn fetch_rows<'c>(
        conn: &'c mut sqlx::PgConnection,
        sql: &'c str,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> BoxFuture<'c, Result<Vec<Row>, sqlx::Error>> {
        Box::pin(fetch_rows_on::<Self>(conn, sql, args, limit))
    }

    fn execute_statement<'c>(
        conn: &'c mut sqlx::PgConnection,
        sql: &'c str,
        args: Vec<Value>,
    ) -> BoxFuture<'c, Result<u64, sqlx::Error>> {
        Box::pin(execute_on::<Self>(conn, sql, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_placeholders_count_in_order() {
        assert_eq!(
            numbered_placeholders("update `users` set `name`=?, `admin`=? where `id`=?"),
            r#"update "users" set "name"=$1, "admin"=$2 where "id"=$3"#
        );
    }

    #[test]
    fn numbered_placeholders_skip_literals() {
        assert_eq!(
            numbered_placeholders("select * from t where a = '?`' and b = ?"),
            "select * from t where a = '?`' and b = $1"
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn postgres_null_leaves_the_type_to_the_server() {
        use sqlx::postgres::types::Oid;

        let info = <UntypedNull as sqlx::Type<sqlx::Postgres>>::type_info();
        assert_eq!(info.oid(), Some(Oid(0)));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn numeric_aggregates_decode_to_numbers() {
        use rust_decimal::Decimal;

        assert_eq!(decimal_value(Decimal::new(60, 0)), Value::Int(60));
        assert_eq!(decimal_value(Decimal::new(2000, 2)), Value::Int(20));
        assert_eq!(decimal_value(Decimal::new(125, 1)), Value::Float(12.5));
        assert!(matches!(decimal_value(Decimal::MAX), Value::Float(v) if v > 7.9e28));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_keeps_question_marks() {
        let sql = "select `id` from `users` where `id`=?";
        assert_eq!(sqlx::Sqlite::native_sql(sql), sql);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_rows_decode_by_storage_class() {
        use sqlx::Connection;

        let mut conn = sqlx::SqliteConnection::connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER, flag BOOLEAN, score REAL, name TEXT, note TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t VALUES (1, 1, 2.5, 'a', NULL), (2, 0, 1.0, 'b', NULL)")
            .execute(&mut conn)
            .await
            .unwrap();

        let rows = sqlx::Sqlite::fetch_rows(&mut conn, "select * from t order by id", vec![], None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("flag"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("score"), Some(&Value::Float(2.5)));
        assert_eq!(rows[0].get("name"), Some(&Value::Text("a".into())));
        assert_eq!(rows[0].get("note"), Some(&Value::Null));

        let first = sqlx::Sqlite::fetch_rows(
            &mut conn,
            "select name from t where id > ?",
            vec![Value::Int(0)],
            Some(1),
        )
        .await
        .unwrap();
        assert_eq!(first.len(), 1);

        let affected = sqlx::Sqlite::execute_statement(
            &mut conn,
            "update t set name = ? where id = ?",
            vec![Value::from("z"), Value::Int(2)],
        )
        .await
        .unwrap();
        assert_eq!(affected, 1);
    }
}
