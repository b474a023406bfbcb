/// Failure to derive a [`ModelSchema`](crate::schema::ModelSchema) from declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// More than one field is flagged as primary key.
    DuplicatePrimaryKey { table: String, field: String },
    /// No field is flagged as primary key.
    MissingPrimaryKey { table: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePrimaryKey { table, field } => {
                write!(f, "duplicate primary key for field `{}` in `{}`", field, table)
            }
            Self::MissingPrimaryKey { table } => {
                write!(f, "primary key not found in `{}`", table)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Quill error type.
#[derive(Debug)]
pub enum OrmError {
    /// The model declaration is invalid.
    Schema(SchemaError),
    /// The pool could not be created.
    Connect(sqlx::Error),
    /// A read statement failed.
    Query(sqlx::Error),
    /// A mutating statement failed (after rollback when a transaction was open).
    Execution(sqlx::Error),
    /// A `limit` argument that is neither a count nor an `(offset, count)` pair.
    InvalidLimit(String),
    /// A key that is not a declared field of the model.
    UnknownField { model: &'static str, field: String },
    /// A value that cannot be stored in the target field type.
    Conversion {
        expected: &'static str,
        found: &'static str,
    },
}

impl std::fmt::Display for OrmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "schema error: {}", err),
            Self::Connect(err) => write!(f, "connection failed: {}", err),
            Self::Query(err) => write!(f, "query failed: {}", err),
            Self::Execution(err) => write!(f, "execution failed: {}", err),
            Self::InvalidLimit(value) => write!(f, "invalid limit value: {}", value),
            Self::UnknownField { model, field } => {
                write!(f, "'{}' object has no attribute '{}'", model, field)
            }
            Self::Conversion { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for OrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Connect(err) | Self::Query(err) | Self::Execution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for OrmError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

/// Result alias for Quill operations.
pub type OrmResult<T> = Result<T, OrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_messages_name_the_table() {
        let err = SchemaError::MissingPrimaryKey {
            table: "players".into(),
        };
        assert_eq!(err.to_string(), "primary key not found in `players`");

        let err: OrmError = SchemaError::DuplicatePrimaryKey {
            table: "players".into(),
            field: "code".into(),
        }
        .into();
        assert!(err.to_string().contains("duplicate primary key for field `code`"));
    }

    #[test]
    fn execution_error_exposes_source() {
        use std::error::Error;
        let err = OrmError::Execution(sqlx::Error::RowNotFound);
        assert!(err.source().is_some());
        assert!(OrmError::InvalidLimit("x".into()).source().is_none());
    }
}
