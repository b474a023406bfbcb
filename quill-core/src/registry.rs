use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Mutex, OnceLock, PoisonError},
};

use crate::error::SchemaError;
use crate::model::Model;
use crate::schema::ModelSchema;

static SCHEMAS: OnceLock<Mutex<HashMap<TypeId, &'static ModelSchema>>> = OnceLock::new();

/// Returns the schema of `M`, deriving it on first use.
///
/// A successfully derived schema is leaked and shared by every record of the type for
/// the rest of the process. Failures are not cached; deriving again fails the same way.
pub fn schema_of<M: Model>() -> Result<&'static ModelSchema, SchemaError> {
    let key = TypeId::of::<M>();
    let cache = SCHEMAS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(schema) = guard.get(&key) {
        return Ok(*schema);
    }

    let schema = ModelSchema::derive(M::table_name(), M::declared_fields())?;
    tracing::info!(
        "found model: {} (table: {})",
        std::any::type_name::<M>(),
        schema.table_name()
    );
    let schema: &'static ModelSchema = Box::leak(Box::new(schema));
    guard.insert(key, schema);
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmResult;
    use crate::field::FieldDescriptor;
    use crate::value::Value;

    #[derive(Default)]
    struct Tag;

    impl Model for Tag {
        fn table_name() -> &'static str {
            "tags"
        }
        fn declared_fields() -> Vec<(&'static str, FieldDescriptor)> {
            vec![
                ("id", FieldDescriptor::integer().primary_key()),
                ("label", FieldDescriptor::string()),
            ]
        }
        fn get(&self, _field: &str) -> Value {
            Value::Null
        }
        fn set(&mut self, _field: &str, _value: Value) -> OrmResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Keyless;

    impl Model for Keyless {
        fn table_name() -> &'static str {
            "keyless"
        }
        fn declared_fields() -> Vec<(&'static str, FieldDescriptor)> {
            vec![("label", FieldDescriptor::string())]
        }
        fn get(&self, _field: &str) -> Value {
            Value::Null
        }
        fn set(&mut self, _field: &str, _value: Value) -> OrmResult<()> {
            Ok(())
        }
    }

    fn registered_count() -> usize {
        SCHEMAS
            .get()
            .map(|cache| cache.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    #[test]
    fn schema_is_derived_once_and_shared() {
        let first = schema_of::<Tag>().unwrap();
        let second = schema_of::<Tag>().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.table_name(), "tags");
        assert!(registered_count() >= 1);
    }

    #[test]
    fn failing_schema_is_reported_every_time() {
        assert!(schema_of::<Keyless>().is_err());
        assert!(matches!(
            schema_of::<Keyless>(),
            Err(SchemaError::MissingPrimaryKey { .. })
        ));
    }
}
