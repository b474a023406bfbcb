use std::borrow::Cow;

use crate::value::Value;

/// The column kinds a field can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    Integer,
    Boolean,
    Float,
    Text,
}

impl ColumnKind {
    /// DDL used when the declaration does not override it.
    pub fn default_ddl(self) -> &'static str {
        match self {
            ColumnKind::String => "varchar(100)",
            ColumnKind::Integer => "bigint",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Float => "real",
            ColumnKind::Text => "text",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ColumnKind::String => "StringField",
            ColumnKind::Integer => "IntegerField",
            ColumnKind::Boolean => "BooleanField",
            ColumnKind::Float => "FloatField",
            ColumnKind::Text => "TextField",
        }
    }

    fn can_be_primary_key(self) -> bool {
        !matches!(self, ColumnKind::Boolean | ColumnKind::Text)
    }
}

/// Default applied by `save` when a record leaves a field unset.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    Value(Value),
    Producer(fn() -> Value),
}

impl FieldDefault {
    /// Returns the default, invoking the producer when there is one.
    pub fn resolve(&self) -> Value {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Producer(produce) => produce(),
        }
    }
}

impl PartialEq for FieldDefault {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Producer(a), Self::Producer(b)) => std::ptr::fn_addr_eq(*a, *b),
            _ => false,
        }
    }
}

/// Declarative metadata for one mapped column.
///
/// ```
/// use quill_core::FieldDescriptor;
///
/// let id = FieldDescriptor::string_ddl("varchar(50)").primary_key();
/// assert!(id.is_primary_key());
/// assert_eq!(id.ddl(), "varchar(50)");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: Option<Cow<'static, str>>,
    kind: ColumnKind,
    ddl: Cow<'static, str>,
    primary_key: bool,
    default: Option<FieldDefault>,
}

impl FieldDescriptor {
    fn of(kind: ColumnKind) -> Self {
        Self {
            name: None,
            kind,
            ddl: Cow::Borrowed(kind.default_ddl()),
            primary_key: false,
            default: None,
        }
    }

    /// A `varchar(100)` column.
    pub fn string() -> Self {
        Self::of(ColumnKind::String)
    }

    /// A string column with custom DDL, e.g. `varchar(50)`.
    pub fn string_ddl(ddl: impl Into<Cow<'static, str>>) -> Self {
        Self {
            ddl: ddl.into(),
            ..Self::of(ColumnKind::String)
        }
    }

    pub fn integer() -> Self {
        Self::of(ColumnKind::Integer)
    }

    /// A boolean column, defaulting to `false`.
    pub fn boolean() -> Self {
        Self::of(ColumnKind::Boolean).default_value(false)
    }

    /// A `real` column, defaulting to `0.0`.
    pub fn float() -> Self {
        Self::of(ColumnKind::Float).default_value(0.0)
    }

    pub fn text() -> Self {
        Self::of(ColumnKind::Text)
    }

    /// Flags the field as primary key. Boolean and text columns never are.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = self.kind.can_be_primary_key();
        self
    }

    /// Overrides the column name, which otherwise is the declaring field's name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the column DDL.
    pub fn with_ddl(mut self, ddl: impl Into<Cow<'static, str>>) -> Self {
        self.ddl = ddl.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Computes the default on every `save`, e.g. a fresh id or timestamp.
    pub fn default_with(mut self, produce: fn() -> Value) -> Self {
        self.default = Some(FieldDefault::Producer(produce));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn ddl(&self) -> &str {
        &self.ddl
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    /// Resolves the default, `None` when the field has none.
    pub fn resolve_default(&self) -> Option<Value> {
        self.default.as_ref().map(FieldDefault::resolve)
    }
}

impl std::fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{}, {}:{}>",
            self.kind.label(),
            self.ddl,
            self.name.as_deref().unwrap_or("None")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer() -> Value {
        Value::Int(42)
    }

    #[test]
    fn default_ddl_per_kind() {
        assert_eq!(FieldDescriptor::string().ddl(), "varchar(100)");
        assert_eq!(FieldDescriptor::integer().ddl(), "bigint");
        assert_eq!(FieldDescriptor::boolean().ddl(), "boolean");
        assert_eq!(FieldDescriptor::float().ddl(), "real");
        assert_eq!(FieldDescriptor::text().ddl(), "text");
    }

    #[test]
    fn boolean_and_float_carry_defaults() {
        assert_eq!(
            FieldDescriptor::boolean().resolve_default(),
            Some(Value::Bool(false))
        );
        assert_eq!(
            FieldDescriptor::float().resolve_default(),
            Some(Value::Float(0.0))
        );
        assert_eq!(FieldDescriptor::string().resolve_default(), None);
    }

    #[test]
    fn text_and_boolean_ignore_primary_key() {
        assert!(!FieldDescriptor::text().primary_key().is_primary_key());
        assert!(!FieldDescriptor::boolean().primary_key().is_primary_key());
        assert!(FieldDescriptor::integer().primary_key().is_primary_key());
    }

    #[test]
    fn producer_runs_on_resolve() {
        let field = FieldDescriptor::integer().default_with(answer);
        assert_eq!(field.resolve_default(), Some(Value::Int(42)));
        assert_eq!(field, FieldDescriptor::integer().default_with(answer));
    }

    #[test]
    fn display_shows_kind_ddl_and_name() {
        let field = FieldDescriptor::string_ddl("varchar(50)").named("email");
        assert_eq!(field.to_string(), "<StringField, varchar(50):email>");
        assert_eq!(FieldDescriptor::text().to_string(), "<TextField, text:None>");
    }
}
