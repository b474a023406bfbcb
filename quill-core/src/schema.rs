use crate::error::SchemaError;
use crate::field::FieldDescriptor;

/// Table layout and SQL templates derived once per model type.
///
/// Identifiers are backtick-quoted and arguments use `?` placeholders; both are
/// translated to the backend's native syntax right before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    table: String,
    primary_key: String,
    fields: Vec<String>,
    mappings: Vec<(String, FieldDescriptor)>,
    select: String,
    insert: String,
    update: String,
    delete: String,
}

fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// `?, ?, ?` for `count` arguments.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl ModelSchema {
    /// Partitions the declared fields into primary key and ordinary fields and
    /// builds the select/insert/update/delete templates.
    ///
    /// `declared` is in declaration order. The key of each pair is the declaring
    /// field's name; a descriptor's own name, when set, overrides it as column name.
    pub fn derive<I>(table: &str, declared: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (&'static str, FieldDescriptor)>,
    {
        let mut primary_key: Option<String> = None;
        let mut fields = Vec::new();
        let mut mappings = Vec::new();

        for (attr, descriptor) in declared {
            let name = descriptor.name().unwrap_or(attr).to_string();
            tracing::debug!(table, "found mapping: {} ==> {}", name, descriptor);
            if descriptor.is_primary_key() {
                if primary_key.is_some() {
                    return Err(SchemaError::DuplicatePrimaryKey {
                        table: table.to_string(),
                        field: name,
                    });
                }
                primary_key = Some(name.clone());
            } else {
                fields.push(name.clone());
            }
            mappings.push((name, descriptor));
        }

        let primary_key = primary_key.ok_or_else(|| SchemaError::MissingPrimaryKey {
            table: table.to_string(),
        })?;

        let quoted_table = quote(table);
        let quoted_pk = quote(&primary_key);
        let quoted_fields: Vec<String> = fields.iter().map(|f| quote(f)).collect();

        let mut selected = vec![quoted_pk.clone()];
        selected.extend(quoted_fields.iter().cloned());
        let select = format!("select {} from {}", selected.join(", "), quoted_table);

        let mut inserted = quoted_fields.clone();
        inserted.push(quoted_pk.clone());
        let insert = format!(
            "insert into {} ({}) values ({})",
            quoted_table,
            inserted.join(", "),
            placeholders(inserted.len())
        );

        let assignments = if quoted_fields.is_empty() {
            format!("{}={}", quoted_pk, quoted_pk)
        } else {
            quoted_fields
                .iter()
                .map(|f| format!("{}=?", f))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let update = format!(
            "update {} set {} where {}=?",
            quoted_table, assignments, quoted_pk
        );

        let delete = format!("delete from {} where {}=?", quoted_table, quoted_pk);

        Ok(Self {
            table: table.to_string(),
            primary_key,
            fields,
            mappings,
            select,
            insert,
            update,
            delete,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Ordinary (non-key) fields in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Looks up the descriptor of a field by column name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.mappings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn mappings(&self) -> &[(String, FieldDescriptor)] {
        &self.mappings
    }

    pub fn select_sql(&self) -> &str {
        &self.select
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert
    }

    pub fn update_sql(&self) -> &str {
        &self.update
    }

    pub fn delete_sql(&self) -> &str {
        &self.delete
    }

    /// `select ... from t where pk=?`, used by `find`.
    pub fn select_by_key_sql(&self) -> String {
        format!("{} where {}=?", self.select, quote(&self.primary_key))
    }

    /// Quoted table name for hand-built statements.
    pub fn quoted_table(&self) -> String {
        quote(&self.table)
    }

    /// Generates a `CREATE TABLE` statement from the declared DDL.
    pub fn create_table_sql(&self) -> String {
        let mut cols = Vec::with_capacity(self.mappings.len() + 1);
        for (name, descriptor) in &self.mappings {
            if descriptor.is_primary_key() {
                cols.push(format!("{} {} not null", quote(name), descriptor.ddl()));
            } else {
                cols.push(format!("{} {}", quote(name), descriptor.ddl()));
            }
        }
        cols.push(format!("primary key ({})", quote(&self.primary_key)));
        format!(
            "create table if not exists {} ({})",
            quote(&self.table),
            cols.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<(&'static str, FieldDescriptor)> {
        vec![
            ("id", FieldDescriptor::string_ddl("varchar(50)").primary_key()),
            ("name", FieldDescriptor::string()),
            ("score", FieldDescriptor::integer().default_value(0)),
        ]
    }

    #[test]
    fn templates_follow_declaration_order() {
        let schema = ModelSchema::derive("players", players()).unwrap();
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.fields(), ["name", "score"]);
        assert_eq!(
            schema.select_sql(),
            "select `id`, `name`, `score` from `players`"
        );
        assert_eq!(
            schema.insert_sql(),
            "insert into `players` (`name`, `score`, `id`) values (?, ?, ?)"
        );
        assert_eq!(
            schema.update_sql(),
            "update `players` set `name`=?, `score`=? where `id`=?"
        );
        assert_eq!(schema.delete_sql(), "delete from `players` where `id`=?");
        assert_eq!(
            schema.select_by_key_sql(),
            "select `id`, `name`, `score` from `players` where `id`=?"
        );
    }

    #[test]
    fn primary_key_may_be_declared_anywhere() {
        let schema = ModelSchema::derive(
            "tags",
            vec![
                ("label", FieldDescriptor::string()),
                ("code", FieldDescriptor::integer().primary_key()),
            ],
        )
        .unwrap();
        assert_eq!(schema.primary_key(), "code");
        assert_eq!(schema.select_sql(), "select `code`, `label` from `tags`");
    }

    #[test]
    fn missing_primary_key_fails() {
        let err = ModelSchema::derive("logs", vec![("line", FieldDescriptor::text())])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingPrimaryKey {
                table: "logs".into()
            }
        );
    }

    #[test]
    fn duplicate_primary_key_fails() {
        let err = ModelSchema::derive(
            "pairs",
            vec![
                ("a", FieldDescriptor::integer().primary_key()),
                ("b", FieldDescriptor::integer().primary_key()),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicatePrimaryKey {
                table: "pairs".into(),
                field: "b".into()
            }
        );
    }

    #[test]
    fn descriptor_name_overrides_attribute() {
        let schema = ModelSchema::derive(
            "posts",
            vec![
                ("id", FieldDescriptor::integer().primary_key()),
                ("body", FieldDescriptor::text().named("content")),
            ],
        )
        .unwrap();
        assert_eq!(schema.fields(), ["content"]);
        assert!(schema.field("content").is_some());
        assert!(schema.field("body").is_none());
    }

    #[test]
    fn key_only_model_has_noop_update() {
        let schema =
            ModelSchema::derive("ids", vec![("id", FieldDescriptor::integer().primary_key())])
                .unwrap();
        assert_eq!(schema.insert_sql(), "insert into `ids` (`id`) values (?)");
        assert_eq!(schema.update_sql(), "update `ids` set `id`=`id` where `id`=?");
    }

    #[test]
    fn create_table_uses_declared_ddl() {
        let schema = ModelSchema::derive("players", players()).unwrap();
        assert_eq!(
            schema.create_table_sql(),
            "create table if not exists `players` (`id` varchar(50) not null, `name` varchar(100), `score` bigint, primary key (`id`))"
        );
    }

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
