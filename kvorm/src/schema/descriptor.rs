use crate::keys::{is_valid_name, DEFAULT_PRIMARY_KEY, RESERVED_PREFIX};
use crate::schema::field::{FieldDef, FieldKind};
use crate::schema::trie::{resolve_index, IndexTrie};
use crate::AppError;
use std::collections::HashMap;

/// Immutable description of one model type, derived once by [`SchemaBuilder::build`].
#[derive(Debug, Clone)]
pub struct Schema {
    namespace: String,
    fields: Vec<FieldDef>,
    positions: HashMap<String, usize>,
    primary_key: String,
    unique_keys: Vec<Vec<String>>,
    indexes: Vec<Vec<String>>,
    foreign_keys: Vec<String>,
    trie: IndexTrie,
}

pub struct SchemaBuilder {
    namespace: String,
    fields: Vec<FieldDef>,
    unique_together: Vec<Vec<String>>,
    indexes: Vec<Vec<String>>,
}

impl Schema {
    pub fn builder(namespace: &str) -> SchemaBuilder {
        SchemaBuilder { namespace: namespace.to_string(), fields: Vec::new(), unique_together: Vec::new(), indexes: Vec::new() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.positions.get(name).map(|&i| &self.fields[i])
    }

    /// Field lookup for caller supplied names, unknown ones are `InvalidInput`.
    pub fn expect_field(&self, name: &str) -> Result<&FieldDef, AppError> {
        self.field(name).ok_or_else(|| AppError::invalid(format!("{} has no field {}", self.namespace, name)))
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn primary_field(&self) -> &FieldDef {
        &self.fields[self.positions[&self.primary_key]]
    }

    /// Sorted unique tuples, each sorted by field name.
    pub fn unique_keys(&self) -> &[Vec<String>] {
        &self.unique_keys
    }

    /// Every registered index tuple: prefixes of declared indexes, then prefixes of unique tuples.
    pub fn indexes(&self) -> &[Vec<String>] {
        &self.indexes
    }

    pub fn foreign_keys(&self) -> &[String] {
        &self.foreign_keys
    }

    pub fn is_unique_key(&self, tuple: &[String]) -> bool {
        self.unique_keys.iter().any(|u| u.as_slice() == tuple)
    }

    /// Longest registered index reachable from any ordering of `params`.
    pub fn resolve_index(&self, params: &[&str]) -> Vec<String> {
        resolve_index(&self.trie, params)
    }
}

impl SchemaBuilder {
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn unique_together<S: AsRef<str>>(mut self, tuple: &[S]) -> Self {
        self.unique_together.push(tuple.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    pub fn index<S: AsRef<str>>(mut self, tuple: &[S]) -> Self {
        self.indexes.push(tuple.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Schema, AppError> {
        let SchemaBuilder { namespace, mut fields, unique_together, indexes: declared } = self;
        if !is_valid_name(&namespace) {
            return Err(AppError::invalid(format!("Invalid namespace {:?}", namespace)));
        }

        let mut positions = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            if !is_valid_name(&field.name) || field.name.starts_with(RESERVED_PREFIX) {
                return Err(AppError::invalid(format!("Invalid field name {:?} in {}", field.name, namespace)));
            }
            if positions.insert(field.name.clone(), i).is_some() {
                return Err(AppError::invalid(format!("Field {} declared twice in {}", field.name, namespace)));
            }
        }

        let primaries: Vec<usize> = fields.iter().enumerate().filter(|(_, f)| f.primary).map(|(i, _)| i).collect();
        let primary_key = match primaries.as_slice() {
            [] => {
                if positions.contains_key(DEFAULT_PRIMARY_KEY) {
                    return Err(AppError::invalid(format!("{} declares {} without marking a primary field", namespace, DEFAULT_PRIMARY_KEY)));
                }
                positions.insert(DEFAULT_PRIMARY_KEY.to_string(), fields.len());
                fields.push(FieldDef::integer(DEFAULT_PRIMARY_KEY).primary());
                DEFAULT_PRIMARY_KEY.to_string()
            }
            [i] => {
                let pk = &fields[*i];
                if !matches!(pk.kind, FieldKind::Integer | FieldKind::Char) {
                    return Err(AppError::invalid(format!("Primary field {} can not be {}", pk.name, pk.kind.name())));
                }
                pk.name.clone()
            }
            _ => return Err(AppError::invalid(format!("{} declares more than one primary field", namespace))),
        };

        for field in fields.iter_mut() {
            if let Some(default) = field.default.take() {
                field.default = Some(field.kind.coerce(default)?);
            }
        }

        let check_tuple = |tuple: &[String], what: &str| -> Result<(), AppError> {
            if tuple.is_empty() {
                return Err(AppError::invalid(format!("Empty {} in {}", what, namespace)));
            }
            for (i, name) in tuple.iter().enumerate() {
                if !positions.contains_key(name) {
                    return Err(AppError::invalid(format!("{} {:?} names unknown field {}", what, tuple, name)));
                }
                if tuple[..i].contains(name) {
                    return Err(AppError::invalid(format!("{} {:?} repeats field {}", what, tuple, name)));
                }
            }
            Ok(())
        };

        let mut unique_keys: Vec<Vec<String>> = Vec::new();
        for tuple in unique_together {
            check_tuple(&tuple, "unique_together")?;
            unique_keys.push(tuple);
        }
        unique_keys.extend(fields.iter().filter(|f| f.unique).map(|f| vec![f.name.clone()]));
        for tuple in unique_keys.iter_mut() {
            tuple.sort();
        }
        unique_keys.sort();
        unique_keys.dedup();

        let mut indexes: Vec<Vec<String>> = Vec::new();
        for tuple in &declared {
            check_tuple(tuple, "index")?;
        }
        for tuple in declared.iter().chain(unique_keys.iter()) {
            for end in 1..=tuple.len() {
                let prefix = tuple[..end].to_vec();
                if !indexes.contains(&prefix) {
                    indexes.push(prefix);
                }
            }
        }

        let mut trie = IndexTrie::new();
        for tuple in &indexes {
            trie.insert(tuple);
        }
        for field in fields.iter_mut() {
            field.indexes = indexes.iter().filter(|t| t.contains(&field.name)).cloned().collect();
        }
        let foreign_keys = fields.iter().filter(|f| f.foreign_target().is_some()).map(|f| f.name.clone()).collect();

        Ok(Schema { namespace, fields, positions, primary_key, unique_keys, indexes, foreign_keys, trie })
    }
}

#[cfg(all(test, not(feature = "integration")))]
mod descriptor_tests {
    use super::*;
    use crate::schema::Value;

    fn process() -> Schema {
        Schema::builder("process")
            .field(FieldDef::char("name"))
            .field(FieldDef::integer("version"))
            .field(FieldDef::json("scheme"))
            .field(FieldDef::boolean("deprecated").default(false))
            .field(FieldDef::datetime("created").auto_now_add())
            .field(FieldDef::datetime("updated").auto_now())
            .unique_together(&["version", "name"])
            .index(&["name", "created"])
            .index(&["name", "updated"])
            .build()
            .unwrap()
    }

    #[test]
    fn synthesises_integer_primary_key() {
        let schema = process();
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.primary_field().kind, FieldKind::Integer);
        assert_eq!(schema.fields().len(), 7);
    }

    #[test]
    fn derives_sorted_unique_tuples_and_index_prefixes() {
        let schema = process();
        assert_eq!(schema.unique_keys(), &[vec!["name".to_string(), "version".to_string()]]);
        let expected: Vec<Vec<&str>> = vec![
            vec!["name"],
            vec!["name", "created"],
            vec!["name", "updated"],
            vec!["name", "version"],
        ];
        assert_eq!(schema.indexes(), expected.iter().map(|t| t.iter().map(|s| s.to_string()).collect()).collect::<Vec<Vec<String>>>().as_slice());
        assert_eq!(schema.field("version").unwrap().indexes, vec![vec!["name".to_string(), "version".to_string()]]);
        assert_eq!(schema.field("name").unwrap().indexes.len(), 4);
        assert!(schema.field("scheme").unwrap().indexes.is_empty());
    }

    #[test]
    fn resolves_indexes_in_any_order() {
        let schema = process();
        assert_eq!(schema.resolve_index(&["version", "name"]), vec!["name", "version"]);
        assert_eq!(schema.resolve_index(&["version", "scheme", "name"]), vec!["name", "version"]);
        assert!(schema.resolve_index(&["version"]).is_empty());
        assert!(schema.resolve_index(&[]).is_empty());
    }

    #[test]
    fn field_level_unique_becomes_singleton_tuple() {
        let schema = Schema::builder("user")
            .field(FieldDef::char("email").primary())
            .field(FieldDef::char("handle").unique())
            .build()
            .unwrap();
        assert_eq!(schema.primary_key(), "email");
        assert_eq!(schema.unique_keys(), &[vec!["handle".to_string()]]);
        assert!(schema.is_unique_key(&["handle".to_string()]));
        assert_eq!(schema.resolve_index(&["handle"]), vec!["handle"]);
    }

    #[test]
    fn collects_foreign_keys_and_coerces_defaults() {
        let schema = Schema::builder("job")
            .field(FieldDef::foreign("process", "process"))
            .field(FieldDef::integer("retries").default("3"))
            .build()
            .unwrap();
        assert_eq!(schema.foreign_keys(), &["process".to_string()]);
        assert_eq!(schema.field("retries").unwrap().default, Some(Value::Integer(3)));
    }

    #[test]
    fn rejects_malformed_declarations() {
        let cases = vec![
            Schema::builder("bad:ns").field(FieldDef::char("a")),
            Schema::builder("m").field(FieldDef::char("a")).field(FieldDef::integer("a")),
            Schema::builder("m").field(FieldDef::char("a").primary()).field(FieldDef::char("b").primary()),
            Schema::builder("m").field(FieldDef::boolean("a").primary()),
            Schema::builder("m").field(FieldDef::char("id")),
            Schema::builder("m").field(FieldDef::char("__indexes__")),
            Schema::builder("m").field(FieldDef::char("with-dash")),
            Schema::builder("m").field(FieldDef::char("a")).unique_together(&["a", "missing"]),
            Schema::builder("m").field(FieldDef::char("a")).index::<&str>(&[]),
            Schema::builder("m").field(FieldDef::char("a")).index(&["a", "a"]),
            Schema::builder("m").field(FieldDef::integer("a").default("x")),
        ];
        for builder in cases {
            assert!(matches!(builder.build(), Err(AppError::InvalidInput(_))));
        }
    }
}
