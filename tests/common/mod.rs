#![allow(dead_code)]

use kvorm::{FieldDef, Orm, Schema, Settings};

/// One in-memory and one redb-backed orm, both with the given big key limit.
pub fn orms(name: &str, limit: u64) -> Vec<(&'static str, Orm)> {
    let settings = Settings::default().with_big_key_limit(limit);
    vec![
        ("memory", Orm::with_store(std::sync::Arc::new(kvorm::MemoryStore::new()), settings.clone())),
        ("redb", Orm::temp(name, settings, true).expect("temp redb orm")),
    ]
}

pub fn process_schema() -> Schema {
    Schema::builder("process")
        .field(FieldDef::char("name"))
        .field(FieldDef::integer("version"))
        .field(FieldDef::json("scheme"))
        .field(FieldDef::boolean("deprecated").default(false))
        .field(FieldDef::datetime("created").auto_now_add())
        .field(FieldDef::datetime("updated").auto_now())
        .unique_together(&["name", "version"])
        .index(&["name", "created"])
        .index(&["name", "updated"])
        .index(&["version"])
        .build()
        .expect("process schema")
}
