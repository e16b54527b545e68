//! kvorm maps typed model declarations onto hash records in a key-value store.
//!
//! Records are kept reachable through secondary indexes (composite ones included), unique
//! constraints claimed with atomic set-if-absent, and foreign key back references. Index buckets
//! are partitioned once they reach a configured size so no single value turns into a huge key.
//! A query with fields in any order is resolved to the longest registered index through a trie.
//!
//! The store is pluggable: an in-process [`store::MemoryStore`] and a durable [`store::RedbStore`]
//! backed by [Redb](https://github.com/cberner/redb) ship with the crate.
//!

pub mod error;
pub mod index;
pub mod keys;
pub mod logger;
pub mod model;
pub mod orm;
pub mod schema;
pub mod settings;
pub mod store;

pub use chrono;
pub use error::AppError;
pub use log;
pub use model::{Model, Record};
pub use orm::Orm;
pub use schema::{FieldDef, FieldKind, Schema, SchemaBuilder, Value};
pub use serde_json;
pub use settings::{IndexSettings, Settings, StoreBackend, StoreSettings};
pub use store::{KvStore, MemoryStore, RedbStore};
