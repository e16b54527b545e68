pub mod descriptor;
pub mod field;
pub mod trie;
pub mod value;

pub use descriptor::{Schema, SchemaBuilder};
pub use field::{FieldDef, FieldKind};
pub use trie::{permutations, resolve_index, IndexTrie};
pub use value::{Value, DATETIME_PATTERN};
