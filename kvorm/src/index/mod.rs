pub mod foreign;
pub mod maintainer;
pub mod partition;

use std::collections::BTreeMap;

pub use foreign::{dependents, ForeignKeys};
pub use maintainer::{tuple_value, IndexMaintainer};
pub use partition::Partitioner;

/// Index value (or foreign marker) -> partition the record was recorded in.
/// Persisted as JSON on the record hash so delete never recomputes from mutated values.
pub type PartitionMap = BTreeMap<String, u64>;
