pub mod memory;
pub mod redb_store;

use crate::AppError;
use std::collections::BTreeMap;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// Key-value backend the engine runs against. A key holds either a string or a hash;
/// every method is a single atomic step, sequences of calls are not.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    /// Removes a string or hash key, returns whether anything was removed.
    fn delete(&self, key: &str) -> Result<bool, AppError>;
    fn exists(&self, key: &str) -> Result<bool, AppError>;

    /// Missing keys count from 0.
    fn increment(&self, key: &str) -> Result<i64, AppError>;
    fn decrement(&self, key: &str) -> Result<i64, AppError>;
    /// Returns false when the key already existed.
    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, AppError>;

    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AppError>;
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AppError>;
    fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>, AppError>;
    /// Removing the last field removes the key.
    fn hash_delete(&self, key: &str, field: &str) -> Result<bool, AppError>;
    fn hash_exists(&self, key: &str, field: &str) -> Result<bool, AppError>;

    /// All keys starting with `prefix`, for admin and test tooling.
    fn scan(&self, prefix: &str) -> Result<Vec<String>, AppError>;

    fn delete_all(&self) -> Result<usize, AppError> {
        let keys = self.scan("")?;
        let mut deleted = 0;
        for key in keys {
            if self.delete(&key)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

pub(crate) fn parse_counter(key: &str, raw: Option<&str>) -> Result<i64, AppError> {
    match raw {
        None => Ok(0),
        Some(s) => s.parse::<i64>().map_err(|_| AppError::Store(format!("value at {} is not an integer", key))),
    }
}
