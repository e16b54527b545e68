use crate::store::{parse_counter, KvStore};
use crate::AppError;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    strings: HashMap<String, String>,
    hashes: HashMap<String, BTreeMap<String, String>>,
}

/// Process-local backend. One lock guards both keyspaces so every call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64, AppError> {
        let mut state = self.state.write()?;
        if state.hashes.contains_key(key) {
            return Err(AppError::Store(format!("value at {} is a hash", key)));
        }
        let next = parse_counter(key, state.strings.get(key).map(String::as_str))? + delta;
        state.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.state.read()?.strings.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut state = self.state.write()?;
        state.hashes.remove(key);
        state.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut state = self.state.write()?;
        let removed_string = state.strings.remove(key).is_some();
        let removed_hash = state.hashes.remove(key).is_some();
        Ok(removed_string || removed_hash)
    }

    fn exists(&self, key: &str) -> Result<bool, AppError> {
        let state = self.state.read()?;
        Ok(state.strings.contains_key(key) || state.hashes.contains_key(key))
    }

    fn increment(&self, key: &str) -> Result<i64, AppError> {
        self.add(key, 1)
    }

    fn decrement(&self, key: &str) -> Result<i64, AppError> {
        self.add(key, -1)
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, AppError> {
        let mut state = self.state.write()?;
        if state.strings.contains_key(key) || state.hashes.contains_key(key) {
            return Ok(false);
        }
        state.strings.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        let mut state = self.state.write()?;
        if state.strings.contains_key(key) {
            return Err(AppError::Store(format!("value at {} is not a hash", key)));
        }
        state.hashes.entry(key.to_string()).or_default().insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        Ok(self.state.read()?.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>, AppError> {
        Ok(self.state.read()?.hashes.get(key).cloned().unwrap_or_default())
    }

    fn hash_delete(&self, key: &str, field: &str) -> Result<bool, AppError> {
        let mut state = self.state.write()?;
        let Some(hash) = state.hashes.get_mut(key) else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            state.hashes.remove(key);
        }
        Ok(removed)
    }

    fn hash_exists(&self, key: &str, field: &str) -> Result<bool, AppError> {
        Ok(self.state.read()?.hashes.get(key).is_some_and(|h| h.contains_key(field)))
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let state = self.state.read()?;
        Ok(state.strings.keys()
            .chain(state.hashes.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
