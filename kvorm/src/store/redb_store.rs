use crate::store::{parse_counter, KvStore};
use crate::AppError;
use redb::{Database, ReadOnlyTable, ReadableTable, Table, TableDefinition, Value as RedbValue};
use std::collections::BTreeMap;
use std::path::Path;

const STRINGS: TableDefinition<&str, &str> = TableDefinition::new("kv_strings");
const HASHES: TableDefinition<&str, &[u8]> = TableDefinition::new("kv_hashes");

type StringTable<'txn> = Table<'txn, &'static str, &'static str>;
type HashTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
type HashFields = BTreeMap<String, String>;

/// Durable backend over redb. Each mutating call runs in its own write transaction,
/// redb serializes writers so read-modify-write calls stay atomic.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let db = Database::create(path)?;
        let tx = db.begin_write()?;
        {
            tx.open_table(STRINGS)?;
            tx.open_table(HASHES)?;
        }
        tx.commit()?;
        Ok(Self { db })
    }

    fn write<T>(&self, op: impl FnOnce(&mut StringTable<'_>, &mut HashTable<'_>) -> Result<T, AppError>) -> Result<T, AppError> {
        let tx = self.db.begin_write()?;
        let result = {
            let mut strings = tx.open_table(STRINGS)?;
            let mut hashes = tx.open_table(HASHES)?;
            op(&mut strings, &mut hashes)?
        };
        tx.commit()?;
        Ok(result)
    }

    fn read_hash(&self, key: &str) -> Result<Option<HashFields>, AppError> {
        let tx = self.db.begin_read()?;
        let hashes = tx.open_table(HASHES)?;
        let fields = hashes.get(key)?.map(|g| bincode::deserialize::<HashFields>(g.value())).transpose()?;
        Ok(fields)
    }

    fn load_hash(hashes: &HashTable<'_>, key: &str) -> Result<HashFields, AppError> {
        let fields = hashes.get(key)?.map(|g| bincode::deserialize::<HashFields>(g.value())).transpose()?;
        Ok(fields.unwrap_or_default())
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64, AppError> {
        self.write(|strings, hashes| {
            if hashes.get(key)?.is_some() {
                return Err(AppError::Store(format!("value at {} is a hash", key)));
            }
            let current = strings.get(key)?.map(|g| g.value().to_string());
            let next = parse_counter(key, current.as_deref())? + delta;
            let encoded = next.to_string();
            strings.insert(key, encoded.as_str())?;
            Ok(next)
        })
    }
}

fn collect_prefixed<V: RedbValue + 'static>(table: &ReadOnlyTable<&'static str, V>, prefix: &str, out: &mut Vec<String>) -> Result<(), AppError> {
    for entry in table.range(prefix..)? {
        let (key, _) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        out.push(key.to_string());
    }
    Ok(())
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let tx = self.db.begin_read()?;
        let strings = tx.open_table(STRINGS)?;
        let value = strings.get(key)?.map(|g| g.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.write(|strings, hashes| {
            hashes.remove(key)?;
            strings.insert(key, value)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<bool, AppError> {
        self.write(|strings, hashes| {
            let removed_string = strings.remove(key)?.is_some();
            let removed_hash = hashes.remove(key)?.is_some();
            Ok(removed_string || removed_hash)
        })
    }

    fn exists(&self, key: &str) -> Result<bool, AppError> {
        let tx = self.db.begin_read()?;
        let strings = tx.open_table(STRINGS)?;
        if strings.get(key)?.is_some() {
            return Ok(true);
        }
        let hashes = tx.open_table(HASHES)?;
        let found = hashes.get(key)?.is_some();
        Ok(found)
    }

    fn increment(&self, key: &str) -> Result<i64, AppError> {
        self.add(key, 1)
    }

    fn decrement(&self, key: &str) -> Result<i64, AppError> {
        self.add(key, -1)
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, AppError> {
        self.write(|strings, hashes| {
            if strings.get(key)?.is_some() || hashes.get(key)?.is_some() {
                return Ok(false);
            }
            strings.insert(key, value)?;
            Ok(true)
        })
    }

    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        self.write(|strings, hashes| {
            if strings.get(key)?.is_some() {
                return Err(AppError::Store(format!("value at {} is not a hash", key)));
            }
            let mut fields = Self::load_hash(hashes, key)?;
            fields.insert(field.to_string(), value.to_string());
            let bytes = bincode::serialize(&fields)?;
            hashes.insert(key, bytes.as_slice())?;
            Ok(())
        })
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        Ok(self.read_hash(key)?.and_then(|mut fields| fields.remove(field)))
    }

    fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>, AppError> {
        Ok(self.read_hash(key)?.unwrap_or_default())
    }

    fn hash_delete(&self, key: &str, field: &str) -> Result<bool, AppError> {
        self.write(|_, hashes| {
            let mut fields = Self::load_hash(hashes, key)?;
            if fields.remove(field).is_none() {
                return Ok(false);
            }
            if fields.is_empty() {
                hashes.remove(key)?;
            } else {
                let bytes = bincode::serialize(&fields)?;
                hashes.insert(key, bytes.as_slice())?;
            }
            Ok(true)
        })
    }

    fn hash_exists(&self, key: &str, field: &str) -> Result<bool, AppError> {
        Ok(self.read_hash(key)?.is_some_and(|fields| fields.contains_key(field)))
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let tx = self.db.begin_read()?;
        let mut out = Vec::new();
        collect_prefixed(&tx.open_table(STRINGS)?, prefix, &mut out)?;
        collect_prefixed(&tx.open_table(HASHES)?, prefix, &mut out)?;
        Ok(out)
    }
}

#[cfg(all(test, not(feature = "integration")))]
mod redb_store_tests {
    use super::*;
    use crate::store::test_utils::mk_redb;

    #[test]
    fn data_survives_reopen() {
        let path = std::env::temp_dir().join(format!("kvorm_reopen_{}.redb", rand::random::<u64>()));
        {
            let store = RedbStore::open(&path).unwrap();
            store.hash_set("process:primary:1", "name", "a").unwrap();
            store.increment("process:primary-incr").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.hash_get("process:primary:1", "name").unwrap().as_deref(), Some("a"));
        assert_eq!(store.get("process:primary-incr").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn failed_write_leaves_no_trace() {
        let store = mk_redb("kvorm_abort");
        store.hash_set("h", "f", "v").unwrap();
        assert!(store.increment("h").is_err());
        assert_eq!(store.hash_get_all("h").unwrap().len(), 1);
        assert_eq!(store.get("h").unwrap(), None);
    }

    #[test]
    fn scan_stops_at_prefix_boundary() {
        let store = mk_redb("kvorm_scan");
        store.set("a:1", "1").unwrap();
        store.set("b:1", "1").unwrap();
        store.hash_set("b:2", "f", "v").unwrap();
        store.set("c:1", "1").unwrap();
        let mut keys = store.scan("b:").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["b:1", "b:2"]);
    }
}
